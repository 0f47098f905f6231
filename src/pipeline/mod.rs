//! Periodic sampling and stability-detection pipeline.
//!
//! ```text
//! timer tick ──▶ PeriodicSampler ──▶ Sample (readings + timing)
//!                     │
//!                     ▼
//!               SlidingWindow  (stride 1, emits once warm)
//!                     │
//!                     ▼
//!             StabilityEvaluator ──▶ StabilityVerdict
//!                     │
//!                     ▼
//!             StabilityMonitor  (cancellation, take-until-stable)
//! ```
//!
//! One pipeline instance drives one connection; ticks are strictly
//! ordered because every reading shares that connection. Verdicts are
//! emitted in tick order, and any stage error terminates the run.

pub mod monitor;
pub mod sampler;
pub mod stability;
pub mod window;

use crate::client::ClientError;
use stability::RegressionError;
use thiserror::Error;

/// Terminal pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Regression(#[from] RegressionError),
}

pub use monitor::{StabilityMonitor, WindowObserver};
pub use sampler::{PeriodicSampler, SampleSource, TickPolicy};
pub use stability::{
    StabilityEvaluator, StabilitySource, StabilityThresholds, StabilityVerdict, TemperatureSource,
};
pub use window::SlidingWindow;
