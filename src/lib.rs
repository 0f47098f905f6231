//! Cryostation: cryostat instrument client
//!
//! TCP client for laboratory cryostat instruments speaking a
//! length-prefixed ASCII command protocol, with a periodic sampling
//! pipeline that turns raw readings into time-windowed thermal
//! stability verdicts.
//!
//! ## Architecture
//!
//! - **Protocol / Client**: framed command round-trips over one TCP
//!   connection (`protocol`, `client`, `commands`)
//! - **Sample Tagging**: immutable tagged records with last-write-wins
//!   join (`sample`)
//! - **Pipeline**: periodic sampler → sliding window → stability
//!   evaluator, driven with cancellation (`pipeline`)
//! - **Orchestration**: setpoint split + wait-for-stability (`setpoint`)

pub mod client;
pub mod commands;
pub mod config;
pub mod pipeline;
pub mod protocol;
pub mod sample;
pub mod setpoint;

// Re-export the connection layer
pub use client::{ClientError, ClientStats, CryostationClient};
pub use commands::{Reading, StatusSnapshot};
pub use protocol::ProtocolError;

// Re-export the data model
pub use sample::{join_list, Field, Sample};

// Re-export the pipeline
pub use pipeline::{
    PeriodicSampler, PipelineError, SampleSource, SlidingWindow, StabilityEvaluator,
    StabilityMonitor, StabilitySource, StabilityThresholds, StabilityVerdict, TemperatureSource,
    TickPolicy, WindowObserver,
};

// Re-export configuration and orchestration
pub use config::{Config, ConfigError, ConnectionConfig, SamplingConfig, StabilityConfig};
pub use setpoint::{set_temperature_and_wait_stable, split_setpoint, SetpointSplit};
