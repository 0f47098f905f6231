//! Setpoint-change orchestration.
//!
//! Issues the platform and user-stage setpoint commands for a target
//! temperature, then drives the sampling pipeline on user temperature
//! and user stability until the evaluator reports a stable verdict (or
//! the caller cancels). The connection is closed exactly once on every
//! exit path.

use crate::client::{ClientError, CryostationClient};
use crate::commands::Reading;
use crate::config::{SamplingConfig, StabilityConfig};
use crate::pipeline::{
    PeriodicSampler, PipelineError, StabilityEvaluator, StabilityMonitor, StabilitySource,
    StabilityVerdict, TemperatureSource,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Below this target (K) the platform tracks the target directly and
/// the user stage parks; at or above it the platform leads the target
/// by a fixed factor. Instrument calibration constants.
pub const USER_STAGE_CROSSOVER_K: f64 = 40.0;

/// Platform setpoint factor applied above the crossover.
pub const PLATFORM_SETPOINT_FACTOR: f64 = 0.967;

/// User-stage park setpoint (K) below the crossover.
pub const USER_STAGE_PARK_K: f64 = 3.0;

/// Platform and user-stage setpoints derived from one target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SetpointSplit {
    pub platform: f64,
    pub user_stage: f64,
}

/// Derive the two instrument setpoints for a target temperature.
pub fn split_setpoint(target: f64) -> SetpointSplit {
    if target < USER_STAGE_CROSSOVER_K {
        SetpointSplit {
            platform: target,
            user_stage: USER_STAGE_PARK_K,
        }
    } else {
        SetpointSplit {
            platform: PLATFORM_SETPOINT_FACTOR * target,
            user_stage: target,
        }
    }
}

/// Change the temperature setpoint and wait for thermal stability.
///
/// Takes ownership of the connection, runs the pipeline (user
/// temperature + user stability, window per `stability.window`), and
/// closes the connection before returning, whether the run ends
/// stable, cancelled, or failed.
///
/// Returns `Ok(Some(verdict))` with the first stable verdict,
/// `Ok(None)` when cancelled first.
pub async fn set_temperature_and_wait_stable(
    mut client: CryostationClient,
    target: f64,
    sampling: &SamplingConfig,
    stability: &StabilityConfig,
    cancel: CancellationToken,
) -> Result<Option<StabilityVerdict>, PipelineError> {
    let split = split_setpoint(target);
    info!(
        target,
        platform = split.platform,
        user_stage = split.user_stage,
        "Applying temperature setpoints"
    );

    if let Err(e) = apply_setpoints(&mut client, split).await {
        client.close().await;
        return Err(e.into());
    }

    let evaluator = StabilityEvaluator::new(
        TemperatureSource::User,
        StabilitySource::User,
        stability.thresholds.clone(),
    );
    let sampler = PeriodicSampler::new(
        client,
        vec![Reading::UserTemperature, Reading::UserStability],
        sampling.sample_rate_ms,
        sampling.on_tick_failure,
    );
    let mut monitor = StabilityMonitor::new(sampler, stability.window, evaluator, cancel);

    let outcome = monitor.run_until_stable().await;

    let mut client = monitor.into_source().into_client();
    client.close().await;
    outcome
}

async fn apply_setpoints(
    client: &mut CryostationClient,
    split: SetpointSplit,
) -> Result<(), ClientError> {
    client.set_platform_setpoint(split.platform).await?;
    client.set_user_stage_setpoint(split.user_stage).await?;
    Ok(())
}
