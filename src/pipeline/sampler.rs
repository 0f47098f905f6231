//! Periodic instrument sampling.
//!
//! Drives a fixed-cadence timer; each tick executes the configured
//! readings against the live connection, in order, and joins them with
//! a timing record (`start_time`, `delta_time`) into one [`Sample`].
//! The first tick fires immediately.

use super::PipelineError;
use crate::client::{ClientError, CryostationClient};
use crate::commands::Reading;
use crate::sample::{Field, Sample};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{trace, warn};

/// What a failed tick does to the pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPolicy {
    /// A failed read terminates the run (the default: every sample
    /// matters for trend detection, and a sick connection rarely heals
    /// mid-run).
    #[default]
    Fatal,
    /// Log the failure and wait for the next tick.
    SkipTick,
}

/// Anything that yields pipeline samples in tick order.
///
/// The live implementation is [`PeriodicSampler`]; tests substitute
/// scripted sources.
#[async_trait]
pub trait SampleSource: Send {
    /// Produce the next sample. Errors are terminal for the run.
    async fn next_sample(&mut self) -> Result<Sample, PipelineError>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

/// Monotonic pipeline clock, captured at the first tick.
#[derive(Debug, Clone, Copy)]
struct PipelineClock {
    origin: Instant,
    start_time: f64,
}

/// Fixed-cadence sampler over a live instrument connection.
///
/// Owns the connection for the lifetime of the run; retrieve it with
/// [`into_client`](PeriodicSampler::into_client) to close it.
pub struct PeriodicSampler {
    client: CryostationClient,
    readings: Vec<Reading>,
    interval: Interval,
    policy: TickPolicy,
    clock: Option<PipelineClock>,
}

impl PeriodicSampler {
    /// Create a sampler ticking every `sample_rate_ms` milliseconds.
    ///
    /// `readings` are executed in order on every tick and joined
    /// left-to-right; the timing record is joined underneath, so a
    /// reading can never lose its value to a timing key.
    pub fn new(
        client: CryostationClient,
        readings: Vec<Reading>,
        sample_rate_ms: u64,
        policy: TickPolicy,
    ) -> Self {
        let mut interval =
            tokio::time::interval(Duration::from_millis(sample_rate_ms.max(1)));
        // A slow instrument response must not cause a burst of
        // catch-up ticks afterwards.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            client,
            readings,
            interval,
            policy,
            clock: None,
        }
    }

    pub fn client(&self) -> &CryostationClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut CryostationClient {
        &mut self.client
    }

    /// Give the connection back, consuming the sampler.
    pub fn into_client(self) -> CryostationClient {
        self.client
    }

    /// Timing record for the current tick.
    ///
    /// `start_time` is wall-clock seconds since the Unix epoch at the
    /// first tick; `delta_time` is monotonic elapsed seconds since
    /// then, so trend math never sees wall-clock steps.
    fn timing_sample(&mut self) -> Sample {
        let clock = self.clock.get_or_insert_with(|| PipelineClock {
            origin: Instant::now(),
            start_time: unix_now_secs(),
        });
        Sample::tagged(Field::StartTime, clock.start_time)
            .with(Field::DeltaTime, clock.origin.elapsed().as_secs_f64())
    }

    async fn read_all(&mut self) -> Result<Sample, ClientError> {
        let mut merged = Sample::new();
        for &reading in &self.readings {
            let tagged = self.client.read_tagged(reading).await?;
            merged = merged.join(&tagged);
        }
        Ok(merged)
    }
}

#[async_trait]
impl SampleSource for PeriodicSampler {
    async fn next_sample(&mut self) -> Result<Sample, PipelineError> {
        loop {
            self.interval.tick().await;
            let timing = self.timing_sample();
            match self.read_all().await {
                Ok(readings) => {
                    let sample = timing.join(&readings);
                    trace!(fields = sample.len(), "Sampler tick complete");
                    return Ok(sample);
                }
                Err(e) => match self.policy {
                    TickPolicy::Fatal => return Err(e.into()),
                    TickPolicy::SkipTick => {
                        warn!(error = %e, "Sampler tick failed, skipping");
                    }
                },
            }
        }
    }

    fn source_name(&self) -> &str {
        "cryostat-periodic"
    }
}

fn unix_now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_failures_are_fatal_by_default() {
        assert_eq!(TickPolicy::default(), TickPolicy::Fatal);
    }
}
