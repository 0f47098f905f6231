//! Pipeline driver: sampler → window → evaluator.
//!
//! Pulls samples from a [`SampleSource`] in strict tick order, feeds
//! the sliding window, and evaluates every full window into a
//! [`StabilityVerdict`]. Cancellation is observed between ticks via a
//! [`CancellationToken`]; once observed, no further sample is requested
//! and the in-flight tick (if any) is dropped without emitting.

use super::sampler::SampleSource;
use super::stability::{StabilityEvaluator, StabilityVerdict};
use super::window::SlidingWindow;
use super::PipelineError;
use crate::sample::Sample;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Drives one stability-detection pipeline run over one sample source.
pub struct StabilityMonitor<S> {
    source: S,
    window: SlidingWindow,
    evaluator: StabilityEvaluator,
    cancel: CancellationToken,
    verdicts_emitted: u64,
}

impl<S: SampleSource> StabilityMonitor<S> {
    pub fn new(
        source: S,
        window_len: usize,
        evaluator: StabilityEvaluator,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            window: SlidingWindow::new(window_len),
            evaluator,
            cancel,
            verdicts_emitted: 0,
        }
    }

    /// Give the sample source back, consuming the monitor.
    pub fn into_source(self) -> S {
        self.source
    }

    pub fn verdicts_emitted(&self) -> u64 {
        self.verdicts_emitted
    }

    /// Produce the next verdict.
    ///
    /// Blocks through the window warm-up (the first N−1 ticks emit no
    /// verdict). Returns `Ok(None)` when cancelled; errors are terminal
    /// for the run.
    pub async fn next_verdict(&mut self) -> Result<Option<StabilityVerdict>, PipelineError> {
        loop {
            let sample = tokio::select! {
                // Cancellation is checked first so an already-ready tick
                // can never emit past an observed cancel.
                biased;
                () = self.cancel.cancelled() => {
                    info!(
                        source = self.source.source_name(),
                        verdicts = self.verdicts_emitted,
                        "Stability pipeline cancelled"
                    );
                    return Ok(None);
                }
                result = self.source.next_sample() => result?,
            };

            if let Some(full) = self.window.push(sample) {
                let verdict = self.evaluator.evaluate(full)?;
                self.verdicts_emitted += 1;
                return Ok(Some(verdict));
            }
        }
    }

    /// Consume verdicts until the first stable one.
    ///
    /// Returns `Ok(None)` when cancelled first.
    pub async fn run_until_stable(&mut self) -> Result<Option<StabilityVerdict>, PipelineError> {
        loop {
            match self.next_verdict().await? {
                None => return Ok(None),
                Some(verdict) if verdict.is_stable => {
                    info!(
                        temperature_slope = verdict.temperature_slope,
                        stability_slope = verdict.stability_slope,
                        stability_mean = verdict.stability_mean,
                        "Setpoint reached stability"
                    );
                    return Ok(Some(verdict));
                }
                Some(verdict) => {
                    debug!(
                        temperature_slope = verdict.temperature_slope,
                        stability_slope = verdict.stability_slope,
                        stability_mean = verdict.stability_mean,
                        "Not yet stable"
                    );
                }
            }
        }
    }
}

/// Buffers samples into overlapping windows without evaluating them.
///
/// The raw-window counterpart to [`StabilityMonitor`], for consumers
/// that want the tagged samples themselves (ad-hoc trend inspection,
/// plotting). Uses the same warm-up and cancellation rules.
pub struct WindowObserver<S> {
    source: S,
    window: SlidingWindow,
    cancel: CancellationToken,
}

impl<S: SampleSource> WindowObserver<S> {
    pub fn new(source: S, window_len: usize, cancel: CancellationToken) -> Self {
        Self {
            source,
            window: SlidingWindow::new(window_len),
            cancel,
        }
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Produce the next full window (oldest sample first), or `None`
    /// when cancelled.
    pub async fn next_window(&mut self) -> Result<Option<Vec<Sample>>, PipelineError> {
        loop {
            let sample = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(None),
                result = self.source.next_sample() => result?,
            };
            if let Some(full) = self.window.push(sample) {
                return Ok(Some(full.to_vec()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::pipeline::stability::{StabilitySource, StabilityThresholds, TemperatureSource};
    use crate::sample::{Field, Sample};
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Replays a fixed script of samples, then reports the source gone.
    struct ScriptedSource {
        samples: VecDeque<Sample>,
    }

    impl ScriptedSource {
        fn constant(temperature: f64, stability: f64, count: usize) -> Self {
            let samples = (0..count)
                .map(|i| {
                    Sample::tagged(Field::StartTime, 0.0)
                        .with(Field::DeltaTime, i as f64)
                        .with(Field::UserTemperature, temperature)
                        .with(Field::UserStability, stability)
                })
                .collect();
            Self { samples }
        }
    }

    #[async_trait]
    impl SampleSource for ScriptedSource {
        async fn next_sample(&mut self) -> Result<Sample, PipelineError> {
            self.samples
                .pop_front()
                .ok_or(PipelineError::Client(ClientError::ConnectionClosed))
        }

        fn source_name(&self) -> &str {
            "scripted"
        }
    }

    fn user_evaluator() -> StabilityEvaluator {
        StabilityEvaluator::new(
            TemperatureSource::User,
            StabilitySource::User,
            StabilityThresholds::default(),
        )
    }

    #[tokio::test]
    async fn test_first_verdict_arrives_after_warmup() {
        let source = ScriptedSource::constant(5.0, 0.05, 30);
        let mut monitor =
            StabilityMonitor::new(source, 30, user_evaluator(), CancellationToken::new());

        let verdict = monitor
            .next_verdict()
            .await
            .expect("pipeline")
            .expect("verdict");
        assert!((verdict.stability_mean - 0.05).abs() < 1e-12);
        assert!(verdict.temperature_slope.abs() < 1e-9);
        assert!(verdict.stability_slope.abs() < 1e-9);
        // Zero slopes do not exceed the strict thresholds
        assert!(!verdict.is_stable);
        assert_eq!(monitor.verdicts_emitted(), 1);

        // Source exhausted: the run terminates with the source's error
        let err = monitor.next_verdict().await.expect_err("exhausted");
        assert!(matches!(
            err,
            PipelineError::Client(ClientError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_short_run_emits_no_verdict() {
        let source = ScriptedSource::constant(5.0, 0.05, 10);
        let mut monitor =
            StabilityMonitor::new(source, 30, user_evaluator(), CancellationToken::new());

        let err = monitor.next_verdict().await.expect_err("exhausted");
        assert!(matches!(err, PipelineError::Client(_)));
        assert_eq!(monitor.verdicts_emitted(), 0);
    }

    #[tokio::test]
    async fn test_window_observer_emits_raw_windows() {
        let source = ScriptedSource::constant(5.0, 0.05, 7);
        let mut observer = WindowObserver::new(source, 5, CancellationToken::new());

        let first = observer
            .next_window()
            .await
            .expect("pipeline")
            .expect("window");
        assert_eq!(first.len(), 5);
        assert_eq!(first[0].get(Field::DeltaTime), Some(0.0));
        assert_eq!(first[4].get(Field::DeltaTime), Some(4.0));

        // Stride 1: the next window arrives one sample later
        let second = observer
            .next_window()
            .await
            .expect("pipeline")
            .expect("window");
        assert_eq!(second[0].get(Field::DeltaTime), Some(1.0));
        assert_eq!(second[4].get(Field::DeltaTime), Some(5.0));
    }

    #[tokio::test]
    async fn test_cancellation_wins_over_sampling() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let source = ScriptedSource::constant(5.0, 0.05, 30);
        let mut monitor = StabilityMonitor::new(source, 30, user_evaluator(), cancel);

        let outcome = monitor.next_verdict().await.expect("pipeline");
        assert!(outcome.is_none());
    }
}
