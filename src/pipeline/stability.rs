//! Thermal stability evaluation over a sample window.
//!
//! Fits ordinary-least-squares trends to the temperature and stability
//! readings of a full sliding window, normalises them, and compares
//! against thresholds to produce a [`StabilityVerdict`].

use crate::sample::{Field, Sample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

/// Default verdict thresholds
pub mod thresholds {
    /// Normalised temperature slope threshold (1/s).
    pub const TEMPERATURE_SLOPE: f64 = 5e-3;
    /// Normalised stability slope threshold (1/s).
    pub const STABILITY_SLOPE: f64 = 5e-3;
    /// Maximum mean stability metric for a stable verdict (K).
    pub const MAX_STABILITY: f64 = 0.1;
}

/// Trend computation errors. All are terminal for the pipeline run.
#[derive(Debug, Error)]
pub enum RegressionError {
    #[error("window is empty")]
    EmptyWindow,

    #[error("sample missing field {0}")]
    MissingField(Field),

    #[error("degenerate window: no time spread across {0} samples")]
    DegenerateWindow(usize),

    #[error("zero {0} normaliser makes the relative slope undefined")]
    ZeroNormalizer(&'static str),
}

/// Which temperature reading the evaluator trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureSource {
    Sample,
    Platform,
    User,
}

impl TemperatureSource {
    pub const fn field(self) -> Field {
        match self {
            TemperatureSource::Sample => Field::SampleTemperature,
            TemperatureSource::Platform => Field::PlatformTemperature,
            TemperatureSource::User => Field::UserTemperature,
        }
    }
}

/// Which stability reading the evaluator trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilitySource {
    Sample,
    Platform,
    User,
}

impl StabilitySource {
    pub const fn field(self) -> Field {
        match self {
            StabilitySource::Sample => Field::SampleStability,
            StabilitySource::Platform => Field::PlatformStability,
            StabilitySource::User => Field::UserStability,
        }
    }
}

/// Verdict thresholds.
///
/// Note the comparison direction: a window counts as stable only when
/// both normalised slopes *exceed* their thresholds (strictly `>`) and
/// the mean stability metric is below `max_stability`. This matches the
/// deployed control scripts this client replaces: with the default
/// thresholds a perfectly flat trend is reported as not stable. Do not
/// flip the comparators without confirming against the instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityThresholds {
    pub temperature_slope_threshold: f64,
    pub stability_slope_threshold: f64,
    pub max_stability: f64,
}

impl Default for StabilityThresholds {
    fn default() -> Self {
        Self {
            temperature_slope_threshold: thresholds::TEMPERATURE_SLOPE,
            stability_slope_threshold: thresholds::STABILITY_SLOPE,
            max_stability: thresholds::MAX_STABILITY,
        }
    }
}

/// The outcome of one stability evaluation over one full window.
#[derive(Debug, Clone, Serialize)]
pub struct StabilityVerdict {
    /// Wall-clock time the verdict was computed.
    pub timestamp: DateTime<Utc>,
    /// OLS temperature slope divided by the window's last temperature (1/s).
    pub temperature_slope: f64,
    /// OLS stability slope divided by the window's mean stability (1/s).
    pub stability_slope: f64,
    /// Arithmetic mean of the window's stability metric (K).
    pub stability_mean: f64,
    /// Threshold comparison result (see [`StabilityThresholds`]).
    pub is_stable: bool,
}

/// Computes a [`StabilityVerdict`] from a full sample window.
#[derive(Debug, Clone)]
pub struct StabilityEvaluator {
    temperature: TemperatureSource,
    stability: StabilitySource,
    thresholds: StabilityThresholds,
}

impl StabilityEvaluator {
    pub fn new(
        temperature: TemperatureSource,
        stability: StabilitySource,
        thresholds: StabilityThresholds,
    ) -> Self {
        Self {
            temperature,
            stability,
            thresholds,
        }
    }

    /// Evaluate one full window.
    ///
    /// Every sample must carry `delta_time` plus the configured
    /// temperature and stability fields.
    pub fn evaluate(&self, window: &[Sample]) -> Result<StabilityVerdict, RegressionError> {
        if window.is_empty() {
            return Err(RegressionError::EmptyWindow);
        }

        let temperature_field = self.temperature.field();
        let stability_field = self.stability.field();

        let mut times = Vec::with_capacity(window.len());
        let mut temps = Vec::with_capacity(window.len());
        let mut stabs = Vec::with_capacity(window.len());
        for sample in window {
            times.push(
                sample
                    .get(Field::DeltaTime)
                    .ok_or(RegressionError::MissingField(Field::DeltaTime))?,
            );
            temps.push(
                sample
                    .get(temperature_field)
                    .ok_or(RegressionError::MissingField(temperature_field))?,
            );
            stabs.push(
                sample
                    .get(stability_field)
                    .ok_or(RegressionError::MissingField(stability_field))?,
            );
        }

        let temp_slope =
            ols_slope(&times, &temps).ok_or(RegressionError::DegenerateWindow(window.len()))?;
        let stab_slope =
            ols_slope(&times, &stabs).ok_or(RegressionError::DegenerateWindow(window.len()))?;

        let stability_mean = Statistics::mean(&stabs);
        let last_temperature = temps[temps.len() - 1];

        if last_temperature == 0.0 {
            return Err(RegressionError::ZeroNormalizer("temperature"));
        }
        if stability_mean == 0.0 {
            return Err(RegressionError::ZeroNormalizer("stability"));
        }

        let temperature_slope = temp_slope / last_temperature;
        let stability_slope = stab_slope / stability_mean;

        let is_stable = temperature_slope > self.thresholds.temperature_slope_threshold
            && stability_slope > self.thresholds.stability_slope_threshold
            && stability_mean < self.thresholds.max_stability;

        Ok(StabilityVerdict {
            timestamp: Utc::now(),
            temperature_slope,
            stability_slope,
            stability_mean,
            is_stable,
        })
    }
}

/// Ordinary-least-squares slope of `ys` against `xs`.
///
/// Returns `None` when the x spread is zero and the slope is undefined.
fn ols_slope(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = ys.iter().sum();
    let sum_xy: f64 = xs.iter().zip(ys.iter()).map(|(x, y)| x * y).sum();
    let sum_x2: f64 = xs.iter().map(|x| x * x).sum();

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return None;
    }
    Some((n * sum_xy - sum_x * sum_y) / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_of(values: &[(f64, f64, f64)]) -> Vec<Sample> {
        values
            .iter()
            .map(|&(t, temp, stab)| {
                Sample::tagged(Field::DeltaTime, t)
                    .with(Field::UserTemperature, temp)
                    .with(Field::UserStability, stab)
            })
            .collect()
    }

    fn user_evaluator(thresholds: StabilityThresholds) -> StabilityEvaluator {
        StabilityEvaluator::new(TemperatureSource::User, StabilitySource::User, thresholds)
    }

    #[test]
    fn test_constant_window_has_flat_trend() {
        let window = window_of(&[
            (0.0, 5.0, 0.05),
            (1.0, 5.0, 0.05),
            (2.0, 5.0, 0.05),
            (3.0, 5.0, 0.05),
        ]);
        let verdict = user_evaluator(StabilityThresholds::default())
            .evaluate(&window)
            .expect("evaluate");

        assert!((verdict.stability_mean - 0.05).abs() < 1e-12);
        assert!(verdict.temperature_slope.abs() < 1e-12);
        assert!(verdict.stability_slope.abs() < 1e-12);
        // Flat slopes do not exceed the strict thresholds
        assert!(!verdict.is_stable);
    }

    #[test]
    fn test_rising_trend_with_low_stability_is_stable() {
        let window = window_of(&[
            (0.0, 1.0, 0.010),
            (1.0, 2.0, 0.012),
            (2.0, 3.0, 0.014),
            (3.0, 4.0, 0.016),
        ]);
        let verdict = user_evaluator(StabilityThresholds::default())
            .evaluate(&window)
            .expect("evaluate");

        // temperature slope 1.0 K/s over last temperature 4.0 K
        assert!((verdict.temperature_slope - 0.25).abs() < 1e-9);
        assert!(verdict.stability_slope > 0.0);
        assert!(verdict.stability_mean < 0.1);
        assert!(verdict.is_stable);
    }

    #[test]
    fn test_high_stability_mean_blocks_stable_verdict() {
        let window = window_of(&[
            (0.0, 1.0, 0.3),
            (1.0, 2.0, 0.4),
            (2.0, 3.0, 0.5),
        ]);
        let verdict = user_evaluator(StabilityThresholds::default())
            .evaluate(&window)
            .expect("evaluate");

        assert!(verdict.stability_mean >= 0.1);
        assert!(!verdict.is_stable);
    }

    #[test]
    fn test_equal_times_are_degenerate() {
        let window = window_of(&[(2.0, 5.0, 0.05), (2.0, 5.1, 0.05), (2.0, 5.2, 0.05)]);
        let err = user_evaluator(StabilityThresholds::default())
            .evaluate(&window)
            .expect_err("must fail");
        assert!(matches!(err, RegressionError::DegenerateWindow(3)));
    }

    #[test]
    fn test_missing_field_is_reported() {
        let window = vec![Sample::tagged(Field::DeltaTime, 0.0)];
        let err = user_evaluator(StabilityThresholds::default())
            .evaluate(&window)
            .expect_err("must fail");
        assert!(matches!(
            err,
            RegressionError::MissingField(Field::UserTemperature)
        ));
    }

    #[test]
    fn test_empty_window_is_an_error() {
        let err = user_evaluator(StabilityThresholds::default())
            .evaluate(&[])
            .expect_err("must fail");
        assert!(matches!(err, RegressionError::EmptyWindow));
    }

    #[test]
    fn test_source_field_selection() {
        let evaluator = StabilityEvaluator::new(
            TemperatureSource::Platform,
            StabilitySource::Platform,
            StabilityThresholds::default(),
        );
        let window: Vec<Sample> = (0..3)
            .map(|i| {
                Sample::tagged(Field::DeltaTime, f64::from(i))
                    .with(Field::PlatformTemperature, 10.0 + f64::from(i))
                    .with(Field::PlatformStability, 0.02)
            })
            .collect();
        let verdict = evaluator.evaluate(&window).expect("evaluate");
        assert!((verdict.stability_mean - 0.02).abs() < 1e-12);
    }
}
