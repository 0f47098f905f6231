//! Tagged sample records.
//!
//! A [`Sample`] is an immutable, insertion-ordered mapping from a named
//! instrument field to a numeric value. Pipeline stages compose samples
//! by [`Sample::join`] rather than by mutation, so a reading's
//! provenance is never lost as it flows through the sampler, the
//! sliding window, and the stability evaluator.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// The closed field schema for instrument readings and timing metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    // Timing metadata stamped by the periodic sampler
    StartTime,
    DeltaTime,
    // Instrument readings
    AlarmState,
    ChamberPressure,
    UserStageSetpoint,
    PlatformHeaterPower,
    PidF,
    PidK,
    PidT,
    PlatformTemperature,
    PlatformStability,
    Stage1HeaterPower,
    Stage1Temperature,
    Stage2Temperature,
    SampleStability,
    SampleTemperature,
    PlatformSetpoint,
    UserTemperature,
    UserStability,
}

impl Field {
    /// Stable snake_case name used in logs and serialized output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Field::StartTime => "start_time",
            Field::DeltaTime => "delta_time",
            Field::AlarmState => "alarm_state",
            Field::ChamberPressure => "chamber_pressure",
            Field::UserStageSetpoint => "user_stage_setpoint",
            Field::PlatformHeaterPower => "platform_heater_power",
            Field::PidF => "pid_f",
            Field::PidK => "pid_k",
            Field::PidT => "pid_t",
            Field::PlatformTemperature => "platform_temperature",
            Field::PlatformStability => "platform_stability",
            Field::Stage1HeaterPower => "stage1_heater_power",
            Field::Stage1Temperature => "stage1_temperature",
            Field::Stage2Temperature => "stage2_temperature",
            Field::SampleStability => "sample_stability",
            Field::SampleTemperature => "sample_temperature",
            Field::PlatformSetpoint => "platform_setpoint",
            Field::UserTemperature => "user_temperature",
            Field::UserStability => "user_stability",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An insertion-ordered tagged record of simultaneous readings.
///
/// Joins are last-write-wins: on a key collision the other sample's
/// value replaces this one's, keeping the original key position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    fields: Vec<(Field, f64)>,
}

impl Sample {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// A record holding a single tagged value.
    pub fn tagged(field: Field, value: f64) -> Self {
        Self {
            fields: vec![(field, value)],
        }
    }

    /// Builder-style append, with last-write-wins on collision.
    #[must_use]
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.set(field, value);
        self
    }

    fn set(&mut self, field: Field, value: f64) {
        match self.fields.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Look up a field's value.
    pub fn get(&self, field: Field) -> Option<f64> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| *v)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.iter().any(|(f, _)| *f == field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        self.fields.iter().copied()
    }

    /// Union of `self` and `other` as a new record.
    ///
    /// On collision `other`'s value wins; the colliding key keeps the
    /// position it already had in `self`.
    #[must_use]
    pub fn join(&self, other: &Sample) -> Sample {
        let mut joined = self.clone();
        for (field, value) in other.iter() {
            joined.set(field, value);
        }
        joined
    }
}

/// Fold a sequence of samples left-to-right through [`Sample::join`].
pub fn join_list<'a, I>(samples: I) -> Sample
where
    I: IntoIterator<Item = &'a Sample>,
{
    samples
        .into_iter()
        .fold(Sample::new(), |acc, sample| acc.join(sample))
}

impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, value) in &self.fields {
            map.serialize_entry(field.as_str(), value)?;
        }
        map.end()
    }
}
