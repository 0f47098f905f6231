//! Typed instrument command layer.
//!
//! Flat request/response wrappers over [`CryostationClient::query`],
//! one per firmware command, plus tagged single-field reads used to
//! compose periodic samples. Command semantics are owned by the
//! instrument firmware; this layer only does the type mapping.

use crate::client::{ClientError, CryostationClient};
use crate::sample::{Field, Sample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Instrument command codes
pub mod cmd {
    pub const GET_ALARM_STATE: &str = "GAS";
    pub const GET_CHAMBER_PRESSURE: &str = "GCP";
    pub const GET_USER_STAGE_SETPOINT: &str = "GHTSP";
    pub const GET_PLATFORM_HEATER_POWER: &str = "GPHP";
    pub const GET_PID_F: &str = "GPIDF";
    pub const GET_PID_K: &str = "GPIDK";
    pub const GET_PID_T: &str = "GPIDT";
    pub const GET_PLATFORM_TEMPERATURE: &str = "GPT";
    pub const GET_PLATFORM_STABILITY: &str = "GPS";
    pub const GET_STAGE1_HEATER_POWER: &str = "GS1HP";
    pub const GET_STAGE1_TEMPERATURE: &str = "GS1T";
    pub const GET_STAGE2_TEMPERATURE: &str = "GS2T";
    pub const GET_SAMPLE_STABILITY: &str = "GSS";
    pub const GET_SAMPLE_TEMPERATURE: &str = "GST";
    pub const GET_PLATFORM_SETPOINT: &str = "GTSP";
    pub const GET_USER_TEMPERATURE: &str = "GUT";
    pub const GET_USER_STABILITY: &str = "GUS";

    pub const SET_PLATFORM_SETPOINT: &str = "STSP";
    pub const SET_USER_STAGE_SETPOINT: &str = "SHTSP";
    pub const RESET_PID: &str = "RPID";
    pub const START_COOLDOWN: &str = "SCD";
    pub const START_WARMUP: &str = "SWU";
    pub const START_STANDBY: &str = "SSB";
}

// ============================================================================
// Get Commands
// ============================================================================

impl CryostationClient {
    /// Whether the instrument alarm is raised.
    pub async fn alarm_state(&mut self) -> Result<bool, ClientError> {
        self.query_bool(cmd::GET_ALARM_STATE).await
    }

    /// Chamber pressure (mTorr).
    pub async fn chamber_pressure(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_CHAMBER_PRESSURE).await
    }

    /// User-stage temperature setpoint (K).
    pub async fn user_stage_setpoint(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_USER_STAGE_SETPOINT).await
    }

    /// Platform heater output power (W).
    pub async fn platform_heater_power(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_PLATFORM_HEATER_POWER).await
    }

    pub async fn pid_f(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_PID_F).await
    }

    pub async fn pid_k(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_PID_K).await
    }

    pub async fn pid_t(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_PID_T).await
    }

    /// Platform temperature (K).
    pub async fn platform_temperature(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_PLATFORM_TEMPERATURE).await
    }

    /// Platform stability metric (K); lower is more stable.
    pub async fn platform_stability(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_PLATFORM_STABILITY).await
    }

    pub async fn stage1_heater_power(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_STAGE1_HEATER_POWER).await
    }

    pub async fn stage1_temperature(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_STAGE1_TEMPERATURE).await
    }

    pub async fn stage2_temperature(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_STAGE2_TEMPERATURE).await
    }

    /// Sample stability metric (K).
    pub async fn sample_stability(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_SAMPLE_STABILITY).await
    }

    /// Sample temperature (K).
    pub async fn sample_temperature(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_SAMPLE_TEMPERATURE).await
    }

    /// Platform temperature setpoint (K).
    pub async fn platform_setpoint(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_PLATFORM_SETPOINT).await
    }

    /// User temperature (K).
    pub async fn user_temperature(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_USER_TEMPERATURE).await
    }

    /// User stability metric (K).
    pub async fn user_stability(&mut self) -> Result<f64, ClientError> {
        self.query_float(cmd::GET_USER_STABILITY).await
    }

    // ========================================================================
    // Set / Action Commands
    // ========================================================================

    /// Set the platform temperature setpoint (K).
    pub async fn set_platform_setpoint(&mut self, setpoint: f64) -> Result<(), ClientError> {
        self.query_with_float(cmd::SET_PLATFORM_SETPOINT, setpoint)
            .await?;
        Ok(())
    }

    /// Set the user-stage temperature setpoint (K).
    pub async fn set_user_stage_setpoint(&mut self, setpoint: f64) -> Result<(), ClientError> {
        self.query_with_float(cmd::SET_USER_STAGE_SETPOINT, setpoint)
            .await?;
        Ok(())
    }

    /// Reset PID control parameters to firmware defaults.
    pub async fn reset_pid(&mut self) -> Result<(), ClientError> {
        self.query(cmd::RESET_PID).await?;
        Ok(())
    }

    /// Begin a cooldown cycle.
    pub async fn start_cooldown(&mut self) -> Result<(), ClientError> {
        self.query(cmd::START_COOLDOWN).await?;
        Ok(())
    }

    /// Begin a warmup cycle.
    pub async fn start_warmup(&mut self) -> Result<(), ClientError> {
        self.query(cmd::START_WARMUP).await?;
        Ok(())
    }

    /// Enter standby.
    pub async fn start_standby(&mut self) -> Result<(), ClientError> {
        self.query(cmd::START_STANDBY).await?;
        Ok(())
    }

    // ========================================================================
    // Tagged Reads
    // ========================================================================

    /// Execute one reading and return it as a single-field [`Sample`].
    ///
    /// Booleans are tagged as `1.0` / `0.0`.
    pub async fn read_tagged(&mut self, reading: Reading) -> Result<Sample, ClientError> {
        let value = match reading {
            Reading::AlarmState => {
                if self.alarm_state().await? {
                    1.0
                } else {
                    0.0
                }
            }
            Reading::ChamberPressure => self.chamber_pressure().await?,
            Reading::UserStageSetpoint => self.user_stage_setpoint().await?,
            Reading::PlatformHeaterPower => self.platform_heater_power().await?,
            Reading::PidF => self.pid_f().await?,
            Reading::PidK => self.pid_k().await?,
            Reading::PidT => self.pid_t().await?,
            Reading::PlatformTemperature => self.platform_temperature().await?,
            Reading::PlatformStability => self.platform_stability().await?,
            Reading::Stage1HeaterPower => self.stage1_heater_power().await?,
            Reading::Stage1Temperature => self.stage1_temperature().await?,
            Reading::Stage2Temperature => self.stage2_temperature().await?,
            Reading::SampleStability => self.sample_stability().await?,
            Reading::SampleTemperature => self.sample_temperature().await?,
            Reading::PlatformSetpoint => self.platform_setpoint().await?,
            Reading::UserTemperature => self.user_temperature().await?,
            Reading::UserStability => self.user_stability().await?,
        };
        Ok(Sample::tagged(reading.field(), value))
    }

    /// One-shot snapshot of the readings an operator usually wants.
    pub async fn snapshot(&mut self) -> Result<StatusSnapshot, ClientError> {
        Ok(StatusSnapshot {
            timestamp: Utc::now(),
            alarm_state: self.alarm_state().await?,
            chamber_pressure: self.chamber_pressure().await?,
            platform_temperature: self.platform_temperature().await?,
            platform_stability: self.platform_stability().await?,
            platform_setpoint: self.platform_setpoint().await?,
            sample_temperature: self.sample_temperature().await?,
            sample_stability: self.sample_stability().await?,
            user_temperature: self.user_temperature().await?,
            user_stability: self.user_stability().await?,
            user_stage_setpoint: self.user_stage_setpoint().await?,
        })
    }
}

/// A single named instrument reading, for composing periodic samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reading {
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

impl Reading {
    /// The field this reading is tagged under.
    pub const fn field(self) -> Field {
        match self {
            Reading::AlarmState => Field::AlarmState,
            Reading::ChamberPressure => Field::ChamberPressure,
            Reading::UserStageSetpoint => Field::UserStageSetpoint,
            Reading::PlatformHeaterPower => Field::PlatformHeaterPower,
            Reading::PidF => Field::PidF,
            Reading::PidK => Field::PidK,
            Reading::PidT => Field::PidT,
            Reading::PlatformTemperature => Field::PlatformTemperature,
            Reading::PlatformStability => Field::PlatformStability,
            Reading::Stage1HeaterPower => Field::Stage1HeaterPower,
            Reading::Stage1Temperature => Field::Stage1Temperature,
            Reading::Stage2Temperature => Field::Stage2Temperature,
            Reading::SampleStability => Field::SampleStability,
            Reading::SampleTemperature => Field::SampleTemperature,
            Reading::PlatformSetpoint => Field::PlatformSetpoint,
            Reading::UserTemperature => Field::UserTemperature,
            Reading::UserStability => Field::UserStability,
        }
    }
}

/// One-shot operator-facing status report.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub timestamp: DateTime<Utc>,
    pub alarm_state: bool,
    pub chamber_pressure: f64,
    pub platform_temperature: f64,
    pub platform_stability: f64,
    pub platform_setpoint: f64,
    pub sample_temperature: f64,
    pub sample_stability: f64,
    pub user_temperature: f64,
    pub user_stability: f64,
    pub user_stage_setpoint: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_field_mapping() {
        assert_eq!(Reading::UserTemperature.field(), Field::UserTemperature);
        assert_eq!(Reading::UserStability.field(), Field::UserStability);
        assert_eq!(Reading::PlatformStability.field(), Field::PlatformStability);
        assert_eq!(Reading::AlarmState.field(), Field::AlarmState);
    }
}
