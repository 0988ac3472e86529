// ── Device state ──
//
// The mutable control/telemetry surface of one sub-device of a node.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::color::Rgb;

/// Identifies one device: `(node_id, device_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    pub node_id: String,
    pub device: String,
}

impl DeviceKey {
    pub fn new(node_id: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            device: device.into(),
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node_id, self.device)
    }
}

/// Derived operating status of a repeller.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Off,
    WarmingUp,
    Protected,
    Error,
    #[default]
    Unknown,
}

impl SystemStatus {
    /// Derive the status from observed values.
    ///
    /// Any error code wins, then the repeller switch, then the raw code.
    pub fn from_observation(error_code: i64, enable_repellers: bool, status_code: i64) -> Self {
        if error_code > 0 {
            Self::Error
        } else if !enable_repellers {
            Self::Off
        } else {
            match status_code {
                1 => Self::Off,
                2 => Self::WarmingUp,
                3 => Self::Protected,
                _ => Self::Unknown,
            }
        }
    }

    /// Human label for display surfaces.
    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::WarmingUp => "Warming Up",
            Self::Protected => "Protected",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        }
    }
}

/// Canonical state of one device.
///
/// `led_power` is not stored; [`DeviceState::led_power`] derives it on
/// every read so it cannot drift from `power` and `brightness`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub power: bool,
    /// 0-100.
    pub brightness: u8,
    pub color: Rgb,
    pub refill_life: f64,
    /// Only ever produced by poll results.
    pub system_status: SystemStatus,
    /// Raw `System Status` code last reported.
    pub status_code: i64,
    pub error_code: i64,
    pub runtime_minutes: u64,
    pub last_observed_at: Option<DateTime<Utc>>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            power: false,
            brightness: 0,
            color: Rgb::default(),
            refill_life: 0.0,
            system_status: SystemStatus::Unknown,
            status_code: 0,
            error_code: 0,
            runtime_minutes: 0,
            last_observed_at: None,
        }
    }
}

impl DeviceState {
    pub fn led_power(&self) -> bool {
        self.power && self.brightness > 0
    }

    /// Runtime counter as reported by the service.
    pub fn runtime(&self) -> Duration {
        Duration::from_secs(self.runtime_minutes.saturating_mul(60))
    }
}

// ── Patches ──

/// A locally writable field. Pending markers are tracked per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    Power,
    Brightness,
    Color,
    RefillLife,
}

/// A partial update of the writable fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevicePatch {
    pub power: Option<bool>,
    pub brightness: Option<u8>,
    pub color: Option<Rgb>,
    pub refill_life: Option<f64>,
}

impl DevicePatch {
    pub fn fields(&self) -> BTreeSet<Field> {
        [
            self.power.map(|_| Field::Power),
            self.brightness.map(|_| Field::Brightness),
            self.color.map(|_| Field::Color),
            self.refill_life.map(|_| Field::RefillLife),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Write the set fields into `state`.
    pub(crate) fn apply_to(&self, state: &mut DeviceState) {
        if let Some(power) = self.power {
            state.power = power;
        }
        if let Some(brightness) = self.brightness {
            state.brightness = brightness.min(100);
        }
        if let Some(color) = self.color {
            state.color = color;
        }
        if let Some(refill_life) = self.refill_life {
            state.refill_life = refill_life;
        }
    }
}

/// Values read for one device during a poll. Absent fields were not
/// reported and leave the stored value untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedDevice {
    pub power: Option<bool>,
    pub brightness: Option<u8>,
    pub color: Option<Rgb>,
    pub refill_life: Option<f64>,
    pub status_code: Option<i64>,
    pub error_code: Option<i64>,
    pub runtime_minutes: Option<u64>,
    pub observed_at: DateTime<Utc>,
}

impl ObservedDevice {
    pub fn empty(observed_at: DateTime<Utc>) -> Self {
        Self {
            power: None,
            brightness: None,
            color: None,
            refill_life: None,
            status_code: None,
            error_code: None,
            runtime_minutes: None,
            observed_at,
        }
    }
}
