// ── Command API ──
//
// All write operations can be expressed as a `Command`. The coordinator
// dispatches each variant straight to its mutation entry point; there is
// no shared queue, so commands for different devices run in parallel.

use livsync_api::DeviceParamsUpdate;

use crate::model::{DevicePatch, DeviceState, Rgb};

/// All write operations against a hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetPower {
        node_id: String,
        device: String,
        on: bool,
    },
    /// Brightness on the native 0-100 scale.
    SetBrightness {
        node_id: String,
        device: String,
        brightness: u8,
    },
    SetColor {
        node_id: String,
        device: String,
        color: Rgb,
    },
    SetLed {
        node_id: String,
        device: String,
        on: bool,
    },
    ResetRefill {
        node_id: String,
        device: String,
    },
    /// Poll one node immediately.
    Refresh { node_id: String },
}

/// Outcome of a successful command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Final state of the mutated device.
    State(DeviceState),
    Refreshed,
}

/// Refill life assumed right after a reset.
pub const REFILL_RESET_VALUE: f64 = 100.0;

/// LED brightness used when the LED is switched on from zero. Switching
/// on an LED that is already lit keeps its brightness.
pub const LED_ON_BRIGHTNESS: u8 = 100;

/// A single-device mutation, independent of addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mutation {
    Power(bool),
    Brightness(u8),
    Color(Rgb),
    Led(bool),
    ResetRefill,
}

impl Mutation {
    /// The optimistic patch for this mutation against `snapshot`.
    pub(crate) fn compute_patch(self, snapshot: &DeviceState) -> DevicePatch {
        match self {
            Self::Power(on) => DevicePatch {
                power: Some(on),
                ..DevicePatch::default()
            },
            Self::Brightness(level) => DevicePatch {
                brightness: Some(level),
                ..DevicePatch::default()
            },
            // The hub keeps a hue and a brightness; saturation is lost, so
            // show what the next poll will report.
            Self::Color(color) => DevicePatch {
                color: Some(Rgb::from_hue(f64::from(color.hue()))),
                brightness: Some(color.value_percent()),
                ..DevicePatch::default()
            },
            Self::Led(on) => {
                let brightness = match (on, snapshot.brightness) {
                    (false, _) => 0,
                    (true, 0) => LED_ON_BRIGHTNESS,
                    (true, current) => current,
                };
                DevicePatch {
                    brightness: Some(brightness),
                    ..DevicePatch::default()
                }
            }
            Self::ResetRefill => DevicePatch {
                refill_life: Some(REFILL_RESET_VALUE),
                ..DevicePatch::default()
            },
        }
    }

    /// The wire write that persists `patch`.
    pub(crate) fn wire_update(self, patch: &DevicePatch) -> DeviceParamsUpdate {
        match self {
            Self::ResetRefill => DeviceParamsUpdate {
                refill_reset: Some(1),
                ..DeviceParamsUpdate::default()
            },
            Self::Color(color) => DeviceParamsUpdate {
                hue: Some(color.hue()),
                brightness: patch.brightness,
                ..DeviceParamsUpdate::default()
            },
            Self::Power(_) | Self::Brightness(_) | Self::Led(_) => DeviceParamsUpdate {
                enable_repellers: patch.power,
                brightness: patch.brightness,
                ..DeviceParamsUpdate::default()
            },
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Power(_) => "set_power",
            Self::Brightness(_) => "set_brightness",
            Self::Color(_) => "set_color",
            Self::Led(_) => "set_led",
            Self::ResetRefill => "reset_refill",
        }
    }
}
