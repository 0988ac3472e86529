// ── Wire → domain conversion ──
//
// Maps livsync-api params documents onto the domain model. Values are
// clamped to their domain ranges; anything unparseable is treated as not
// reported.

use chrono::{DateTime, Utc};
use livsync_api::DeviceParams;

use crate::model::{DevicePatch, ObservedDevice, Rgb};

/// Domain view of one device's params, stamped with the poll time.
pub fn observe(params: &DeviceParams, observed_at: DateTime<Utc>) -> ObservedDevice {
    ObservedDevice {
        power: params.enable_repellers,
        brightness: params.brightness.and_then(percent),
        color: params.hue.filter(|h| h.is_finite()).map(Rgb::from_hue),
        refill_life: params.refill_life.filter(|v| v.is_finite()),
        status_code: params.system_status,
        error_code: params.error,
        runtime_minutes: params.runtime_minutes.and_then(minutes),
        observed_at,
    }
}

/// Writable fields echoed back by a params write, as an overlay patch.
pub fn echo_patch(params: &DeviceParams) -> DevicePatch {
    DevicePatch {
        power: params.enable_repellers,
        brightness: params.brightness.and_then(percent),
        color: params.hue.filter(|h| h.is_finite()).map(Rgb::from_hue),
        refill_life: params.refill_life.filter(|v| v.is_finite()),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn percent(v: f64) -> Option<u8> {
    v.is_finite().then(|| v.round().clamp(0.0, 100.0) as u8)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn minutes(v: f64) -> Option<u64> {
    (v.is_finite() && v >= 0.0).then(|| v.round() as u64)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn observe_maps_and_clamps() {
        let now = Utc::now();
        let params = DeviceParams {
            enable_repellers: Some(true),
            brightness: Some(140.0),
            hue: Some(240.0),
            refill_life: Some(12.5),
            system_status: Some(3),
            error: Some(0),
            runtime_minutes: Some(-5.0),
            ..DeviceParams::default()
        };

        let observed = observe(&params, now);

        assert_eq!(
            observed,
            ObservedDevice {
                power: Some(true),
                brightness: Some(100),
                color: Some(Rgb::new(0, 0, 255)),
                refill_life: Some(12.5),
                status_code: Some(3),
                error_code: Some(0),
                runtime_minutes: None,
                observed_at: now,
            }
        );
    }

    #[test]
    fn echo_patch_only_carries_reported_fields() {
        let params = DeviceParams {
            brightness: Some(75.0),
            ..DeviceParams::default()
        };
        assert_eq!(
            echo_patch(&params),
            DevicePatch {
                brightness: Some(75),
                ..DevicePatch::default()
            }
        );
    }
}
