// Wire models for the node endpoints.
//
// Only the fields the engine consumes are modeled; everything else in a
// response is dropped here and never reaches the core.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ── Params ──────────────────────────────────────────────────────────

pub const KEY_ENABLE_REPELLERS: &str = "Enable Repellers";
pub const KEY_LED_BRIGHTNESS: &str = "LED Brightness";
pub const KEY_LED_HUE: &str = "LED Hue";
pub const KEY_REFILL_LIFE: &str = "Refill Life";
pub const KEY_REFILL_RESET: &str = "Refill Reset";
pub const KEY_SYSTEM_STATUS: &str = "System Status";
pub const KEY_ERROR: &str = "Error";
pub const KEY_SYSTEM_RUNTIME: &str = "System Runtime";
pub const KEY_NAME: &str = "Name";
pub const KEY_HUB_ID: &str = "Hub ID";

/// Observed parameters of one device, as reported by the service.
///
/// Every field is optional; a poll only overwrites what it actually saw.
/// Values of the wrong JSON type are treated as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceParams {
    pub enable_repellers: Option<bool>,
    /// 0-100.
    pub brightness: Option<f64>,
    /// 0-360 degrees.
    pub hue: Option<f64>,
    pub refill_life: Option<f64>,
    pub system_status: Option<i64>,
    pub error: Option<i64>,
    /// Minutes, as reported.
    pub runtime_minutes: Option<f64>,
    pub name: Option<String>,
    pub hub_id: Option<String>,
}

impl DeviceParams {
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        let num = |key: &str| obj.get(key).and_then(Value::as_f64);
        let int = |key: &str| {
            obj.get(key)
                .and_then(|v| v.as_i64().or_else(|| v.as_f64().and_then(float_to_i64)))
        };
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_owned);

        Self {
            enable_repellers: obj.get(KEY_ENABLE_REPELLERS).and_then(Value::as_bool),
            brightness: num(KEY_LED_BRIGHTNESS),
            hue: num(KEY_LED_HUE),
            refill_life: num(KEY_REFILL_LIFE),
            system_status: int(KEY_SYSTEM_STATUS),
            error: int(KEY_ERROR),
            runtime_minutes: num(KEY_SYSTEM_RUNTIME),
            name: text(KEY_NAME),
            hub_id: text(KEY_HUB_ID),
        }
    }

    /// Whether this entry carries any control or telemetry key. Entries
    /// that don't (e.g. node-level "Time" or "Schedule" blocks) are not
    /// devices.
    pub fn is_device(&self) -> bool {
        self.enable_repellers.is_some()
            || self.brightness.is_some()
            || self.hue.is_some()
            || self.refill_life.is_some()
            || self.system_status.is_some()
            || self.error.is_some()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn float_to_i64(v: f64) -> Option<i64> {
    v.is_finite().then(|| v.round() as i64)
}

/// The params document of one node, keyed by device name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeParams {
    pub devices: BTreeMap<String, DeviceParams>,
}

impl NodeParams {
    /// Parse a params document. A non-object top level is an error;
    /// non-device entries are dropped.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        let obj = value.as_object().ok_or_else(|| Error::Deserialization {
            message: "params document is not a JSON object".into(),
            body: truncate(&value.to_string()),
        })?;

        let devices = obj
            .iter()
            .filter_map(|(name, entry)| {
                let params = DeviceParams::from_object(entry.as_object()?);
                params.is_device().then(|| (name.clone(), params))
            })
            .collect();

        Ok(Self { devices })
    }

    pub fn device(&self, name: &str) -> Option<&DeviceParams> {
        self.devices.get(name)
    }
}

/// A partial write for one device. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceParamsUpdate {
    #[serde(rename = "Enable Repellers", skip_serializing_if = "Option::is_none")]
    pub enable_repellers: Option<bool>,
    #[serde(rename = "LED Brightness", skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(rename = "LED Hue", skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(rename = "Refill Reset", skip_serializing_if = "Option::is_none")]
    pub refill_reset: Option<u8>,
}

impl DeviceParamsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A params patch for one node, keyed by device name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParamsUpdate(pub BTreeMap<String, DeviceParamsUpdate>);

impl ParamsUpdate {
    pub fn for_device(device: impl Into<String>, update: DeviceParamsUpdate) -> Self {
        Self(BTreeMap::from([(device.into(), update)]))
    }
}

/// Result of a params write.
///
/// The service normally answers `{"status":"success"}`; when it echoes the
/// written params back instead, they are surfaced here as authoritative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetParamsOutcome {
    pub echoed: Option<NodeParams>,
}

// ── Node list ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct NodeListResponse {
    #[serde(default)]
    pub nodes: Vec<String>,
}

// ── Status ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub connectivity: Option<Connectivity>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Connectivity {
    #[serde(default)]
    pub connected: bool,
    /// Milliseconds since the epoch.
    pub timestamp: Option<i64>,
}

/// Connectivity of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStatus {
    pub connected: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl From<StatusResponse> for NodeStatus {
    fn from(resp: StatusResponse) -> Self {
        resp.connectivity.map_or_else(Self::default, |c| Self {
            connected: c.connected,
            last_seen: c.timestamp.and_then(DateTime::from_timestamp_millis),
        })
    }
}

// ── Config ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ConfigResponse {
    pub node_id: Option<String>,
    #[serde(default)]
    pub info: ConfigInfo,
    #[serde(default)]
    pub devices: Vec<ConfigDevice>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConfigInfo {
    pub name: Option<String>,
    pub fw_version: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub model: Option<String>,
}

/// A device declared in a node's config document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigDevice {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
}

/// Static facts about a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    pub node_id: Option<String>,
    pub name: Option<String>,
    pub firmware_version: Option<String>,
    pub model: Option<String>,
    pub node_type: Option<String>,
    pub devices: Vec<ConfigDevice>,
}

impl From<ConfigResponse> for NodeConfig {
    fn from(resp: ConfigResponse) -> Self {
        Self {
            node_id: resp.node_id,
            name: resp.info.name,
            firmware_version: resp.info.fw_version,
            model: resp.info.model,
            node_type: resp.info.node_type,
            devices: resp.devices,
        }
    }
}

/// Shorten a response body for inclusion in an error.
pub(crate) fn truncate(body: &str) -> String {
    const LIMIT: usize = 512;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn params_keep_devices_and_drop_the_rest() {
        let doc = json!({
            "LIV Hub": {
                "Enable Repellers": true,
                "LED Brightness": 50,
                "LED Hue": 120,
                "Refill Life": 87.5,
                "System Status": 3,
                "Error": 0,
                "System Runtime": 1440,
                "Name": "Patio",
                "Hub ID": "SN-001",
                "Firmware Blob": {"nested": true}
            },
            "Time": {"TZ": "America/Chicago"},
            "Schedule": [1, 2, 3]
        });

        let params = NodeParams::from_value(&doc).unwrap();
        assert_eq!(params.devices.len(), 1);
        let hub = params.device("LIV Hub").unwrap();
        assert_eq!(
            *hub,
            DeviceParams {
                enable_repellers: Some(true),
                brightness: Some(50.0),
                hue: Some(120.0),
                refill_life: Some(87.5),
                system_status: Some(3),
                error: Some(0),
                runtime_minutes: Some(1440.0),
                name: Some("Patio".into()),
                hub_id: Some("SN-001".into()),
            }
        );
    }

    #[test]
    fn wrong_typed_values_are_absent() {
        let doc = json!({"LIV Hub": {"Enable Repellers": "yes", "LED Brightness": 40}});
        let params = NodeParams::from_value(&doc).unwrap();
        let hub = params.device("LIV Hub").unwrap();
        assert_eq!(hub.enable_repellers, None);
        assert_eq!(hub.brightness, Some(40.0));
    }

    #[test]
    fn non_object_params_are_rejected() {
        let err = NodeParams::from_value(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }

    #[test]
    fn update_serializes_only_set_fields() {
        let update = ParamsUpdate::for_device(
            "LIV Hub",
            DeviceParamsUpdate {
                hue: Some(240),
                ..Default::default()
            },
        );
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"LIV Hub": {"LED Hue": 240}})
        );
    }

    #[test]
    fn status_maps_millisecond_timestamp() {
        let resp: StatusResponse = serde_json::from_value(json!({
            "connectivity": {"connected": true, "timestamp": 1_700_000_000_123_i64}
        }))
        .unwrap();
        let status = NodeStatus::from(resp);
        assert!(status.connected);
        assert_eq!(status.last_seen.unwrap().timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn status_without_connectivity_is_offline() {
        let resp: StatusResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(NodeStatus::from(resp), NodeStatus::default());
    }

    #[test]
    fn config_flattens_info() {
        let resp: ConfigResponse = serde_json::from_value(json!({
            "node_id": "n1",
            "info": {"name": "LIV Hub", "fw_version": "5.3.2", "type": "LIV", "model": "thermacell-hub"},
            "devices": [{"name": "LIV Hub", "type": "esp.device.liv", "params": []}]
        }))
        .unwrap();
        let config = NodeConfig::from(resp);
        assert_eq!(config.firmware_version.as_deref(), Some("5.3.2"));
        assert_eq!(config.model.as_deref(), Some("thermacell-hub"));
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].name, "LIV Hub");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(600);
        let short = truncate(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), 515);
    }
}
