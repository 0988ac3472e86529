// ── Canonical device state ──
//
// One entry per (node_id, device_name). Every operation is a short
// synchronous critical section on the entry's shard; the resulting state
// is published to subscribers while the entry is still held, so delivery
// order per device equals write order.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::sync::broadcast;
use tracing::trace;

use crate::model::{DeviceKey, DevicePatch, DeviceState, Field, ObservedDevice, SystemStatus};
use crate::stream::{StateChange, Subscription};

const CHANGE_CHANNEL_SIZE: usize = 256;

/// Who is writing a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOrigin {
    /// A local mutation whose network call has not resolved yet. Touched
    /// fields become pending.
    Optimistic,
    /// Values confirmed by the service. Nothing becomes pending.
    Authoritative,
}

/// Why a state was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChangeOrigin {
    Optimistic,
    Committed,
    Reverted,
    Polled,
}

#[derive(Debug, Clone)]
struct Entry {
    state: DeviceState,
    pending: BTreeSet<Field>,
    /// Last switch position reported by a poll.
    observed_power: Option<bool>,
}

/// In-memory canonical state for every known device.
pub struct DeviceStateStore {
    devices: DashMap<DeviceKey, Entry>,
    changes: broadcast::Sender<Arc<StateChange>>,
}

impl DeviceStateStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        Self {
            devices: DashMap::new(),
            changes,
        }
    }

    /// Current state of a device, or `None` if it was never observed.
    pub fn snapshot(&self, node_id: &str, device: &str) -> Option<DeviceState> {
        self.devices
            .get(&DeviceKey::new(node_id, device))
            .map(|e| e.state.clone())
    }

    /// Merge a partial update.
    ///
    /// Optimistic patches mark the touched fields pending and are always
    /// published. Authoritative patches are published only when they
    /// change the state. Returns the resulting state, or `None` for an
    /// unknown device.
    pub fn apply_patch(
        &self,
        node_id: &str,
        device: &str,
        patch: &DevicePatch,
        origin: PatchOrigin,
    ) -> Option<DeviceState> {
        let key = DeviceKey::new(node_id, device);
        let mut entry = self.devices.get_mut(&key)?;

        let before = entry.state.clone();
        patch.apply_to(&mut entry.state);

        let publish = match origin {
            PatchOrigin::Optimistic => {
                entry.pending.extend(patch.fields());
                Some(ChangeOrigin::Optimistic)
            }
            PatchOrigin::Authoritative => (entry.state != before).then_some(ChangeOrigin::Committed),
        };

        let state = entry.state.clone();
        if let Some(change) = publish {
            self.publish(&key, &state, change);
        }
        Some(state)
    }

    /// Clear pending markers. Returns the current state.
    pub fn commit(&self, node_id: &str, device: &str) -> Option<DeviceState> {
        let mut entry = self.devices.get_mut(&DeviceKey::new(node_id, device))?;
        entry.pending.clear();
        Some(entry.state.clone())
    }

    /// Restore `snapshot` exactly, clear pending markers, and publish.
    pub fn rollback(&self, node_id: &str, device: &str, snapshot: DeviceState) -> Option<DeviceState> {
        let key = DeviceKey::new(node_id, device);
        let mut entry = self.devices.get_mut(&key)?;
        entry.state = snapshot;
        entry.pending.clear();
        let state = entry.state.clone();
        self.publish(&key, &state, ChangeOrigin::Reverted);
        Some(state)
    }

    /// Apply poll values field by field, skipping pending fields.
    ///
    /// Creates the device on first observation. `system_status` is derived
    /// from the observed raw values. The merged state is always published.
    pub fn merge_poll_result(
        &self,
        node_id: &str,
        device: &str,
        observed: &ObservedDevice,
    ) -> DeviceState {
        let key = DeviceKey::new(node_id, device);
        let mut entry = match self.devices.entry(key.clone()) {
            MapEntry::Occupied(e) => e.into_ref(),
            MapEntry::Vacant(e) => e.insert(Entry {
                state: DeviceState::default(),
                pending: BTreeSet::new(),
                observed_power: None,
            }),
        };
        let Entry {
            state,
            pending,
            observed_power,
        } = &mut *entry;

        if !pending.contains(&Field::Power)
            && let Some(power) = observed.power
        {
            state.power = power;
        }
        if !pending.contains(&Field::Brightness)
            && let Some(brightness) = observed.brightness
        {
            state.brightness = brightness.min(100);
        }
        if !pending.contains(&Field::Color)
            && let Some(color) = observed.color
        {
            state.color = color;
        }
        if !pending.contains(&Field::RefillLife)
            && let Some(refill_life) = observed.refill_life
        {
            state.refill_life = refill_life;
        }
        if let Some(code) = observed.status_code {
            state.status_code = code;
        }
        if let Some(code) = observed.error_code {
            state.error_code = code;
        }
        if let Some(minutes) = observed.runtime_minutes {
            state.runtime_minutes = minutes;
        }
        state.last_observed_at = Some(observed.observed_at);

        // Status follows the last reported switch position, never an
        // in-flight one.
        if observed.power.is_some() {
            *observed_power = observed.power;
        }
        state.system_status = SystemStatus::from_observation(
            state.error_code,
            observed_power.unwrap_or(state.power),
            state.status_code,
        );

        if !pending.is_empty() {
            trace!(device = %key, ?pending, "kept pending fields during merge");
        }

        let state = state.clone();
        self.publish(&key, &state, ChangeOrigin::Polled);
        state
    }

    /// Fields currently marked pending for a device.
    pub fn pending_fields(&self, node_id: &str, device: &str) -> BTreeSet<Field> {
        self.devices
            .get(&DeviceKey::new(node_id, device))
            .map(|e| e.pending.clone())
            .unwrap_or_default()
    }

    /// All devices, sorted by key.
    pub fn devices(&self) -> Vec<(DeviceKey, DeviceState)> {
        let mut all: Vec<_> = self
            .devices
            .iter()
            .map(|r| (r.key().clone(), r.value().state.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Devices of one node, sorted by name.
    pub fn devices_for_node(&self, node_id: &str) -> Vec<(String, DeviceState)> {
        self.devices()
            .into_iter()
            .filter(|(key, _)| key.node_id == node_id)
            .map(|(key, state)| (key.device, state))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Subscribe to every published change.
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.changes.subscribe())
    }

    fn publish(&self, key: &DeviceKey, state: &DeviceState, origin: ChangeOrigin) {
        // No receivers is fine.
        let _ = self.changes.send(Arc::new(StateChange {
            node_id: key.node_id.clone(),
            device_name: key.device.clone(),
            state: state.clone(),
            origin,
        }));
    }
}

impl Default for DeviceStateStore {
    fn default() -> Self {
        Self::new()
    }
}
