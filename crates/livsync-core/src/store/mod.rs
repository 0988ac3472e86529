// ── Reactive data store ──
//
// Canonical device state with pending-field tracking, plus the node
// collection with push-based change notification.

mod collection;
mod device_store;

pub(crate) use collection::EntityCollection;
pub use device_store::{ChangeOrigin, DeviceStateStore, PatchOrigin};
