// ── Domain model ──
//
// Fixed-field records the engine works with. Wire documents from
// livsync-api are translated into these in `convert.rs`.

pub mod color;
pub mod device;
pub mod node;

pub use color::{ParseRgbError, Rgb, brightness_to_external, brightness_to_native};
pub use device::{DeviceKey, DevicePatch, DeviceState, Field, ObservedDevice, SystemStatus};
pub use node::Node;
