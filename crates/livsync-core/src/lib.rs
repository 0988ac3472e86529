// livsync-core: State-synchronization engine between livsync-api and consumers (CLI).

pub mod command;
pub mod config;
pub mod convert;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{CoordinatorConfig, DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL};
pub use coordinator::{ConnectionState, Coordinator, PollReport};
pub use error::{CoreError, ErrorKind};
pub use store::{ChangeOrigin, DeviceStateStore, PatchOrigin};
pub use stream::{EntityStream, StateChange, Subscription};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    DeviceKey, DevicePatch, DeviceState, Field, Node, ObservedDevice, ParseRgbError, Rgb,
    SystemStatus, brightness_to_external, brightness_to_native,
};

// Transport settings callers need to build a `CoordinatorConfig`.
pub use livsync_api::{Credentials, RetryPolicy, TlsMode};
