// livsync-api: Async Rust client for the LIV hub cloud API

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod nodes;
pub mod retry;
pub mod token;
pub mod transport;

pub use auth::{AuthManager, AuthState, Credentials, Session};
pub use client::ApiClient;
pub use error::{AuthError, Error, ErrorClass, ErrorKind};
pub use models::{
    ConfigDevice, DeviceParams, DeviceParamsUpdate, NodeConfig, NodeParams, NodeStatus,
    ParamsUpdate, SetParamsOutcome,
};
pub use retry::{Backoff, RetryPolicy};
pub use transport::{TlsMode, TransportConfig};
