//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod nodes;
pub mod status;
pub mod watch;

use livsync_core::Coordinator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a connection-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    coordinator: &Coordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Nodes => nodes::handle(coordinator, global),
        Command::Status(args) => status::handle(coordinator, &args, global),
        Command::Power(args) => control::power(coordinator, args, global).await,
        Command::Brightness(args) => control::brightness(coordinator, args, global).await,
        Command::Color(args) => control::color(coordinator, args, global).await,
        Command::Led(args) => control::led(coordinator, args, global).await,
        Command::ResetRefill(args) => control::reset_refill(coordinator, args, global).await,
        Command::Refresh(args) => control::refresh(coordinator, args, global).await,
        // Handled before a one-shot connection is made.
        Command::Watch(_) | Command::Config(_) | Command::Completions(_) => {
            Err(CliError::Validation {
                field: "command".into(),
                reason: "not a one-shot command".into(),
            })
        }
    }
}
