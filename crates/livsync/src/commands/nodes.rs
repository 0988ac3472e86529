//! Node listing.

use std::sync::Arc;

use tabled::Tabled;

use livsync_core::{Coordinator, Node};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Online")]
    online: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
    #[tabled(rename = "Devices")]
    devices: String,
    #[tabled(rename = "Data")]
    freshness: String,
}

impl From<&Arc<Node>> for NodeRow {
    fn from(n: &Arc<Node>) -> Self {
        Self {
            id: n.node_id.clone(),
            name: n.display_name().to_owned(),
            model: n.display_model().to_owned(),
            online: if n.online { "yes".into() } else { "no".into() },
            firmware: n.firmware_version.clone().unwrap_or_else(|| "-".into()),
            devices: n.devices.join(", "),
            freshness: match (&n.last_error, n.stale) {
                (Some(err), true) => format!("stale: {err}"),
                (None, true) => "stale".into(),
                _ => "fresh".into(),
            },
        }
    }
}

pub fn handle(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let snap = coordinator.nodes_snapshot();
    let out = output::render_list(
        global.output,
        &snap,
        |n| NodeRow::from(n),
        |n| n.node_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
