//! Device state listing.

use serde::Serialize;
use tabled::Tabled;

use livsync_core::{Coordinator, DeviceState};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

/// A device state as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct DeviceView {
    pub node_id: String,
    pub device: String,
    pub led_power: bool,
    #[serde(flatten)]
    pub state: DeviceState,
}

impl DeviceView {
    pub fn new(node_id: &str, device: &str, state: DeviceState) -> Self {
        Self {
            node_id: node_id.to_owned(),
            device: device.to_owned(),
            led_power: state.led_power(),
            state,
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Power")]
    power: &'static str,
    #[tabled(rename = "LED")]
    led: &'static str,
    #[tabled(rename = "Brightness")]
    brightness: u8,
    #[tabled(rename = "Color")]
    color: String,
    #[tabled(rename = "Refill")]
    refill: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Runtime")]
    runtime: String,
}

fn row(view: &DeviceView, color: bool) -> DeviceRow {
    let s = &view.state;
    DeviceRow {
        node: view.node_id.clone(),
        device: view.device.clone(),
        power: output::on_off(s.power),
        led: output::on_off(view.led_power),
        brightness: s.brightness,
        color: s.color.to_string(),
        refill: format!("{:.0}%", s.refill_life),
        status: output::paint_status(s.system_status, color),
        runtime: output::format_runtime(s.runtime()),
    }
}

/// Detail view of one device, used after a mutation.
pub fn detail(view: &DeviceView, color: bool) -> String {
    format!(
        "{}/{}: {}",
        view.node_id,
        view.device,
        output::state_summary(&view.state, color)
    )
}

pub fn handle(
    coordinator: &Coordinator,
    args: &StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(node_id) = &args.node
        && coordinator.node(node_id).is_none()
    {
        return Err(CliError::NotFound {
            resource_type: "node".into(),
            identifier: node_id.clone(),
            list_command: "nodes".into(),
        });
    }

    let views: Vec<DeviceView> = coordinator
        .devices_snapshot()
        .into_iter()
        .filter(|(key, _)| args.node.as_ref().is_none_or(|n| *n == key.node_id))
        .map(|(key, state)| DeviceView::new(&key.node_id, &key.device, state))
        .collect();

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &views,
        |v| row(v, color),
        |v| format!("{}/{}", v.node_id, v.device),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
