//! `watch`: keep a coordinator connected and print every state change
//! and node connectivity flip.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures_util::StreamExt;
use tracing::{debug, info};

use livsync_core::{Coordinator, DEFAULT_POLL_INTERVAL, Node, StateChange};

use crate::cli::{GlobalOpts, OutputFormat, StatusArgs, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::status::{self, DeviceView};

pub async fn handle(args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::build_coordinator_config(global)?;
    if let Some(secs) = args.interval {
        cfg.poll_interval = Duration::from_secs(secs);
    }
    if cfg.poll_interval.is_zero() {
        cfg.poll_interval = DEFAULT_POLL_INTERVAL;
    }
    info!(interval = ?cfg.poll_interval, "starting watch");

    let coordinator = Coordinator::new(cfg)?;
    let mut sub = coordinator.subscribe();
    coordinator.connect().await?;

    // The first poll already published every device; print the snapshot
    // once instead of replaying it.
    while sub.try_recv().is_some() {}
    status::handle(&coordinator, &StatusArgs { node: None }, global)?;

    let nodes = coordinator.nodes();
    let mut online: HashMap<String, bool> = nodes
        .current()
        .iter()
        .map(|n| (n.node_id.clone(), n.online))
        .collect();
    let mut node_snapshots = nodes.into_stream();
    let mut changes = sub.into_stream();

    let color = output::should_color(global.color);
    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break Ok(());
            }
            change = changes.next() => {
                let Some(change) = change else { break Ok(()) };
                match render_change(&change, global.output, color) {
                    Ok(line) => output::print_output(&line, global.quiet),
                    Err(e) => break Err(e),
                }
            }
            snapshot = node_snapshots.next() => {
                let Some(snapshot) = snapshot else { break Ok(()) };
                if let Err(e) = print_connectivity(&snapshot, &mut online, global) {
                    break Err(e);
                }
            }
        }
    };

    coordinator.disconnect().await;
    result
}

/// Print one line per node whose `online` flag changed since the last
/// snapshot.
fn print_connectivity(
    snapshot: &[Arc<Node>],
    online: &mut HashMap<String, bool>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    for node in snapshot {
        let previous = online.insert(node.node_id.clone(), node.online);
        if previous != Some(node.online) {
            let line = render_connectivity(node, global.output)?;
            output::print_output(&line, global.quiet);
        }
    }
    Ok(())
}

fn render_connectivity(node: &Node, format: OutputFormat) -> Result<String, CliError> {
    let label = if node.online { "online" } else { "offline" };
    match format {
        OutputFormat::Table => Ok(format!(
            "{} {} ({}) is {label}",
            Local::now().format("%H:%M:%S"),
            node.display_name(),
            node.node_id,
        )),
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let line = serde_json::json!({
                "node_id": node.node_id,
                "online": node.online,
                "stale": node.stale,
            });
            output::render_json(&line, true)
        }
        OutputFormat::Plain => Ok(format!("{} {label}", node.node_id)),
    }
}

fn render_change(change: &StateChange, format: OutputFormat, color: bool) -> Result<String, CliError> {
    let view = DeviceView::new(&change.node_id, &change.device_name, change.state.clone());
    match format {
        OutputFormat::Table => Ok(format!(
            "{} {} ({})",
            Local::now().format("%H:%M:%S"),
            status::detail(&view, color),
            change.origin,
        )),
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let line = serde_json::json!({
                "origin": change.origin.to_string(),
                "device": view,
            });
            output::render_json(&line, true)
        }
        OutputFormat::Plain => Ok(format!(
            "{}/{} {}",
            change.node_id, change.device_name, change.origin
        )),
    }
}
