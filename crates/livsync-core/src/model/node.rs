// ── Node (physical hub) ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity and slow-changing facts about a hub, plus poll freshness.
///
/// Created on first discovery and never deleted during a run; a node that
/// disappears from the listing is only marked offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: String,
    pub name: Option<String>,
    pub online: bool,
    /// Raw model identifier as reported (e.g. `thermacell-hub`).
    pub model: Option<String>,
    pub serial: Option<String>,
    pub firmware_version: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    /// Device names seen in the last successful params fetch.
    pub devices: Vec<String>,
    /// Set when any fetch of the last poll cycle failed; cached values
    /// are then last-known-good.
    pub stale: bool,
    pub last_error: Option<String>,
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl Node {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            name: None,
            online: false,
            model: None,
            serial: None,
            firmware_version: None,
            last_seen: None,
            devices: Vec::new(),
            stale: false,
            last_error: None,
            last_polled_at: None,
        }
    }

    pub fn display_model(&self) -> &str {
        match self.model.as_deref() {
            Some("thermacell-hub") => "Thermacell LIV Hub",
            Some(other) => other,
            None => "Unknown",
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_model_names_the_hub() {
        let mut node = Node::new("n1");
        assert_eq!(node.display_model(), "Unknown");
        node.model = Some("thermacell-hub".into());
        assert_eq!(node.display_model(), "Thermacell LIV Hub");
        node.model = Some("other-hub".into());
        assert_eq!(node.display_model(), "other-hub");
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let mut node = Node::new("n1");
        assert_eq!(node.display_name(), "n1");
        node.name = Some("Patio".into());
        assert_eq!(node.display_name(), "Patio");
    }
}
