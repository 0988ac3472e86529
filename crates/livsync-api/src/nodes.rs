// Node endpoints: discovery, params, status, config, and params writes.

use tracing::debug;

use crate::client::{ApiClient, decode};
use crate::error::Error;
use crate::models::{
    ConfigResponse, NodeConfig, NodeListResponse, NodeParams, NodeStatus, ParamsUpdate,
    SetParamsOutcome, StatusResponse,
};

const NODES_PATH: &str = "v1/user/nodes";
const PARAMS_PATH: &str = "v1/user/nodes/params";
const STATUS_PATH: &str = "v1/user/nodes/status";
const CONFIG_PATH: &str = "v1/user/nodes/config";

impl ApiClient {
    /// Identifiers of the nodes owned by the logged-in user.
    pub async fn list_nodes(&self) -> Result<Vec<String>, Error> {
        let value = self.get_json(self.url(NODES_PATH)?).await?;
        let resp: NodeListResponse = decode(value)?;
        debug!(count = resp.nodes.len(), "listed nodes");
        Ok(resp.nodes)
    }

    /// Control and telemetry parameters of every device on a node.
    pub async fn get_params(&self, node_id: &str) -> Result<NodeParams, Error> {
        let value = self.get_json(self.node_url(PARAMS_PATH, node_id)?).await?;
        NodeParams::from_value(&value)
    }

    /// Connectivity of a node.
    pub async fn get_status(&self, node_id: &str) -> Result<NodeStatus, Error> {
        let value = self.get_json(self.node_url(STATUS_PATH, node_id)?).await?;
        let resp: StatusResponse = decode(value)?;
        Ok(resp.into())
    }

    /// Static info of a node: model, firmware, declared devices.
    pub async fn get_config(&self, node_id: &str) -> Result<NodeConfig, Error> {
        let value = self.get_json(self.node_url(CONFIG_PATH, node_id)?).await?;
        let resp: ConfigResponse = decode(value)?;
        Ok(resp.into())
    }

    /// Push a partial params patch.
    ///
    /// If the service echoes device params back, they are returned as
    /// authoritative values for the caller to overlay.
    pub async fn set_params(
        &self,
        node_id: &str,
        update: &ParamsUpdate,
    ) -> Result<SetParamsOutcome, Error> {
        let value = self
            .put_json(self.node_url(PARAMS_PATH, node_id)?, update)
            .await?;

        let echoed = if value.is_object() {
            NodeParams::from_value(&value)
                .ok()
                .filter(|params| !params.devices.is_empty())
        } else {
            None
        };
        Ok(SetParamsOutcome { echoed })
    }
}
