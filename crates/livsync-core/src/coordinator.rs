// ── Coordinator ──
//
// Full lifecycle management for one cloud account: login, the periodic
// poll loop, optimistic mutations and change fan-out through the
// DeviceStateStore.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use livsync_api::{ApiClient, ParamsUpdate, TransportConfig};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandResult, Mutation};
use crate::config::CoordinatorConfig;
use crate::convert;
use crate::error::{CoreError, ErrorKind};
use crate::model::{DeviceKey, DeviceState, Node, Rgb};
use crate::store::{DeviceStateStore, EntityCollection, PatchOrigin};
use crate::stream::{EntityStream, Subscription};

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Outcome of one poll cycle.
#[derive(Debug, Default)]
pub struct PollReport {
    /// Nodes whose status, params and config were all fetched.
    pub polled: Vec<String>,
    /// Nodes left stale, with the reason.
    pub failed: Vec<(String, CoreError)>,
}

impl PollReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ── Coordinator ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. A disconnected
/// coordinator stays disconnected; build a new one to reconnect.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    client: Arc<ApiClient>,
    store: Arc<DeviceStateStore>,
    nodes: EntityCollection<Node>,
    connection_state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    device_locks: DashMap<DeviceKey, Arc<Mutex<()>>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create a coordinator from configuration. Does NOT connect; call
    /// [`connect()`](Self::connect) to log in and start polling.
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: config.tls.clone(),
            timeout: config.timeout,
        };
        let client = ApiClient::new(config.base_url.clone(), &transport, config.retry)?;
        Ok(Self::with_client(config, client))
    }

    /// Create a coordinator around an existing API client.
    pub fn with_client(config: CoordinatorConfig, client: ApiClient) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                client: Arc::new(client),
                store: Arc::new(DeviceStateStore::new()),
                nodes: EntityCollection::new(),
                connection_state,
                cancel: CancellationToken::new(),
                device_locks: DashMap::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DeviceStateStore> {
        &self.inner.store
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.inner.client
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Log in, run the first authoritative poll, and spawn the poll task.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.set_state(ConnectionState::Connecting);

        let credentials = &self.inner.config.credentials;
        let session = match self
            .inner
            .client
            .login(&credentials.username, &credentials.password)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                self.set_state(ConnectionState::Failed);
                return Err(e.into());
            }
        };
        debug!(user_id = %session.user_id, "logged in");

        let report = match self.poll_once().await {
            Ok(report) => report,
            Err(e) => {
                self.set_state(ConnectionState::Failed);
                return Err(e);
            }
        };
        debug!(
            polled = report.polled.len(),
            failed = report.failed.len(),
            "initial poll complete"
        );

        let interval = self.inner.config.poll_interval;
        if !interval.is_zero() {
            let coordinator = self.clone();
            let cancel = self.inner.cancel.clone();
            self.inner
                .task_handles
                .lock()
                .await
                .push(tokio::spawn(poll_task(coordinator, interval, cancel)));
        }

        self.set_state(ConnectionState::Connected);
        info!(nodes = self.inner.nodes.len(), "connected");
        Ok(())
    }

    /// Cancel background tasks, wait for them, and drop the session.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.client.auth().logout();
        self.set_state(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// One-shot: connect without background polling, run `f`, disconnect.
    pub async fn oneshot<F, Fut, T>(config: CoordinatorConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Coordinator) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.poll_interval = Duration::ZERO;

        let coordinator = Coordinator::new(cfg)?;
        coordinator.connect().await?;
        let result = f(coordinator.clone()).await;
        coordinator.disconnect().await;
        result
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.inner.connection_state.send(state);
    }

    fn ensure_connected(&self) -> Result<(), CoreError> {
        if *self.inner.connection_state.borrow() == ConnectionState::Connected {
            Ok(())
        } else {
            Err(CoreError::Disconnected)
        }
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Run one poll cycle over every listed node.
    ///
    /// Nodes are polled concurrently and a failing node never blocks the
    /// others. Fails only when the listing fails and no node is known yet.
    pub async fn poll_once(&self) -> Result<PollReport, CoreError> {
        let node_ids = match self.inner.client.list_nodes().await {
            Ok(listed) => {
                self.sync_node_list(&listed);
                listed
            }
            Err(e) => {
                let known = self.inner.nodes.keys();
                if known.is_empty() {
                    return Err(e.into());
                }
                warn!(error = %e, known = known.len(), "node listing failed, polling known nodes");
                known
            }
        };

        let results = join_all(node_ids.iter().map(|id| self.poll_node(id))).await;

        let mut report = PollReport::default();
        for (node_id, result) in node_ids.into_iter().zip(results) {
            match result {
                Ok(()) => report.polled.push(node_id),
                Err(e) => {
                    warn!(node_id = %node_id, error = %e, "node poll degraded");
                    report.failed.push((node_id, e));
                }
            }
        }

        debug!(
            polled = report.polled.len(),
            failed = report.failed.len(),
            devices = self.inner.store.len(),
            "poll cycle complete"
        );
        Ok(report)
    }

    /// Create newly listed nodes and mark unlisted ones offline.
    fn sync_node_list(&self, listed: &[String]) {
        for node_id in listed {
            if self.inner.nodes.get(node_id).is_none() {
                info!(node_id = %node_id, "discovered node");
                self.inner.nodes.upsert(node_id.clone(), Node::new(node_id.clone()));
            }
        }
        for node_id in self.inner.nodes.keys() {
            if !listed.contains(&node_id) {
                self.inner.nodes.update(&node_id, |node| {
                    if node.online {
                        info!(node_id = %node.node_id, "node no longer listed, marking offline");
                    }
                    node.online = false;
                });
            }
        }
    }

    /// Fetch status, params and config of one node and merge the results.
    ///
    /// Whatever was fetched is merged even when another fetch failed; the
    /// node is then marked stale and the first failure is returned.
    async fn poll_node(&self, node_id: &str) -> Result<(), CoreError> {
        let client = &self.inner.client;
        let (status, params, config) = tokio::join!(
            client.get_status(node_id),
            client.get_params(node_id),
            client.get_config(node_id),
        );
        let now = Utc::now();

        let mut failures = Vec::new();
        let status = keep_ok(status, &mut failures);
        let params = keep_ok(params, &mut failures);
        let config = keep_ok(config, &mut failures);

        if let Some(params) = &params {
            for (device, device_params) in &params.devices {
                let observed = convert::observe(device_params, now);
                self.inner.store.merge_poll_result(node_id, device, &observed);
            }
        }

        let first_failure = failures.into_iter().next();
        self.inner.nodes.update(node_id, |node| {
            if let Some(status) = &status {
                node.online = status.connected;
                if status.last_seen.is_some() {
                    node.last_seen = status.last_seen;
                }
            }
            if let Some(params) = &params {
                node.devices = params.devices.keys().cloned().collect();
                let info = params.devices.values();
                if let Some(name) = info.clone().find_map(|d| d.name.clone()) {
                    node.name = Some(name);
                }
                if let Some(serial) = info.clone().find_map(|d| d.hub_id.clone()) {
                    node.serial = Some(serial);
                }
            }
            if let Some(config) = &config {
                if node.name.is_none() {
                    node.name.clone_from(&config.name);
                }
                if config.model.is_some() {
                    node.model.clone_from(&config.model);
                }
                if config.firmware_version.is_some() {
                    node.firmware_version.clone_from(&config.firmware_version);
                }
            }
            node.stale = first_failure.is_some();
            node.last_error = first_failure.as_ref().map(ToString::to_string);
            node.last_polled_at = Some(now);
        });

        match first_failure {
            None => Ok(()),
            Some(e) => Err(CoreError::PollFailed {
                node_id: node_id.to_owned(),
                message: e.to_string(),
                kind: ErrorKind::from(e.kind()),
            }),
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Switch the repellers on or off.
    pub async fn set_power(&self, node_id: &str, device: &str, on: bool) -> Result<DeviceState, CoreError> {
        self.mutate(node_id, device, Mutation::Power(on)).await
    }

    /// Set the LED brightness on the native 0-100 scale.
    pub async fn set_brightness(
        &self,
        node_id: &str,
        device: &str,
        brightness: u8,
    ) -> Result<DeviceState, CoreError> {
        if brightness > 100 {
            return Err(CoreError::ValidationFailed {
                message: format!("brightness {brightness} is outside 0-100"),
            });
        }
        self.mutate(node_id, device, Mutation::Brightness(brightness)).await
    }

    /// Set the LED color as a hue plus brightness; saturation is dropped.
    pub async fn set_color(&self, node_id: &str, device: &str, color: Rgb) -> Result<DeviceState, CoreError> {
        self.mutate(node_id, device, Mutation::Color(color)).await
    }

    /// Switch the LED on or off through its brightness.
    pub async fn set_led(&self, node_id: &str, device: &str, on: bool) -> Result<DeviceState, CoreError> {
        self.mutate(node_id, device, Mutation::Led(on)).await
    }

    /// Reset the refill counter after a cartridge change.
    pub async fn reset_refill(&self, node_id: &str, device: &str) -> Result<DeviceState, CoreError> {
        self.mutate(node_id, device, Mutation::ResetRefill).await
    }

    /// Poll one node now, outside the regular interval.
    pub async fn request_refresh(&self, node_id: &str) -> Result<(), CoreError> {
        self.ensure_connected()?;
        if self.inner.nodes.get(node_id).is_none() {
            return Err(CoreError::NodeNotFound {
                node_id: node_id.to_owned(),
            });
        }
        self.poll_node(node_id).await
    }

    /// Dispatch a [`Command`] to its entry point.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let state = match cmd {
            Command::SetPower { node_id, device, on } => self.set_power(&node_id, &device, on).await?,
            Command::SetBrightness {
                node_id,
                device,
                brightness,
            } => self.set_brightness(&node_id, &device, brightness).await?,
            Command::SetColor { node_id, device, color } => {
                self.set_color(&node_id, &device, color).await?
            }
            Command::SetLed { node_id, device, on } => self.set_led(&node_id, &device, on).await?,
            Command::ResetRefill { node_id, device } => self.reset_refill(&node_id, &device).await?,
            Command::Refresh { node_id } => {
                self.request_refresh(&node_id).await?;
                return Ok(CommandResult::Refreshed);
            }
        };
        Ok(CommandResult::State(state))
    }

    /// Optimistic-update protocol for one device.
    ///
    /// The device lock is held across the network call so writes to one
    /// device are totally ordered; other devices proceed in parallel.
    async fn mutate(&self, node_id: &str, device: &str, mutation: Mutation) -> Result<DeviceState, CoreError> {
        self.ensure_connected()?;

        let store = &self.inner.store;
        let not_found = || CoreError::DeviceNotFound {
            node_id: node_id.to_owned(),
            device: device.to_owned(),
        };
        // Locks are only created for devices the store knows.
        if store.snapshot(node_id, device).is_none() {
            return Err(not_found());
        }

        let lock = self.device_lock(node_id, device);
        let _guard = lock.lock().await;

        let snapshot = store.snapshot(node_id, device).ok_or_else(not_found)?;
        let patch = mutation.compute_patch(&snapshot);
        store
            .apply_patch(node_id, device, &patch, PatchOrigin::Optimistic)
            .ok_or_else(not_found)?;

        let update = ParamsUpdate::for_device(device, mutation.wire_update(&patch));
        debug!(node_id, device, op = mutation.name(), "persisting mutation");

        match self.inner.client.set_params(node_id, &update).await {
            Ok(outcome) => {
                let mut state = store.commit(node_id, device).ok_or_else(not_found)?;
                if let Some(echo) = outcome.echoed.as_ref().and_then(|p| p.device(device))
                    && let Some(overlaid) = store.apply_patch(
                        node_id,
                        device,
                        &convert::echo_patch(echo),
                        PatchOrigin::Authoritative,
                    )
                {
                    state = overlaid;
                }
                debug!(node_id, device, op = mutation.name(), "mutation committed");
                Ok(state)
            }
            Err(e) => {
                warn!(
                    node_id,
                    device,
                    op = mutation.name(),
                    error = %e,
                    "mutation failed, rolling back"
                );
                store.rollback(node_id, device, snapshot);
                Err(e.into())
            }
        }
    }

    fn device_lock(&self, node_id: &str, device: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            &self
                .inner
                .device_locks
                .entry(DeviceKey::new(node_id, device))
                .or_default(),
        )
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Subscribe to every device state change.
    pub fn subscribe(&self) -> Subscription {
        self.inner.store.subscribe()
    }

    /// Subscribe to node snapshots.
    pub fn nodes(&self) -> EntityStream<Node> {
        EntityStream::new(self.inner.nodes.subscribe())
    }

    pub fn nodes_snapshot(&self) -> Arc<Vec<Arc<Node>>> {
        self.inner.nodes.snapshot()
    }

    pub fn node(&self, node_id: &str) -> Option<Arc<Node>> {
        self.inner.nodes.get(node_id)
    }

    pub fn device_state(&self, node_id: &str, device: &str) -> Option<DeviceState> {
        self.inner.store.snapshot(node_id, device)
    }

    /// All devices, sorted by node then name.
    pub fn devices_snapshot(&self) -> Vec<(DeviceKey, DeviceState)> {
        self.inner.store.devices()
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Periodically poll every node.
async fn poll_task(coordinator: Coordinator, interval: Duration, cancel: CancellationToken) {
    let coordinator = &coordinator;
    run_every(interval, &cancel, move || async move {
        if let Err(e) = coordinator.poll_once().await {
            warn!(error = %e, "periodic poll failed");
        }
    })
    .await;
}

/// Run `cycle` once per `interval` until cancelled. A cycle that overruns
/// the interval causes the missed ticks to be skipped, so cycles never run
/// back to back.
async fn run_every<F, Fut>(interval: Duration, cancel: &CancellationToken, mut cycle: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => cycle().await,
        }
    }
}

fn keep_ok<T>(result: Result<T, livsync_api::Error>, failures: &mut Vec<livsync_api::Error>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            failures.push(e);
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;

    use livsync_api::RetryPolicy;
    use secrecy::SecretString;
    use tokio::time::Instant;
    use url::Url;

    use super::*;

    fn offline_coordinator() -> Coordinator {
        let base_url = Url::parse("http://127.0.0.1:9/").unwrap();
        let config = CoordinatorConfig::new(base_url.clone(), "me@example.com", SecretString::from("pw"));
        let client = ApiClient::with_client(
            reqwest::Client::new(),
            base_url,
            RetryPolicy::default(),
            Duration::from_secs(1),
        );
        Coordinator::with_client(config, client)
    }

    #[tokio::test]
    async fn unknown_device_creates_no_lock() {
        let coordinator = offline_coordinator();
        coordinator.set_state(ConnectionState::Connected);

        for i in 0..3 {
            let err = coordinator
                .set_power("node-x", &format!("ghost-{i}"), true)
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::DeviceNotFound { .. }));
        }

        assert!(coordinator.inner.device_locks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_cycles_skip_missed_ticks() {
        let interval = Duration::from_millis(100);
        let cycle_time = Duration::from_millis(250);
        let cancel = CancellationToken::new();
        let starts = RefCell::new(Vec::new());
        let ends = RefCell::new(Vec::new());
        let t0 = Instant::now();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(900)).await;
            canceller.cancel();
        });

        let (starts_ref, ends_ref) = (&starts, &ends);
        run_every(interval, &cancel, move || async move {
            starts_ref.borrow_mut().push(Instant::now() - t0);
            tokio::time::sleep(cycle_time).await;
            ends_ref.borrow_mut().push(Instant::now() - t0);
        })
        .await;

        let ms = |v: &RefCell<Vec<Duration>>| -> Vec<u128> {
            v.borrow().iter().map(Duration::as_millis).collect()
        };
        // Ticks at 200, 300, 500, 600 and 800 fall inside a cycle and are dropped.
        assert_eq!(ms(&starts), vec![100, 400, 700]);
        assert_eq!(ms(&ends), vec![350, 650, 950]);
    }
}
