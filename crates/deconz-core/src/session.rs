// ── Gateway session ──
//
// The single owner of everything a running bridge needs: configuration
// snapshots, the device registry, the stream connection task and the poll
// task. Cheaply cloneable; background tasks hold a clone.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::config::{GatewayConfig, SessionOptions};
use crate::connection::{self, ConnectionState, RepairOutcome, TaskHandle};
use crate::dispatch::{self, Dispatch};
use crate::error::CoreError;
use crate::poll::{self, SyncReport};
use crate::registry::DeviceRegistry;
use crate::settings::SettingsStore;

#[derive(Clone)]
pub struct GatewaySession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: ArcSwap<GatewayConfig>,
    options: ArcSwap<SessionOptions>,
    registry: Arc<DeviceRegistry>,
    settings: Arc<dyn SettingsStore>,
    state: watch::Sender<ConnectionState>,
    last_message: ArcSwapOption<DateTime<Utc>>,
    connection: Mutex<Option<TaskHandle>>,
    poller: Mutex<Option<TaskHandle>>,
}

impl GatewaySession {
    /// Create a session. Nothing connects until [`start`](Self::start) or
    /// [`connect`](Self::connect).
    pub fn new(
        config: GatewayConfig,
        options: SessionOptions,
        registry: Arc<DeviceRegistry>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(SessionInner {
                config: ArcSwap::from_pointee(config),
                options: ArcSwap::from_pointee(options),
                registry,
                settings,
                state,
                last_message: ArcSwapOption::empty(),
                connection: Mutex::new(None),
                poller: Mutex::new(None),
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn config(&self) -> Arc<GatewayConfig> {
        self.inner.config.load_full()
    }

    pub fn options(&self) -> Arc<SessionOptions> {
        self.inner.options.load_full()
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// When the last stream message arrived, if any.
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.inner.last_message.load_full().map(|t| *t)
    }

    pub(crate) fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.inner.settings
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.inner.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "connection state");
        }
    }

    pub(crate) fn swap_config(&self, config: Arc<GatewayConfig>) {
        self.inner.config.store(config);
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Initial sync, then the stream connection and the poller.
    ///
    /// An incomplete configuration is reported and nothing is started.
    pub async fn start(&self) -> Result<SyncReport, CoreError> {
        let config = self.config();
        if !config.is_complete() {
            warn!("gateway settings incomplete, fill all the fields");
            return Err(CoreError::IncompleteConfig {
                missing: config.missing_fields(),
            });
        }

        let report = self.full_sync().await;
        self.connect().await;
        self.restart_poller().await;
        Ok(report)
    }

    /// (Re)open the stream connection, tearing down the previous one first.
    pub async fn connect(&self) {
        let mut slot = self.inner.connection.lock().await;
        if let Some(previous) = slot.take() {
            previous.stop().await;
        }

        if !self.config().is_complete() {
            warn!("gateway settings incomplete, fill all the fields");
            self.set_state(ConnectionState::Disconnected);
            return;
        }

        let session = self.clone();
        *slot = Some(TaskHandle::spawn(move |cancel| {
            connection::run(session, cancel)
        }));
    }

    /// Stop the connection and the poller.
    pub async fn shutdown(&self) {
        if let Some(poller) = self.inner.poller.lock().await.take() {
            poller.stop().await;
        }
        if let Some(conn) = self.inner.connection.lock().await.take() {
            conn.stop().await;
        }
        self.set_state(ConnectionState::Disconnected);
        info!("session stopped");
    }

    async fn restart_poller(&self) {
        let mut slot = self.inner.poller.lock().await;
        if let Some(previous) = slot.take() {
            previous.stop().await;
        }

        let Some(period) = self.options().poll_interval() else {
            info!("reconciliation polling disabled");
            return;
        };

        let session = self.clone();
        *slot = Some(TaskHandle::spawn(move |cancel| {
            poll::poll_task(session, period, cancel)
        }));
    }

    // ── Operations ───────────────────────────────────────────────

    /// Process a JSON text exactly as if the gateway had pushed it.
    pub fn handle_message(&self, text: &str) -> Dispatch {
        self.inner.last_message.store(Some(Arc::new(Utc::now())));
        dispatch::dispatch(&self.inner.registry, text)
    }

    /// One reconciliation pass over lights, sensors and groups.
    pub async fn full_sync(&self) -> SyncReport {
        poll::sync_once(self).await
    }

    /// Re-discover the gateway; on a new address, reconnect to it.
    pub async fn repair(&self) -> Result<RepairOutcome, CoreError> {
        let outcome = connection::repair_host(self).await?;
        if matches!(outcome, RepairOutcome::HostChanged { .. }) {
            self.connect().await;
        }
        Ok(outcome)
    }

    /// Replace the gateway config; reconnect if it points somewhere else.
    pub async fn update_config(&self, config: GatewayConfig) {
        let previous = self.inner.config.swap(Arc::new(config));
        if !previous.same_endpoint(&self.config()) {
            info!("gateway settings changed, reconnecting");
            self.connect().await;
        }
    }

    /// Replace the session options, restarting whatever they affect.
    pub async fn update_options(&self, options: SessionOptions) {
        let previous = self.inner.options.swap(Arc::new(options));
        let current = self.options();

        if previous.poll_interval_minutes != current.poll_interval_minutes {
            info!(minutes = current.poll_interval_minutes, "poll interval changed");
            self.restart_poller().await;
        }
        if previous.affects_connection(&current) {
            info!("connection options changed, reconnecting");
            self.connect().await;
        }
    }
}
