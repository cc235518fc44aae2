//! Top-level client: one explicitly constructed instance owning the bus,
//! the REST executor, and the stream manager.
//!
//! Construct with [`GridClient::new`] (or [`GridClient::from_env`]), call
//! [`init`](GridClient::init) to open the stream when enabled, and
//! [`teardown`](GridClient::teardown) to close it. Tests build an isolated
//! instance per case; no process-global state is involved.

use std::sync::Arc;

use futures_util::FutureExt;
use thiserror::Error;

use crate::api::{ApiClient, ApiError, Plant};
use crate::bus::EventBus;
use crate::config::{Config, ConfigError};
use crate::events::{ClientEvent, Topic};
use crate::status::{ConnectionHealth, StatusHandle};
use crate::stream::client::StreamManager;
use crate::stream::proto::{AlertMsg, SystemStatusMsg, TelemetryMsg};
use crate::watch::{FetchFn, ResourceWatcher, WatchOptions};

/// Errors produced while constructing a client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Handle over the synchronization core.
pub struct GridClient {
    stream_enabled: bool,
    bus: Arc<EventBus<ClientEvent>>,
    status: StatusHandle,
    api: ApiClient,
    stream: StreamManager,
}

impl GridClient {
    /// Builds a client from an explicit configuration.
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let bus = Arc::new(EventBus::new());
        let status = StatusHandle::default();
        let api = ApiClient::new(&config, Arc::clone(&bus), status.clone())?;
        let stream = StreamManager::new(
            config.ws_url.clone(),
            config.reconnect_delay,
            Arc::clone(&bus),
            status.clone(),
        );

        Ok(Self {
            stream_enabled: config.stream_enabled,
            bus,
            status,
            api,
            stream,
        })
    }

    /// Builds a client from `GRIDLINK_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(Config::from_env()?)
    }

    /// Opens the stream connection when enabled by configuration.
    pub fn init(&self) {
        if self.stream_enabled {
            self.stream.connect();
        }
    }

    /// Closes the stream connection and cancels pending reconnects.
    pub fn teardown(&self) {
        self.stream.disconnect();
    }

    /// Shared event bus for push and status subscriptions.
    pub fn bus(&self) -> &Arc<EventBus<ClientEvent>> {
        &self.bus
    }

    /// REST executor for direct calls (acknowledge, settings, ...).
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Stream connection manager.
    pub fn stream(&self) -> &StreamManager {
        &self.stream
    }

    /// Current outbound-channel health.
    pub fn connection(&self) -> ConnectionHealth {
        self.status.snapshot()
    }

    /// Watches live telemetry for one plant.
    pub fn watch_telemetry(
        &self,
        plant_id: impl Into<String>,
        options: WatchOptions,
    ) -> ResourceWatcher<TelemetryMsg> {
        let plant_id: String = plant_id.into();

        let fetch: FetchFn<TelemetryMsg> = Arc::new({
            let api = self.api.clone();
            let plant_id = plant_id.clone();
            move || {
                let api = api.clone();
                let plant_id = plant_id.clone();
                async move { api.plant_telemetry(&plant_id).await }.boxed()
            }
        });

        let apply = move |event: &ClientEvent, _prev: Option<&TelemetryMsg>| match event {
            ClientEvent::Telemetry(msg) if msg.plant_id == plant_id => Some(msg.clone()),
            _ => None,
        };

        ResourceWatcher::new(&self.bus, Some(Topic::Telemetry), apply, fetch, options)
    }

    /// Watches aggregated fleet health.
    pub fn watch_system_health(&self, options: WatchOptions) -> ResourceWatcher<SystemStatusMsg> {
        let fetch: FetchFn<SystemStatusMsg> = Arc::new({
            let api = self.api.clone();
            move || {
                let api = api.clone();
                async move { api.system_health().await }.boxed()
            }
        });

        let apply = |event: &ClientEvent, _prev: Option<&SystemStatusMsg>| match event {
            ClientEvent::SystemStatus(msg) => Some(msg.clone()),
            _ => None,
        };

        ResourceWatcher::new(&self.bus, Some(Topic::SystemStatus), apply, fetch, options)
    }

    /// Watches the alert list, optionally filtered by acknowledgement state.
    ///
    /// An alert push yields a full replacement list: any entry with the same
    /// id is dropped, and the pushed alert is prepended when it matches the
    /// filter.
    pub fn watch_alerts(
        &self,
        acknowledged: Option<bool>,
        options: WatchOptions,
    ) -> ResourceWatcher<Vec<AlertMsg>> {
        let fetch: FetchFn<Vec<AlertMsg>> = Arc::new({
            let api = self.api.clone();
            move || {
                let api = api.clone();
                async move { api.alerts(acknowledged).await }.boxed()
            }
        });

        let apply = move |event: &ClientEvent, prev: Option<&Vec<AlertMsg>>| match event {
            ClientEvent::Alert(alert) => {
                let mut next: Vec<AlertMsg> = prev
                    .map(|list| {
                        list.iter()
                            .filter(|known| known.id != alert.id)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                if acknowledged.map_or(true, |want| alert.acknowledged == want) {
                    next.insert(0, alert.clone());
                }
                Some(next)
            }
            _ => None,
        };

        ResourceWatcher::new(&self.bus, Some(Topic::Alert), apply, fetch, options)
    }

    /// Watches the plant list. There is no push topic for the fleet roster,
    /// so this watcher refreshes through polling and `refetch()` only.
    pub fn watch_plants(&self, options: WatchOptions) -> ResourceWatcher<Vec<Plant>> {
        let fetch: FetchFn<Vec<Plant>> = Arc::new({
            let api = self.api.clone();
            move || {
                let api = api.clone();
                async move { api.plants().await }.boxed()
            }
        });

        ResourceWatcher::new(
            &self.bus,
            None,
            |_: &ClientEvent, _: Option<&Vec<Plant>>| None,
            fetch,
            options,
        )
    }
}
