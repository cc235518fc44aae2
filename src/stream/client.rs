//! Persistent stream connection and reconnect handling.
//!
//! [`StreamManager`] owns at most one websocket at a time through a
//! background worker task. Inbound frames are decoded as [`Envelope`]s and
//! re-emitted on the event bus; transport drops trigger automatic reconnects
//! after a fixed delay until [`StreamManager::disconnect`] is called.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::events::ClientEvent;
use crate::status::StatusHandle;
use crate::stream::proto::Envelope;

/// Reconnect delay used when a connection drops. Fixed (no growth, no
/// attempt cap): transient outages are expected and the dashboard keeps
/// trying until explicitly disconnected.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Lifecycle of the managed stream connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamState {
    /// No worker running; reached at construction and after `disconnect()`.
    Disconnected,
    /// Worker is dialing or waiting out the reconnect delay.
    Connecting,
    /// Socket is open and frames are being consumed.
    Open,
}

enum SessionOutcome {
    Shutdown,
    Reconnect,
}

struct Worker {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owner of the single persistent stream connection.
pub struct StreamManager {
    url: String,
    reconnect_delay: Duration,
    bus: Arc<EventBus<ClientEvent>>,
    status: StatusHandle,
    state: Arc<RwLock<StreamState>>,
    worker: Mutex<Option<Worker>>,
}

impl StreamManager {
    pub(crate) fn new(
        url: String,
        reconnect_delay: Duration,
        bus: Arc<EventBus<ClientEvent>>,
        status: StatusHandle,
    ) -> Self {
        Self {
            url,
            reconnect_delay,
            bus,
            status,
            state: Arc::new(RwLock::new(StreamState::Disconnected)),
            worker: Mutex::new(None),
        }
    }

    /// Starts the connection worker. No-op if one is already live, so two
    /// calls while connecting or open keep a single underlying socket.
    ///
    /// Must be called within a Tokio runtime.
    pub fn connect(&self) {
        let Ok(mut worker) = self.worker.lock() else {
            return;
        };

        if let Some(active) = worker.as_ref() {
            if !active.task.is_finished() {
                debug!("stream already connecting or open; connect ignored");
                return;
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        set_state(&self.state, StreamState::Connecting);

        let task = tokio::spawn(stream_worker(
            self.url.clone(),
            self.reconnect_delay,
            Arc::clone(&self.bus),
            self.status.clone(),
            Arc::clone(&self.state),
            shutdown_rx,
        ));

        *worker = Some(Worker {
            shutdown: shutdown_tx,
            task,
        });
    }

    /// Signals the worker to close the socket, cancel any pending reconnect,
    /// and exit. Idempotent; a later `connect()` starts a fresh worker.
    pub fn disconnect(&self) {
        let Ok(mut worker) = self.worker.lock() else {
            return;
        };
        if let Some(active) = worker.take() {
            let _ = active.shutdown.send(true);
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
            .read()
            .map(|state| *state)
            .unwrap_or(StreamState::Disconnected)
    }
}

fn set_state(state: &Arc<RwLock<StreamState>>, next: StreamState) {
    if let Ok(mut guard) = state.write() {
        *guard = next;
    }
}

async fn stream_worker(
    url: String,
    reconnect_delay: Duration,
    bus: Arc<EventBus<ClientEvent>>,
    status: StatusHandle,
    state: Arc<RwLock<StreamState>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        set_state(&state, StreamState::Connecting);

        let connected = tokio::select! {
            _ = shutdown_rx.changed() => break,
            result = connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((socket, _)) => {
                set_state(&state, StreamState::Open);
                status.record_stream_open();
                info!(url = %url, "stream connected");
                bus.emit(ClientEvent::StreamConnected);

                let outcome = drive_socket(socket, &bus, &mut shutdown_rx).await;

                status.record_stream_closed();
                bus.emit(ClientEvent::StreamDisconnected);

                if matches!(outcome, SessionOutcome::Shutdown) {
                    break;
                }
                info!(
                    delay_ms = reconnect_delay.as_millis() as u64,
                    "stream closed; reconnecting"
                );
            }
            Err(err) => {
                status.record_stream_closed();
                warn!(
                    error = %err,
                    delay_ms = reconnect_delay.as_millis() as u64,
                    "stream connect failed; retrying"
                );
            }
        }

        set_state(&state, StreamState::Connecting);
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    set_state(&state, StreamState::Disconnected);
}

async fn drive_socket(
    mut socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    bus: &Arc<EventBus<ClientEvent>>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionOutcome {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                let _ = socket.close(None).await;
                return SessionOutcome::Shutdown;
            }
            frame = socket.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        // Malformed frames are dropped without touching the
                        // connection; the next frame is consumed as usual.
                        match Envelope::from_text(&text) {
                            Ok(envelope) => bus.emit(envelope.payload.into()),
                            Err(err) => {
                                warn!(error = %err, "dropping malformed stream frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            return SessionOutcome::Reconnect;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        return SessionOutcome::Reconnect;
                    }
                    Some(Ok(other)) => {
                        debug!(frame = ?other, "dropping non-text stream frame");
                    }
                }
            }
        }
    }
}
