//! Aggregated liveness state of the client's outbound channels.

use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Point-in-time health of the REST and stream channels.
///
/// Also serves as the wire payload of `connection_status` pushes, so inbound
/// frames may omit the bookkeeping fields.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionHealth {
    pub connected: bool,
    #[serde(default)]
    pub last_updated_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub error_count: u32,
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self {
            connected: false,
            last_updated_ms: 0,
            latency_ms: None,
            error_count: 0,
        }
    }
}

/// Shared, cloneable handle over the client's [`ConnectionHealth`].
///
/// Mutated only by the request executor (per attempt resolution) and the
/// stream manager (on open/close). `error_count` resets to zero on the first
/// success after a failure streak.
#[derive(Clone, Debug, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<ConnectionHealth>>,
}

impl StatusHandle {
    /// Returns a copy of the current health.
    pub fn snapshot(&self) -> ConnectionHealth {
        self.inner
            .read()
            .map(|health| health.clone())
            .unwrap_or_default()
    }

    pub(crate) fn record_success(&self, latency: Duration) -> ConnectionHealth {
        self.update(|health| {
            health.connected = true;
            health.error_count = 0;
            health.latency_ms = Some(latency.as_millis() as u64);
        })
    }

    pub(crate) fn record_attempt_failure(&self) -> ConnectionHealth {
        self.update(|health| {
            health.error_count = health.error_count.saturating_add(1);
        })
    }

    pub(crate) fn mark_offline(&self) -> ConnectionHealth {
        self.update(|health| {
            health.connected = false;
        })
    }

    pub(crate) fn record_stream_open(&self) -> ConnectionHealth {
        self.update(|health| {
            health.connected = true;
            health.error_count = 0;
        })
    }

    pub(crate) fn record_stream_closed(&self) -> ConnectionHealth {
        self.update(|health| {
            health.connected = false;
            health.error_count = health.error_count.saturating_add(1);
        })
    }

    fn update(&self, apply: impl FnOnce(&mut ConnectionHealth)) -> ConnectionHealth {
        match self.inner.write() {
            Ok(mut health) => {
                apply(&mut health);
                health.last_updated_ms = now_ms();
                health.clone()
            }
            Err(_) => ConnectionHealth::default(),
        }
    }
}

/// Milliseconds since the unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
