//! Client-side event vocabulary fanned out over the [`EventBus`].
//!
//! Data pushes decoded from the stream and status transitions produced by
//! the transports share one bus so watchers and UI collaborators subscribe
//! through a single registry.
//!
//! [`EventBus`]: crate::bus::EventBus

use crate::bus::Event;
use crate::status::ConnectionHealth;
use crate::stream::proto::{AlertMsg, EnvelopePayload, SystemStatusMsg, TelemetryMsg};

/// Topics listeners can register under.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Topic {
    Telemetry,
    Alert,
    SystemStatus,
    ConnectionStatus,
    StreamConnected,
    StreamDisconnected,
}

/// Events delivered through the client's bus.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// Telemetry sample pushed for one plant.
    Telemetry(TelemetryMsg),
    /// Alert raised or updated.
    Alert(AlertMsg),
    /// Fleet status update.
    SystemStatus(SystemStatusMsg),
    /// Outbound channel health, from the executor or a server push.
    ConnectionStatus(ConnectionHealth),
    /// The stream transitioned to open.
    StreamConnected,
    /// The stream closed or errored; a reconnect may follow.
    StreamDisconnected,
}

impl Event for ClientEvent {
    type Topic = Topic;

    fn topic(&self) -> Topic {
        match self {
            ClientEvent::Telemetry(_) => Topic::Telemetry,
            ClientEvent::Alert(_) => Topic::Alert,
            ClientEvent::SystemStatus(_) => Topic::SystemStatus,
            ClientEvent::ConnectionStatus(_) => Topic::ConnectionStatus,
            ClientEvent::StreamConnected => Topic::StreamConnected,
            ClientEvent::StreamDisconnected => Topic::StreamDisconnected,
        }
    }
}

impl From<EnvelopePayload> for ClientEvent {
    fn from(payload: EnvelopePayload) -> Self {
        match payload {
            EnvelopePayload::Telemetry(msg) => ClientEvent::Telemetry(msg),
            EnvelopePayload::Alert(msg) => ClientEvent::Alert(msg),
            EnvelopePayload::SystemStatus(msg) => ClientEvent::SystemStatus(msg),
            EnvelopePayload::ConnectionStatus(health) => ClientEvent::ConnectionStatus(health),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientEvent, Topic};
    use crate::bus::Event;
    use crate::status::ConnectionHealth;
    use crate::stream::proto::EnvelopePayload;

    #[test]
    fn envelope_payloads_map_to_matching_topics() {
        let event: ClientEvent =
            EnvelopePayload::ConnectionStatus(ConnectionHealth::default()).into();
        assert_eq!(event.topic(), Topic::ConnectionStatus);
    }
}
