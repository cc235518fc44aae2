//! Wire messages carried over the persistent stream.
//!
//! Every frame is a JSON envelope `{"type": ..., "data": ..., "timestamp":
//! "<ISO-8601>"}`. The `type` tag selects the payload variant; frames whose
//! tag or payload shape does not match a known variant fail to parse and are
//! dropped at the stream boundary.

use serde::{Deserialize, Serialize};

use crate::status::ConnectionHealth;

/// Alert severity as carried on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeverityMsg {
    Info,
    Warning,
    Critical,
}

/// Fleet-wide health classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStateMsg {
    Nominal,
    Degraded,
    Offline,
}

/// Live production/consumption sample for one plant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryMsg {
    pub plant_id: String,
    pub generated_kw: f64,
    pub consumed_kw: f64,
    pub battery_soc_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_import_kw: Option<f64>,
    pub recorded_at: String,
}

/// Operational alert raised for a plant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertMsg {
    pub id: String,
    pub plant_id: String,
    pub severity: SeverityMsg,
    pub message: String,
    pub acknowledged: bool,
    pub raised_at: String,
}

/// Aggregated fleet status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemStatusMsg {
    pub overall: HealthStateMsg,
    pub plants_online: u32,
    pub plants_total: u32,
    pub total_generation_kw: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Tagged payload portion of an [`Envelope`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EnvelopePayload {
    Telemetry(TelemetryMsg),
    Alert(AlertMsg),
    SystemStatus(SystemStatusMsg),
    ConnectionStatus(ConnectionHealth),
}

/// One inbound stream frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(flatten)]
    pub payload: EnvelopePayload,
    pub timestamp: String,
}

impl Envelope {
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_telemetry() -> TelemetryMsg {
        TelemetryMsg {
            plant_id: "plant-7".to_string(),
            generated_kw: 118.4,
            consumed_kw: 92.1,
            battery_soc_pct: 76.0,
            grid_import_kw: None,
            recorded_at: "2026-08-27T10:15:00Z".to_string(),
        }
    }

    #[test]
    fn telemetry_envelope_parses_wire_shape() {
        let text = r#"{
            "type": "telemetry",
            "data": {
                "plant_id": "plant-7",
                "generated_kw": 118.4,
                "consumed_kw": 92.1,
                "battery_soc_pct": 76.0,
                "recorded_at": "2026-08-27T10:15:00Z"
            },
            "timestamp": "2026-08-27T10:15:01Z"
        }"#;

        let envelope = Envelope::from_text(text).expect("parse");
        assert_eq!(envelope.timestamp, "2026-08-27T10:15:01Z");
        assert_eq!(
            envelope.payload,
            EnvelopePayload::Telemetry(sample_telemetry())
        );
    }

    #[test]
    fn envelope_serializes_type_data_timestamp_keys() {
        let envelope = Envelope {
            payload: EnvelopePayload::SystemStatus(SystemStatusMsg {
                overall: HealthStateMsg::Degraded,
                plants_online: 11,
                plants_total: 12,
                total_generation_kw: 1480.5,
                note: None,
            }),
            timestamp: "2026-08-27T10:16:00Z".to_string(),
        };

        let value: serde_json::Value =
            serde_json::from_str(&envelope.to_text().expect("encode")).expect("reparse");
        assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("system_status"));
        assert!(value.get("data").is_some());
        assert_eq!(
            value.get("timestamp").and_then(|v| v.as_str()),
            Some("2026-08-27T10:16:00Z")
        );
    }

    #[test]
    fn alert_envelope_round_trips() {
        let envelope = Envelope {
            payload: EnvelopePayload::Alert(AlertMsg {
                id: "alert-3".to_string(),
                plant_id: "plant-7".to_string(),
                severity: SeverityMsg::Critical,
                message: "inverter offline".to_string(),
                acknowledged: false,
                raised_at: "2026-08-27T10:14:00Z".to_string(),
            }),
            timestamp: "2026-08-27T10:14:01Z".to_string(),
        };

        let text = envelope.to_text().expect("encode");
        let decoded = Envelope::from_text(&text).expect("decode");
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let text = r#"{"type":"billing","data":{},"timestamp":"2026-08-27T10:00:00Z"}"#;
        assert!(Envelope::from_text(text).is_err());
    }

    #[test]
    fn truncated_frame_is_rejected() {
        assert!(Envelope::from_text("{").is_err());
    }

    #[test]
    fn payload_shape_mismatch_is_rejected() {
        let text = r#"{"type":"telemetry","data":{"plant_id":42},"timestamp":"t"}"#;
        assert!(Envelope::from_text(text).is_err());
    }
}
