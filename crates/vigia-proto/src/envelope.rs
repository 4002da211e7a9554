use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kind::MessageKind;

/// Outer envelope for every message on a detection connection.
///
/// The wire field names (`tipo`, `timestamp`, `datos`) are fixed by the
/// server:
///
/// ```json
/// {"tipo": "DETECTION", "timestamp": "2025-06-14T09:21:33+00:00", "datos": {"id": 7}}
/// ```
///
/// The timestamp is stamped by whoever builds the envelope and is opaque to
/// the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Kind discriminator. Kept as the raw wire string so envelopes with
    /// kinds from a newer protocol revision still decode; receivers drop
    /// them instead of failing the connection.
    #[serde(rename = "tipo")]
    pub kind: String,
    /// Producer-side ISO-8601 stamp.
    pub timestamp: String,
    /// Message payload. Always present, empty object when unused.
    #[serde(rename = "datos", default)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Builds an envelope of `kind` stamped with the current time.
    pub fn new(kind: MessageKind, payload: Map<String, Value>) -> Self {
        Envelope {
            kind: kind.as_str().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            payload,
        }
    }

    /// History request: asks the server for its newest `limit` records.
    pub fn get_detections(limit: usize) -> Self {
        let mut payload = Map::new();
        payload.insert("limite".to_string(), Value::from(limit as u64));
        Envelope::new(MessageKind::GetDetections, payload)
    }

    /// Live-event subscription request. Empty payload.
    pub fn subscribe_updates() -> Self {
        Envelope::new(MessageKind::SubscribeUpdates, Map::new())
    }

    /// Classifies the wire kind. `None` when the kind string is not part
    /// of this protocol version.
    pub fn message_kind(&self) -> Option<MessageKind> {
        MessageKind::parse(&self.kind)
    }
}
