use std::fmt;

/// Message kinds understood by the detection protocol.
///
/// The wire strings are fixed by the server and matched exactly; there is
/// no case folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Raw camera frame. Detection clients ignore these.
    Frame,
    /// Live detection event, pushed after subscription.
    Detection,
    /// Client request for the most recent stored detections.
    GetDetections,
    /// Client request to receive live events.
    SubscribeUpdates,
    /// Server acknowledgment. Carries the history list when answering
    /// [`MessageKind::GetDetections`].
    Ack,
    /// Server-side error report.
    Error,
    /// Liveness probe.
    Ping,
    /// Liveness probe answer.
    Pong,
}

impl MessageKind {
    /// Returns the exact wire string for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Frame => "FRAME",
            MessageKind::Detection => "DETECTION",
            MessageKind::GetDetections => "GET_DETECTIONS",
            MessageKind::SubscribeUpdates => "SUBSCRIBE_UPDATES",
            MessageKind::Ack => "ACK",
            MessageKind::Error => "ERROR",
            MessageKind::Ping => "PING",
            MessageKind::Pong => "PONG",
        }
    }

    /// Parses a wire string. Returns `None` for kinds this protocol
    /// version does not know; unknown kinds are dropped by receivers, not
    /// treated as errors.
    pub fn parse(kind: &str) -> Option<MessageKind> {
        match kind {
            "FRAME" => Some(MessageKind::Frame),
            "DETECTION" => Some(MessageKind::Detection),
            "GET_DETECTIONS" => Some(MessageKind::GetDetections),
            "SUBSCRIBE_UPDATES" => Some(MessageKind::SubscribeUpdates),
            "ACK" => Some(MessageKind::Ack),
            "ERROR" => Some(MessageKind::Error),
            "PING" => Some(MessageKind::Ping),
            "PONG" => Some(MessageKind::Pong),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
