use vigia_proto::DetectionRecord;

/// Receives session events from a [`DetectionClient`](crate::DetectionClient).
///
/// A handler is injected at construction and shared with the receiver
/// thread, so implementations must be `Send + Sync` and take `&self`.
/// Callbacks run inline on the receiver thread (the initial
/// `on_connection_state_changed(true)` runs on the connecting thread);
/// slow handlers stall frame consumption, so hand heavy work off.
pub trait EventHandler: Send + Sync {
    /// Connection established (`true`) or lost without a disconnect request
    /// (`false`). The `false` notification fires at most once per session
    /// and never for a requested `disconnect`.
    fn on_connection_state_changed(&self, connected: bool);

    /// One decoded detection record, live or out of a history list,
    /// delivered in exact wire order.
    fn on_event_received(&self, record: DetectionRecord);
}
