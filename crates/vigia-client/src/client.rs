use std::io::ErrorKind;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, info, trace, warn};
use vigia_frame::{FrameError, FrameReader, FrameWriter};
use vigia_proto::{DetectionRecord, Envelope, MessageKind};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::handler::EventHandler;

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// TCP client for a detection server.
///
/// `connect` opens the socket, performs the subscription handshake, and
/// spawns the receiver thread; from then on the client is read-only on the
/// wire. The server going away ends the session (no automatic reconnect),
/// after which `connect` may be called again on the same value.
pub struct DetectionClient {
    config: ClientConfig,
    handler: Arc<dyn EventHandler>,
    shared: Arc<Shared>,
    stream: Option<TcpStream>,
    receiver: Option<JoinHandle<()>>,
}

struct Shared {
    /// Cleared by `disconnect`. The receive loop checks it each lap and
    /// uses it on exit to tell a requested shutdown from a lost server.
    running: AtomicBool,
    connected: AtomicBool,
}

impl DetectionClient {
    /// Create a client. The handler is shared with the receiver thread for
    /// the lifetime of the client.
    pub fn new(config: ClientConfig, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            config,
            handler,
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                connected: AtomicBool::new(false),
            }),
            stream: None,
            receiver: None,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// True while a session is established.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Connect, handshake, and start the receiver thread.
    ///
    /// Handshake frames go out synchronously on the calling thread, so a
    /// dead server surfaces here rather than in the background. Errors if a
    /// session is still live.
    pub fn connect(&mut self) -> Result<()> {
        if let Some(receiver) = &self.receiver {
            if !receiver.is_finished() {
                return Err(ClientError::AlreadyConnected);
            }
        }
        // Reap the previous session, if any.
        if let Some(receiver) = self.receiver.take() {
            let _ = receiver.join();
        }
        self.stream = None;

        let address = self.config.address();
        let stream = TcpStream::connect(&address).map_err(|source| ClientError::Connect {
            address: address.clone(),
            source,
        })?;
        stream.set_read_timeout(Some(self.config.read_timeout))?;

        let mut writer = FrameWriter::new(stream.try_clone()?);
        let reader = FrameReader::new(stream.try_clone()?);

        // Subscription handshake: history request first, then live updates.
        writer.write_envelope(&Envelope::get_detections(self.config.max_records))?;
        writer.write_envelope(&Envelope::subscribe_updates())?;
        info!(%address, limit = self.config.max_records, "connected to detection server");

        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.connected.store(true, Ordering::SeqCst);
        self.handler.on_connection_state_changed(true);

        let shared = Arc::clone(&self.shared);
        let handler = Arc::clone(&self.handler);
        let retry_delay = self.config.retry_delay;
        let spawned = thread::Builder::new()
            .name("vigia-receiver".to_string())
            .spawn(move || receive_loop(reader, shared, handler, retry_delay));

        let receiver = match spawned {
            Ok(receiver) => receiver,
            Err(source) => {
                self.shared.running.store(false, Ordering::SeqCst);
                self.shared.connected.store(false, Ordering::SeqCst);
                let _ = stream.shutdown(Shutdown::Both);
                self.handler.on_connection_state_changed(false);
                return Err(ClientError::Io(source));
            }
        };

        self.stream = Some(stream);
        self.receiver = Some(receiver);
        Ok(())
    }

    /// Stop the session. Idempotent, and a no-op on a client that never
    /// connected. Waits for the receiver thread no longer than the
    /// configured shutdown bound; a requested disconnect fires no state
    /// callback.
    pub fn disconnect(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.connected.store(false, Ordering::SeqCst);

        if let Some(stream) = self.stream.take() {
            // Unblocks the receiver; errors just mean it is already down.
            let _ = stream.shutdown(Shutdown::Both);
        }

        if let Some(receiver) = self.receiver.take() {
            let deadline = Instant::now() + self.config.shutdown_timeout;
            while !receiver.is_finished() && Instant::now() < deadline {
                thread::sleep(JOIN_POLL_INTERVAL);
            }
            if receiver.is_finished() {
                let _ = receiver.join();
            } else {
                warn!(
                    timeout = ?self.config.shutdown_timeout,
                    "receiver thread did not stop within the shutdown bound"
                );
            }
        }
    }
}

impl Drop for DetectionClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn receive_loop(
    mut reader: FrameReader<TcpStream>,
    shared: Arc<Shared>,
    handler: Arc<dyn EventHandler>,
    retry_delay: Duration,
) {
    while shared.running.load(Ordering::SeqCst) {
        match reader.read_envelope() {
            Ok(envelope) => dispatch(&envelope, handler.as_ref()),
            Err(FrameError::ConnectionClosed) => {
                debug!("server closed the connection");
                break;
            }
            Err(err @ FrameError::InvalidFrameSize { .. }) => {
                error!(%err, "protocol violation, dropping connection");
                break;
            }
            Err(err @ FrameError::MalformedPayload(_)) => {
                error!(%err, "protocol violation, dropping connection");
                break;
            }
            Err(FrameError::Io(err)) => {
                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }
                // One coarse retry path for everything transient; read
                // timeouts on a quiet wire are expected and stay quiet.
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) {
                    trace!("read timeout, still waiting");
                } else {
                    warn!(%err, "transient read error, retrying");
                }
                thread::sleep(retry_delay);
            }
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    // Only an unrequested exit notifies; `disconnect` already cleared the
    // running flag on the caller's side.
    if shared.running.swap(false, Ordering::SeqCst) {
        handler.on_connection_state_changed(false);
    }
}

fn dispatch(envelope: &Envelope, handler: &dyn EventHandler) {
    match envelope.message_kind() {
        Some(MessageKind::Detection) => {
            handler.on_event_received(DetectionRecord::from_payload(&envelope.payload));
        }
        Some(MessageKind::Ack) => match envelope.payload.get("detecciones") {
            Some(Value::Array(items)) => {
                debug!(count = items.len(), "history list received");
                for item in items {
                    match item {
                        Value::Object(payload) => {
                            handler.on_event_received(DetectionRecord::from_payload(payload));
                        }
                        other => debug!(?other, "skipping non-object history entry"),
                    }
                }
            }
            Some(other) => debug!(?other, "detecciones is not an array, ignoring"),
            None => trace!("plain acknowledgment"),
        },
        Some(MessageKind::Error) => {
            warn!(payload = ?envelope.payload, "server reported an error");
        }
        Some(MessageKind::Ping | MessageKind::Pong | MessageKind::Frame) => {
            trace!(kind = %envelope.kind, "ignoring");
        }
        Some(MessageKind::GetDetections | MessageKind::SubscribeUpdates) => {
            // Request kinds have no business flowing server to client.
            debug!(kind = %envelope.kind, "dropping request kind sent by server");
        }
        None => {
            info!(kind = %envelope.kind, "unknown message kind, dropping");
        }
    }
}
