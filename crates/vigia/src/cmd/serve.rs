use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use vigia_frame::{FrameError, FrameReader, FrameWriter};
use vigia_proto::{DetectionRecord, Envelope, MessageKind};

use crate::cmd::{parse_duration, parse_server_addr, ServeArgs};
use crate::exit::{io_error, CliError, CliResult, SUCCESS};
use crate::output::OutputFormat;

const SESSION_POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Classes cycled through by the synthetic feed.
const LABELS: [&str; 4] = ["person", "car", "dog", "bicycle"];

enum SessionOutcome {
    ViewerGone,
    BudgetSpent,
}

#[derive(Serialize)]
struct ServeAnnounce<'a> {
    listening: &'a str,
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let (host, port) = parse_server_addr(&args.listen)?;
    let interval = parse_duration(&args.interval)?;

    let listener =
        TcpListener::bind((host.as_str(), port)).map_err(|err| io_error("bind failed", err))?;
    let local = listener
        .local_addr()
        .map_err(|err| io_error("bind failed", err))?;
    announce_listening(&local.to_string(), format);
    info!(address = %local, history = args.history, "synthetic detection server ready");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut total_emitted = 0u64;

    while running.load(Ordering::SeqCst) {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("accept failed", err)),
        };
        info!(viewer = %peer, "viewer connected");

        match serve_session(stream, &args, interval, &running, &mut total_emitted)? {
            SessionOutcome::BudgetSpent => return Ok(SUCCESS),
            SessionOutcome::ViewerGone => continue,
        }
    }

    Ok(SUCCESS)
}

/// One viewer session: answer requests, push live events once subscribed.
fn serve_session(
    stream: TcpStream,
    args: &ServeArgs,
    interval: Duration,
    running: &AtomicBool,
    total_emitted: &mut u64,
) -> CliResult<SessionOutcome> {
    let poll = SESSION_POLL_TIMEOUT.min(interval);
    stream
        .set_read_timeout(Some(poll))
        .map_err(|err| io_error("socket setup failed", err))?;
    let write_half = stream
        .try_clone()
        .map_err(|err| io_error("socket setup failed", err))?;

    let mut reader = FrameReader::new(stream);
    let mut writer = FrameWriter::new(write_half);

    let history = synthetic_history(args.history);
    let mut next_id = args.history as i64 + 1;
    let mut subscribed = false;
    let mut next_emit = Instant::now() + interval;

    while running.load(Ordering::SeqCst) {
        match reader.read_envelope() {
            Ok(envelope) => match envelope.message_kind() {
                Some(MessageKind::GetDetections) => {
                    let limit = envelope
                        .payload
                        .get("limite")
                        .and_then(Value::as_u64)
                        .unwrap_or(100) as usize;
                    if writer.write_envelope(&history_ack(&history, limit)).is_err() {
                        return Ok(SessionOutcome::ViewerGone);
                    }
                    debug!(limit, "answered history request");
                }
                Some(MessageKind::SubscribeUpdates) => {
                    let mut payload = Map::new();
                    payload.insert("status".to_string(), Value::from("ok"));
                    if writer
                        .write_envelope(&Envelope::new(MessageKind::Ack, payload))
                        .is_err()
                    {
                        return Ok(SessionOutcome::ViewerGone);
                    }
                    subscribed = true;
                    next_emit = Instant::now() + interval;
                    debug!("viewer subscribed to live events");
                }
                Some(MessageKind::Ping) => {
                    if writer
                        .write_envelope(&Envelope::new(MessageKind::Pong, Map::new()))
                        .is_err()
                    {
                        return Ok(SessionOutcome::ViewerGone);
                    }
                }
                _ => debug!(kind = %envelope.kind, "ignoring viewer frame"),
            },
            Err(FrameError::ConnectionClosed) => {
                info!("viewer disconnected");
                return Ok(SessionOutcome::ViewerGone);
            }
            Err(FrameError::Io(err))
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                // Idle tick; fall through to the emission check.
            }
            Err(FrameError::Io(err)) => {
                warn!(error = %err, "viewer read failed");
                return Ok(SessionOutcome::ViewerGone);
            }
            Err(err) => {
                warn!(error = %err, "dropping misbehaving viewer");
                return Ok(SessionOutcome::ViewerGone);
            }
        }

        if subscribed && Instant::now() >= next_emit {
            let record = synthetic_record(next_id);
            next_id += 1;
            if writer
                .write_envelope(&Envelope::new(MessageKind::Detection, record.to_payload()))
                .is_err()
            {
                return Ok(SessionOutcome::ViewerGone);
            }
            debug!(id = record.id, label = %record.label, "emitted live detection");
            *total_emitted += 1;
            next_emit += interval;

            if let Some(count) = args.count {
                if *total_emitted >= count {
                    info!(emitted = *total_emitted, "event budget spent, shutting down");
                    return Ok(SessionOutcome::BudgetSpent);
                }
            }
        }
    }

    Ok(SessionOutcome::ViewerGone)
}

fn announce_listening(address: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ServeAnnounce { listening: address };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("listening on {address}"),
    }
}

fn synthetic_history(count: usize) -> Vec<DetectionRecord> {
    (1..=count as i64).map(synthetic_record).collect()
}

/// Deterministic pseudo-variation keyed off the id, so repeated runs
/// produce a stable feed.
fn synthetic_record(id: i64) -> DetectionRecord {
    let index = id.unsigned_abs() as usize;
    let x1 = ((index * 37) % 500) as i64;
    let y1 = ((index * 53) % 300) as i64;
    let now = Local::now();

    DetectionRecord {
        id,
        camera_id: (index % 3 + 1) as i64,
        label: LABELS[index % LABELS.len()].to_string(),
        confidence: 0.60 + ((index * 7) % 40) as f64 / 100.0,
        bounding_box: [x1, y1, x1 + 120, y1 + 90],
        image_path: format!("capturas/deteccion_{id}.jpg"),
        timestamp: Utc::now().to_rfc3339(),
        date: now.format("%Y-%m-%d").to_string(),
        time: now.format("%H:%M:%S").to_string(),
    }
}

/// Latest `limit` stored records in ascending id order, the shape the
/// production storage layer answers with.
fn history_ack(history: &[DetectionRecord], limit: usize) -> Envelope {
    let start = history.len().saturating_sub(limit);
    let records: Vec<Value> = history[start..]
        .iter()
        .map(|record| Value::Object(record.to_payload()))
        .collect();

    let mut payload = Map::new();
    payload.insert("total".to_string(), Value::from(records.len()));
    payload.insert("detecciones".to_string(), Value::Array(records));
    Envelope::new(MessageKind::Ack, payload)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
