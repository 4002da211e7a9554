use std::net::TcpStream;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use vigia_frame::{FrameReader, FrameWriter};
use vigia_proto::{Envelope, MessageKind};

use crate::cmd::{parse_duration, parse_server_addr, ProbeArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct ProbeOutput {
    server: String,
    connected: bool,
    ack_latency_ms: f64,
    history_records: usize,
    history_total: Option<u64>,
    server_timestamp: String,
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let (host, port) = parse_server_addr(&args.server)?;
    let address = format!("{host}:{port}");
    let timeout = parse_duration(&args.timeout)?;

    let stream = connect_with_timeout(&address, timeout)?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|err| io_error("socket setup failed", err))?;
    let read_half = stream
        .try_clone()
        .map_err(|err| io_error("socket setup failed", err))?;

    let mut writer = FrameWriter::new(stream);
    let mut reader = FrameReader::new(read_half);

    let started = Instant::now();
    writer
        .write_envelope(&Envelope::get_detections(args.limit))
        .map_err(|err| frame_error("handshake failed", err))?;
    writer
        .write_envelope(&Envelope::subscribe_updates())
        .map_err(|err| frame_error("handshake failed", err))?;

    // The first acknowledgment carries the history answer; anything the
    // server pushes ahead of it is skipped.
    let (ack, latency) = loop {
        if started.elapsed() >= timeout {
            return Err(CliError::new(
                TIMEOUT,
                format!("no acknowledgment within {timeout:?}"),
            ));
        }

        let envelope = reader
            .read_envelope()
            .map_err(|err| frame_error("receive failed", err))?;
        match envelope.message_kind() {
            Some(MessageKind::Ack) => break (envelope, started.elapsed()),
            _ => debug!(kind = %envelope.kind, "skipping pre-ack frame"),
        }
    };

    let history_records = match ack.payload.get("detecciones") {
        Some(Value::Array(items)) => items.len(),
        _ => 0,
    };
    let history_total = ack.payload.get("total").and_then(Value::as_u64);

    let out = ProbeOutput {
        server: address,
        connected: true,
        ack_latency_ms: (latency.as_secs_f64() * 1000.0 * 100.0).round() / 100.0,
        history_records,
        history_total,
        server_timestamp: ack.timestamp,
    };

    print_probe(&out, format);
    Ok(SUCCESS)
}

fn connect_with_timeout(address: &str, timeout: Duration) -> CliResult<TcpStream> {
    let start = Instant::now();
    loop {
        match TcpStream::connect(address) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                if !is_retryable_connect_error(&err) {
                    return Err(io_error("connect failed", err));
                }
                if start.elapsed() >= timeout {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect timed out after {timeout:?}"),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn is_retryable_connect_error(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset
    )
}

fn print_probe(out: &ProbeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Server probe:");
            println!("  Server:       {}", out.server);
            println!("  Connected:    {}", out.connected);
            println!("  Ack latency:  {:.2}ms", out.ack_latency_ms);
            println!("  History:      {} records", out.history_records);
            match out.history_total {
                Some(total) => println!("  Stored total: {total}"),
                None => println!("  Stored total: unreported"),
            }
            println!("  Server time:  {}", out.server_timestamp);
        }
    }
}
