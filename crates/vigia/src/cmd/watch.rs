use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use vigia_client::{ClientConfig, DetectionClient, EventHandler};
use vigia_proto::DetectionRecord;

use crate::cmd::{parse_server_addr, WatchArgs};
use crate::exit::{client_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_record, print_records, OutputFormat, RecordLog};

/// Why the session stopped, whichever reason arrives first.
enum SessionEnd {
    CountReached,
    ConnectionLost,
    Interrupted,
}

struct WatchHandler {
    format: OutputFormat,
    log: Mutex<RecordLog>,
    delivered: AtomicUsize,
    target: Option<usize>,
    done: Sender<SessionEnd>,
}

impl EventHandler for WatchHandler {
    fn on_connection_state_changed(&self, connected: bool) {
        if connected {
            debug!("session established");
        } else {
            let _ = self.done.send(SessionEnd::ConnectionLost);
        }
    }

    fn on_event_received(&self, record: DetectionRecord) {
        print_record(&record, self.format);
        if let Ok(mut log) = self.log.lock() {
            log.push(record);
        }

        let delivered = self.delivered.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(target) = self.target {
            if delivered >= target {
                let _ = self.done.send(SessionEnd::CountReached);
            }
        }
    }
}

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    if args.count == Some(0) {
        return Ok(SUCCESS);
    }

    let (host, port) = parse_server_addr(&args.server)?;
    let config = ClientConfig {
        host,
        port,
        max_records: args.limit,
        ..ClientConfig::default()
    };

    let (done_tx, done_rx) = mpsc::channel();
    install_ctrlc_handler(done_tx.clone())?;

    let handler = Arc::new(WatchHandler {
        format,
        log: Mutex::new(RecordLog::new(args.retain)),
        delivered: AtomicUsize::new(0),
        target: args.count,
        done: done_tx,
    });

    let mut client = DetectionClient::new(config, handler.clone());
    client
        .connect()
        .map_err(|err| client_error("connect failed", err))?;
    info!(server = %args.server, "watching detection feed");

    // Blocks until the count is reached, the server goes away, or Ctrl-C.
    let end = done_rx
        .recv()
        .map_err(|_| CliError::new(INTERNAL, "session channel closed"))?;
    client.disconnect();

    if args.summary {
        let log = handler
            .log
            .lock()
            .map_err(|_| CliError::new(INTERNAL, "record log poisoned"))?;
        print_records(log.iter(), format);
    }

    match end {
        SessionEnd::ConnectionLost => Err(CliError::new(FAILURE, "connection lost")),
        SessionEnd::CountReached | SessionEnd::Interrupted => Ok(SUCCESS),
    }
}

fn install_ctrlc_handler(done: Sender<SessionEnd>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        let _ = done.send(SessionEnd::Interrupted);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
