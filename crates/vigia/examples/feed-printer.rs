//! Minimal feed consumer — connects to a detection server and prints
//! every delivered record until Enter is pressed.
//!
//! Start a development server first:
//!   cargo run --features cli -- serve 127.0.0.1:5002 --interval 1s
//!
//! Then run:
//!   cargo run --example feed-printer

use std::sync::Arc;

use vigia::client::{ClientConfig, DetectionClient, EventHandler};
use vigia::proto::DetectionRecord;

struct PrintHandler;

impl EventHandler for PrintHandler {
    fn on_connection_state_changed(&self, connected: bool) {
        eprintln!("Connection state: {connected}");
    }

    fn on_event_received(&self, record: DetectionRecord) {
        println!(
            "#{} {} conf={:.2} cam={} at {} {}",
            record.id, record.label, record.confidence, record.camera_id, record.date, record.time
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::default();
    eprintln!("Connecting to {}", config.address());

    let mut client = DetectionClient::new(config, Arc::new(PrintHandler));
    client.connect()?;
    eprintln!("Subscribed; press Enter to stop");

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    client.disconnect();
    Ok(())
}
