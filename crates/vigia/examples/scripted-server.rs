//! Tiny scripted feed server — answers the two-step handshake and emits
//! a short burst of detections per viewer, then hangs up.
//!
//! Run with:
//!   cargo run --example scripted-server
//!
//! In another terminal:
//!   cargo run --example feed-printer

use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use serde_json::{Map, Value};
use vigia::frame::{FrameReader, FrameWriter};
use vigia::proto::{Envelope, MessageKind};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:5002")?;
    eprintln!("Listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept()?;
        eprintln!("Viewer connected: {peer}");

        let mut reader = FrameReader::new(stream.try_clone()?);
        let mut writer = FrameWriter::new(stream);

        // History request, then the subscription.
        for _ in 0..2 {
            let envelope = reader.read_envelope()?;
            match envelope.message_kind() {
                Some(MessageKind::GetDetections) => {
                    let mut payload = Map::new();
                    payload.insert("detecciones".to_string(), Value::Array(Vec::new()));
                    payload.insert("total".to_string(), Value::from(0));
                    writer.write_envelope(&Envelope::new(MessageKind::Ack, payload))?;
                }
                Some(MessageKind::SubscribeUpdates) => {
                    let mut payload = Map::new();
                    payload.insert("status".to_string(), Value::from("ok"));
                    writer.write_envelope(&Envelope::new(MessageKind::Ack, payload))?;
                }
                _ => eprintln!("Unexpected frame during handshake: {}", envelope.kind),
            }
        }

        for id in 1..=5i64 {
            let mut payload = Map::new();
            payload.insert("id".to_string(), Value::from(id));
            payload.insert("camera_id".to_string(), Value::from(1));
            payload.insert("objeto".to_string(), Value::from("person"));
            payload.insert("confianza".to_string(), Value::from(0.9));
            payload.insert("bbox".to_string(), Value::from(vec![10, 20, 110, 140]));
            writer.write_envelope(&Envelope::new(MessageKind::Detection, payload))?;
            thread::sleep(Duration::from_millis(500));
        }
        eprintln!("Burst complete, closing session");
    }
}
