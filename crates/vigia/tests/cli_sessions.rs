#![cfg(feature = "cli")]

use std::io::{BufRead, BufReader};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{Map, Value};
use vigia::client::{ClientConfig, DetectionClient, EventHandler};
use vigia::frame::{FrameReader, FrameWriter};
use vigia::proto::{DetectionRecord, Envelope, MessageKind};

/// Scripted detection server on an ephemeral loopback port.
fn spawn_feed_server(
    script: impl FnOnce(FrameReader<TcpStream>, FrameWriter<TcpStream>) + Send + 'static,
) -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let address = listener
        .local_addr()
        .expect("listener should have an address")
        .to_string();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("server should accept");
        let reader = FrameReader::new(stream.try_clone().expect("stream should clone"));
        let writer = FrameWriter::new(stream);
        script(reader, writer);
    });

    (address, handle)
}

fn expect_handshake(reader: &mut FrameReader<TcpStream>) -> u64 {
    let first = reader.read_envelope().expect("history request should arrive");
    assert_eq!(first.message_kind(), Some(MessageKind::GetDetections));
    let limit = first
        .payload
        .get("limite")
        .and_then(Value::as_u64)
        .expect("history request should carry a limit");

    let second = reader
        .read_envelope()
        .expect("subscribe request should arrive");
    assert_eq!(second.message_kind(), Some(MessageKind::SubscribeUpdates));

    limit
}

fn detection(id: i64) -> Envelope {
    let mut payload = Map::new();
    payload.insert("id".to_string(), Value::from(id));
    payload.insert("camera_id".to_string(), Value::from(2));
    payload.insert("objeto".to_string(), Value::from("person"));
    payload.insert("confianza".to_string(), Value::from(0.87));
    payload.insert("bbox".to_string(), Value::from(vec![5, 10, 105, 130]));
    Envelope::new(MessageKind::Detection, payload)
}

fn history_ack(ids: &[i64]) -> Envelope {
    let records: Vec<Value> = ids
        .iter()
        .map(|id| Value::Object(detection(*id).payload))
        .collect();

    let mut payload = Map::new();
    payload.insert("total".to_string(), Value::from(records.len()));
    payload.insert("detecciones".to_string(), Value::Array(records));
    Envelope::new(MessageKind::Ack, payload)
}

fn vigia_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vigia"));
    cmd.arg("--log-level").arg("error");
    cmd.env_remove("VIGIA_SERVER");
    cmd.env_remove("VIGIA_FORMAT");
    cmd
}

fn stdout_json_lines(stdout: &str) -> Vec<Value> {
    stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout lines should be json"))
        .collect()
}

#[test]
fn watch_count_prints_records_and_exits_zero() {
    let (address, server) = spawn_feed_server(|mut reader, mut writer| {
        let limit = expect_handshake(&mut reader);
        assert_eq!(limit, 7);
        writer
            .write_envelope(&detection(1))
            .expect("first record should send");
        writer
            .write_envelope(&detection(2))
            .expect("second record should send");
        // Hold the session open until the client hangs up.
        let _ = reader.read_envelope();
    });

    let output = vigia_cmd()
        .arg("--format")
        .arg("json")
        .arg("watch")
        .arg(&address)
        .arg("--limit")
        .arg("7")
        .arg("--count")
        .arg("2")
        .output()
        .expect("watch should run");

    assert!(output.status.success(), "watch failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let ids: Vec<i64> = stdout_json_lines(&stdout)
        .iter()
        .map(|value| value["id"].as_i64().expect("record id"))
        .collect();
    assert_eq!(ids, [1, 2]);

    server.join().expect("server should finish");
}

#[test]
fn watch_summary_lists_retained_newest_first() {
    let (address, server) = spawn_feed_server(|mut reader, mut writer| {
        expect_handshake(&mut reader);
        for id in 1..=3 {
            writer
                .write_envelope(&detection(id))
                .expect("record should send");
        }
        let _ = reader.read_envelope();
    });

    let output = vigia_cmd()
        .arg("--format")
        .arg("json")
        .arg("watch")
        .arg(&address)
        .arg("--count")
        .arg("3")
        .arg("--retain")
        .arg("2")
        .arg("--summary")
        .output()
        .expect("watch should run");

    assert!(output.status.success(), "watch failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines = stdout_json_lines(&stdout);
    assert_eq!(lines.len(), 4, "three records plus the summary: {stdout}");

    let summary = lines[3].as_array().expect("summary should be an array");
    let ids: Vec<i64> = summary
        .iter()
        .map(|value| value["id"].as_i64().expect("record id"))
        .collect();
    assert_eq!(ids, [3, 2]);

    server.join().expect("server should finish");
}

#[test]
fn watch_reports_connection_loss() {
    let (address, server) = spawn_feed_server(|mut reader, mut writer| {
        expect_handshake(&mut reader);
        writer
            .write_envelope(&detection(1))
            .expect("record should send");
        // Dropping both halves closes the session under the client.
    });

    let output = vigia_cmd()
        .arg("--format")
        .arg("json")
        .arg("watch")
        .arg(&address)
        .output()
        .expect("watch should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connection lost"), "stderr: {stderr}");

    server.join().expect("server should finish");
}

#[test]
fn watch_rejects_address_without_port() {
    let output = vigia_cmd()
        .arg("watch")
        .arg("localhost")
        .output()
        .expect("watch should run");

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("host:port"), "stderr: {stderr}");
}

#[test]
fn probe_reports_history_and_latency() {
    let (address, server) = spawn_feed_server(|mut reader, mut writer| {
        expect_handshake(&mut reader);
        writer
            .write_envelope(&history_ack(&[1, 2, 3]))
            .expect("history ack should send");
        let _ = reader.read_envelope();
    });

    let output = vigia_cmd()
        .arg("--format")
        .arg("json")
        .arg("probe")
        .arg(&address)
        .arg("--timeout")
        .arg("3s")
        .output()
        .expect("probe should run");

    assert!(output.status.success(), "probe failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let report: Value = serde_json::from_str(stdout.trim()).expect("probe should emit json");

    assert_eq!(report["connected"].as_bool(), Some(true));
    assert_eq!(report["server"].as_str(), Some(address.as_str()));
    assert_eq!(report["history_records"].as_u64(), Some(3));
    assert_eq!(report["history_total"].as_u64(), Some(3));
    assert!(report["ack_latency_ms"].as_f64().is_some());

    server.join().expect("server should finish");
}

#[test]
fn probe_timeout_returns_124() {
    // Bind and immediately drop to get a port nothing listens on.
    let dead_port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        listener
            .local_addr()
            .expect("listener should have an address")
            .port()
    };

    let output = vigia_cmd()
        .arg("probe")
        .arg(format!("127.0.0.1:{dead_port}"))
        .arg("--timeout")
        .arg("1s")
        .output()
        .expect("probe should run");

    assert_eq!(output.status.code(), Some(124));
}

fn spawn_serve(extra_args: &[&str]) -> (Child, String, BufReader<ChildStdout>) {
    let mut child = vigia_cmd()
        .arg("--format")
        .arg("json")
        .arg("serve")
        .arg("127.0.0.1:0")
        .args(extra_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let stdout = child.stdout.take().expect("serve stdout should pipe");
    let mut lines = BufReader::new(stdout);
    let mut announce = String::new();
    lines
        .read_line(&mut announce)
        .expect("serve should announce its address");
    let value: Value = serde_json::from_str(announce.trim()).expect("announce should be json");
    let address = value["listening"]
        .as_str()
        .expect("announce should carry the address")
        .to_string();

    (child, address, lines)
}

#[test]
fn serve_answers_handshake_and_emits_live_events() {
    let (mut child, address, _stdout) =
        spawn_serve(&["--interval", "100ms", "--history", "5"]);

    let stream = TcpStream::connect(&address).expect("serve should accept");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout should set");
    let mut writer = FrameWriter::new(stream.try_clone().expect("stream should clone"));
    let mut reader = FrameReader::new(stream);

    writer
        .write_envelope(&Envelope::get_detections(2))
        .expect("history request should send");
    writer
        .write_envelope(&Envelope::subscribe_updates())
        .expect("subscribe request should send");

    let history = reader.read_envelope().expect("history ack should arrive");
    assert_eq!(history.message_kind(), Some(MessageKind::Ack));
    let records = history.payload["detecciones"]
        .as_array()
        .expect("history list");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"].as_i64(), Some(4));
    assert_eq!(records[1]["id"].as_i64(), Some(5));
    assert_eq!(history.payload["total"].as_u64(), Some(2));

    let subscribe_ack = reader.read_envelope().expect("subscribe ack should arrive");
    assert_eq!(subscribe_ack.message_kind(), Some(MessageKind::Ack));
    assert_eq!(subscribe_ack.payload["status"].as_str(), Some("ok"));

    let live = reader.read_envelope().expect("live event should arrive");
    assert_eq!(live.message_kind(), Some(MessageKind::Detection));
    assert_eq!(live.payload["id"].as_i64(), Some(6));

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn serve_exits_cleanly_after_event_budget() {
    let (mut child, address, _stdout) =
        spawn_serve(&["--interval", "50ms", "--history", "1", "--count", "2"]);

    let stream = TcpStream::connect(&address).expect("serve should accept");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout should set");
    let mut writer = FrameWriter::new(stream.try_clone().expect("stream should clone"));
    let mut reader = FrameReader::new(stream);

    writer
        .write_envelope(&Envelope::get_detections(1))
        .expect("history request should send");
    writer
        .write_envelope(&Envelope::subscribe_updates())
        .expect("subscribe request should send");

    let _history = reader.read_envelope().expect("history ack should arrive");
    let _subscribe_ack = reader.read_envelope().expect("subscribe ack should arrive");

    let first = reader.read_envelope().expect("first live event");
    assert_eq!(first.payload["id"].as_i64(), Some(2));
    let second = reader.read_envelope().expect("second live event");
    assert_eq!(second.payload["id"].as_i64(), Some(3));

    let status = child.wait().expect("serve should exit on its own");
    assert!(status.success(), "serve exited with {status:?}");
}

#[test]
fn serve_feeds_detection_client_end_to_end() {
    let (mut child, address, _stdout) =
        spawn_serve(&["--interval", "50ms", "--history", "3"]);
    let (host, port) = address
        .rsplit_once(':')
        .map(|(host, port)| (host.to_string(), port.parse::<u16>().expect("port")))
        .expect("announce address should be host:port");

    struct CollectHandler {
        tx: mpsc::Sender<DetectionRecord>,
    }

    impl EventHandler for CollectHandler {
        fn on_connection_state_changed(&self, _connected: bool) {}

        fn on_event_received(&self, record: DetectionRecord) {
            let _ = self.tx.send(record);
        }
    }

    let (tx, rx) = mpsc::channel();
    let config = ClientConfig {
        host,
        port,
        max_records: 3,
        ..ClientConfig::default()
    };
    let mut client = DetectionClient::new(config, Arc::new(CollectHandler { tx }));
    client.connect().expect("client should connect");

    let mut ids = Vec::new();
    for _ in 0..4 {
        let record = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("record should be delivered");
        ids.push(record.id);
    }
    assert_eq!(ids, [1, 2, 3, 4], "history then live, in wire order");

    client.disconnect();
    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn version_prints_package_version() {
    let output = vigia_cmd()
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("vigia {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn doctor_passes_on_clean_env() {
    let output = vigia_cmd()
        .arg("--format")
        .arg("json")
        .arg("doctor")
        .output()
        .expect("doctor should run");

    assert!(output.status.success(), "doctor failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"overall\":\"pass\""), "stdout: {stdout}");
}
