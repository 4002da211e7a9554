use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod doctor;
pub mod probe;
pub mod serve;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Subscribe to a detection server and print delivered events.
    Watch(WatchArgs),
    /// One-shot reachability and handshake check against a server.
    Probe(ProbeArgs),
    /// Run a synthetic detection server for development and tests.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Watch(args) => watch::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Server address (host:port).
    #[arg(value_name = "ADDR", env = "VIGIA_SERVER", default_value = "127.0.0.1:5002")]
    pub server: String,
    /// History records to request at connect time.
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub limit: usize,
    /// Records kept for the exit summary, newest first.
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub retain: usize,
    /// Exit successfully after N delivered records.
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,
    /// Print the retained records when the session ends.
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Server address (host:port).
    #[arg(value_name = "ADDR", env = "VIGIA_SERVER", default_value = "127.0.0.1:5002")]
    pub server: String,
    /// History records to request.
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub limit: usize,
    /// Overall probe timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (host:port, port 0 picks an ephemeral port).
    #[arg(value_name = "ADDR", default_value = "127.0.0.1:5002")]
    pub listen: String,
    /// Pause between synthetic live events (e.g. 2s, 250ms).
    #[arg(long, default_value = "2s")]
    pub interval: String,
    /// Stored history records available to history requests.
    #[arg(long, value_name = "N", default_value_t = 25)]
    pub history: usize,
    /// Stop after emitting N live events across all sessions.
    #[arg(long, value_name = "N")]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

/// Split a `host:port` address, keeping IPv6 brackets on the host.
pub(crate) fn parse_server_addr(input: &str) -> CliResult<(String, u16)> {
    let (host, port) = input
        .rsplit_once(':')
        .ok_or_else(|| CliError::new(USAGE, format!("address must be host:port, got: {input}")))?;

    if host.is_empty() {
        return Err(CliError::new(
            USAGE,
            format!("address is missing a host: {input}"),
        ));
    }

    let port: u16 = port
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid port in address: {input}")))?;

    Ok((host.to_string(), port))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
