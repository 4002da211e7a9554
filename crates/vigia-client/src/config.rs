use std::time::Duration;

/// Configuration for a [`DetectionClient`](crate::DetectionClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server hostname or IP address.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// Number of history records requested at connect time.
    pub max_records: usize,
    /// Socket-level read timeout for the receive loop.
    pub read_timeout: Duration,
    /// Pause before retrying after a transient read error.
    pub retry_delay: Duration,
    /// Upper bound on waiting for the receiver thread in `disconnect`.
    pub shutdown_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5002,
            max_records: 100,
            read_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

impl ClientConfig {
    /// The `host:port` form handed to `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
