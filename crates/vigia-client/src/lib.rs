//! TCP connection management for vigia detection feeds.
//!
//! The highest-level crate: configure, hand in an event handler, and
//! `connect`. The client performs the two-message subscription handshake
//! (history request, then live subscription), after which a dedicated
//! receiver thread decodes frames and delivers detection records to the
//! handler in wire order. Socket timeouts, transient read errors, and
//! shutdown are handled inside the loop; embedders only see records and
//! connection-state changes.

pub mod client;
pub mod config;
pub mod error;
pub mod handler;

pub use client::DetectionClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use handler::EventHandler;
