//! Client tooling for vigia detection feeds.
//!
//! vigia speaks the wire protocol of vigia surveillance servers — length-prefixed
//! JSON envelopes carrying live object detections and stored history — and keeps a
//! background session alive so applications only deal with decoded records.
//!
//! # Crate Structure
//!
//! - [`proto`] — Message envelopes, kind constants, and the detection record decoder
//! - [`frame`] — Length-prefixed JSON framing over blocking byte streams
//! - [`client`] — Subscriber session management and event dispatch (behind `client` feature)

/// Re-export protocol types.
pub mod proto {
    pub use vigia_proto::*;
}

/// Re-export frame types.
pub mod frame {
    pub use vigia_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use vigia_client::*;
}
