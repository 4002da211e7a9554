//! Wire-level types for the vigia detection protocol.
//!
//! Detection servers speak JSON envelopes of the shape
//! `{"tipo": <kind>, "timestamp": <ISO-8601>, "datos": <object>}`. This
//! crate holds the plain data types: the envelope, the kind discriminator,
//! and the detection record with its total (never-failing) decoder.
//! Framing lives in `vigia-frame`; connection management in `vigia-client`.

mod detection;
mod envelope;
mod kind;

pub use detection::{DetectionRecord, DEFAULT_LABEL};
pub use envelope::Envelope;
pub use kind::MessageKind;
