//! Length-prefixed JSON framing for detection connections.
//!
//! Every message on the wire is framed as:
//! - A 4-byte big-endian payload length
//! - That many bytes of UTF-8 JSON holding one protocol envelope
//!
//! There is no magic number and no checksum; a malformed payload is fatal to
//! the connection because the stream cannot be resynchronized. Readers and
//! writers handle partial reads and short writes internally, so user code
//! only ever sees complete envelopes.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_envelope, encode_envelope, HEADER_SIZE, MAX_FRAME_SIZE};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
