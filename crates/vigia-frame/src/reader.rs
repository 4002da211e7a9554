use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::trace;
use vigia_proto::Envelope;

use crate::codec::decode_envelope;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete envelopes from any `Read` stream.
///
/// Handles partial reads internally; callers always get whole envelopes.
/// Socket read timeouts are the stream's concern and surface as
/// `FrameError::Io` with a `WouldBlock` or `TimedOut` kind, leaving any
/// partially buffered frame intact for the next call.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Read the next complete envelope (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the stream ends,
    /// whether that falls on a frame boundary or mid-frame.
    pub fn read_envelope(&mut self) -> Result<Envelope> {
        loop {
            if let Some(envelope) = decode_envelope(&mut self.buf)? {
                trace!(kind = %envelope.kind, "frame decoded");
                return Ok(envelope);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
