//! Length-prefixed message framing.
//!
//! ```text
//! ┌──────────────┬─────────────────────────┐
//! │ Length       │ Payload                 │
//! │ 4 bytes      │ `length` bytes, omitted │
//! │ uint32 BE    │ when the length is 0    │
//! └──────────────┴─────────────────────────┘
//! ```
//!
//! There is no magic number, checksum or type tag; the payload is opaque.

use crate::{ChannelError, ChannelResult, Transport};
use log::debug;
use std::ffi::CStr;
use std::io::IoSlice;

/// Header size in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FramerConfig {
    /// Largest payload accepted in either direction.
    pub max_payload_len: u32,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_payload_len: u32::MAX,
        }
    }
}

/// A received payload.
///
/// Non-empty payloads are stored with one extra zero byte after them, so a
/// text payload can be used as a C string without copying.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Message {
    buf: Vec<u8>,
}

impl Message {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len()]
    }

    /// The payload up to its first zero byte. `None` for an empty message.
    pub fn as_c_str(&self) -> Option<&CStr> {
        CStr::from_bytes_until_nul(&self.buf).ok()
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.pop();
        self.buf
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Sends and receives framed messages over a [`Transport`].
///
/// Every operation borrows the channel mutably, so a request and its response
/// can never interleave with another exchange on the same transport.
#[derive(Debug)]
pub struct MessageChannel<T> {
    transport: T,
    config: FramerConfig,
}

impl<T: Transport> MessageChannel<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, FramerConfig::default())
    }

    pub fn with_config(transport: T, config: FramerConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn check_len(&self, len: u64) -> ChannelResult<u32> {
        let max = self.config.max_payload_len;
        match u32::try_from(len) {
            Ok(len) if len <= max => Ok(len),
            _ => Err(ChannelError::PayloadTooLarge { len, max }),
        }
    }

    /// Sends `payload` as one frame, header and body in a single gathered
    /// write. Returns the number of bytes put on the wire.
    pub fn send(&mut self, payload: &[u8]) -> ChannelResult<usize> {
        let header = self.check_len(payload.len() as u64)?.to_be_bytes();
        debug!("sending message: {} bytes", payload.len());

        let expected = FRAME_HEADER_SIZE + payload.len();
        let sent = self
            .transport
            .write_exact(&[IoSlice::new(&header), IoSlice::new(payload)])?;
        if sent != expected {
            return Err(ChannelError::ShortWrite {
                expected,
                actual: sent,
            });
        }

        debug!("sent {sent} bytes");
        Ok(sent)
    }

    /// Blocks until a whole frame has arrived.
    pub fn recv(&mut self) -> ChannelResult<Message> {
        let mut header = [0; FRAME_HEADER_SIZE];
        self.fill(&mut header)?;
        let len = self.check_len(u32::from_be_bytes(header) as u64)? as usize;
        debug!("receiving message: expecting {len} bytes");

        if len == 0 {
            return Ok(Message::empty());
        }

        let capacity = len.checked_add(1).ok_or(ChannelError::PayloadTooLarge {
            len: len as u64,
            max: self.config.max_payload_len,
        })?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(ChannelError::AllocationFailed)?;
        buf.resize(capacity, 0);
        self.fill(&mut buf[..len])?;

        debug!("received {len} bytes");
        Ok(Message { buf })
    }

    /// Sends a request and waits for the response to it.
    pub fn exchange(&mut self, request: &[u8]) -> ChannelResult<Message> {
        self.send(request)?;
        self.recv()
    }

    fn fill(&mut self, buf: &mut [u8]) -> ChannelResult<()> {
        let expected = buf.len();
        let actual = self.transport.read_exact(buf)?;
        if actual != expected {
            return Err(ChannelError::ShortRead { expected, actual });
        }
        Ok(())
    }
}
