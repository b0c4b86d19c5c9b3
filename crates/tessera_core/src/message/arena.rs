//! # Message Arena
//!
//! Fixed-capacity byte buffer holding a sequence of framed messages.
//!
//! ```text
//! | id: i32 LE | size: u32 LE | payload ... | pad to 8 |
//! |<------- HEADER_SIZE ----->|
//! ```

use super::Message;
use crate::error::MessageBusError;

/// Bytes taken by each message header.
pub const HEADER_SIZE: usize = 8;

/// Maximum payload bytes per message.
pub const MAX_PAYLOAD: usize = 128;

/// Bytes a message with a `payload_len` byte payload occupies.
#[inline]
#[must_use]
pub const fn framed_size(payload_len: usize) -> usize {
    HEADER_SIZE + ((payload_len + 7) & !7)
}

pub(crate) struct Arena {
    buffer: Box<[u8]>,
    /// Write cursor.
    position: usize,
    /// Read cursor.
    cursor: usize,
    /// Messages written since the last reset.
    count: usize,
    /// Messages read since the last reset.
    read: usize,
}

impl Arena {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            position: 0,
            cursor: 0,
            count: 0,
            read: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub(crate) fn unread(&self) -> usize {
        self.count - self.read
    }

    #[inline]
    pub(crate) fn bytes_used(&self) -> usize {
        self.position
    }

    pub(crate) fn reset(&mut self) {
        self.position = 0;
        self.cursor = 0;
        self.count = 0;
        self.read = 0;
    }

    /// Appends one message. Either the whole message is written or nothing.
    pub(crate) fn write(&mut self, id: i32, payload: &[u8]) -> Result<(), MessageBusError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(MessageBusError::PayloadTooLarge {
                id,
                size: payload.len(),
                limit: MAX_PAYLOAD,
            });
        }

        let needed = framed_size(payload.len());
        let available = self.capacity() - self.position;
        if needed > available {
            return Err(MessageBusError::Overflow {
                id,
                needed,
                available,
            });
        }

        let start = self.position;
        #[allow(clippy::cast_possible_truncation)]
        let size = payload.len() as u32;
        self.buffer[start..start + 4].copy_from_slice(&id.to_le_bytes());
        self.buffer[start + 4..start + HEADER_SIZE].copy_from_slice(&size.to_le_bytes());
        let body = start + HEADER_SIZE;
        self.buffer[body..body + payload.len()].copy_from_slice(payload);
        self.buffer[body + payload.len()..start + needed].fill(0);

        self.position += needed;
        self.count += 1;
        Ok(())
    }

    /// Reads the next unread message.
    pub(crate) fn read(&mut self) -> Option<Message> {
        if self.read == self.count {
            return None;
        }

        let start = self.cursor;
        let id: i32 = bytemuck::try_pod_read_unaligned(&self.buffer[start..start + 4]).ok()?;
        let size: u32 = bytemuck::try_pod_read_unaligned(&self.buffer[start + 4..start + HEADER_SIZE]).ok()?;
        let size = size as usize;
        debug_assert!(size <= MAX_PAYLOAD, "corrupt message header");

        let body = start + HEADER_SIZE;
        let message = Message::from_parts(id, &self.buffer[body..body + size]);
        self.cursor += framed_size(size);
        self.read += 1;
        Some(message)
    }
}
