//! # Message Bus
//!
//! Double-buffered, fixed-capacity queue of small `Pod` messages.
//!
//! ## Architecture
//!
//! ```text
//!   MessageSender (any thread)           MessageBus (frame thread)
//!         │                                     │
//!         │ post()                              │ poll()
//!         ▼                                     ▼
//!   ┌───────────────┐    empty() swaps   ┌───────────────┐
//!   │ pending arena │ ◀────────────────▶ │ current arena │
//!   │   (mutex)     │                    │               │
//!   └───────────────┘                    └───────────────┘
//! ```
//!
//! Messages posted during frame N are read during frame N+1. The frame
//! thread drains the bus once per frame:
//!
//! ```rust,ignore
//! while !bus.empty() {
//!     if let Some(message) = bus.poll() {
//!         scene.forward_message(&message);
//!     }
//! }
//! ```

mod arena;
mod events;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::Mutex;

use crate::config::MessageBusConfig;
use crate::error::MessageBusError;
use arena::Arena;

pub use arena::{framed_size, HEADER_SIZE, MAX_PAYLOAD};
pub use events::{SceneEvent, WindowEvent, SCENE_MESSAGE, USER_MESSAGE_START, WINDOW_MESSAGE};

/// A message read from the bus.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// Message ID.
    pub id: i32,
    size: usize,
    data: [u8; MAX_PAYLOAD],
}

impl Message {
    fn from_parts(id: i32, payload: &[u8]) -> Self {
        let mut data = [0u8; MAX_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);
        Self {
            id,
            size: payload.len(),
            data,
        }
    }

    /// Payload size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Raw payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// Reads the payload as `T`.
    ///
    /// # Returns
    ///
    /// `None` if the payload size differs from `size_of::<T>()`.
    #[must_use]
    pub fn data<T: Pod>(&self) -> Option<T> {
        if self.size != std::mem::size_of::<T>() {
            return None;
        }
        bytemuck::try_pod_read_unaligned(self.payload()).ok()
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("payload", &self.payload())
            .finish()
    }
}

struct BusShared {
    pending: Mutex<Arena>,
    enabled: AtomicBool,
    dropped: AtomicUsize,
}

impl BusShared {
    fn post_raw(&self, id: i32, payload: &[u8]) -> Result<(), MessageBusError> {
        let result = if self.enabled.load(Ordering::Acquire) {
            self.pending.lock().write(id, payload)
        } else {
            Err(MessageBusError::Disabled)
        };

        if let Err(err) = result {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            if err != MessageBusError::Disabled {
                tracing::error!(id, error = %err, "message dropped");
            }
        }
        result
    }
}

/// Cloneable handle for posting to a [`MessageBus`] from anywhere.
#[derive(Clone)]
pub struct MessageSender {
    shared: Arc<BusShared>,
}

impl MessageSender {
    /// Posts a `Pod` payload.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if the pending arena is full, the
    /// payload exceeds [`MAX_PAYLOAD`], or the bus is disabled.
    pub fn post<T: Pod>(&self, id: i32, value: &T) -> Result<(), MessageBusError> {
        self.shared.post_raw(id, bytemuck::bytes_of(value))
    }

    /// Posts raw payload bytes.
    ///
    /// # Errors
    ///
    /// See [`MessageSender::post`].
    pub fn post_raw(&self, id: i32, payload: &[u8]) -> Result<(), MessageBusError> {
        self.shared.post_raw(id, payload)
    }
}

/// Owner of both arenas. Polled once per frame by the application loop.
pub struct MessageBus {
    current: Arena,
    shared: Arc<BusShared>,
    /// Set after a swap produced messages; the next `empty()` on a drained
    /// arena ends the frame instead of swapping again.
    drain_started: bool,
}

impl MessageBus {
    /// Creates a bus from configuration.
    #[must_use]
    pub fn new(config: &MessageBusConfig) -> Self {
        let bus = Self::with_capacity(config.capacity_bytes);
        if !config.enabled {
            bus.disable();
        }
        bus
    }

    /// Creates a bus whose arenas each hold `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        tracing::debug!(capacity, "message bus created");
        Self {
            current: Arena::new(capacity),
            shared: Arc::new(BusShared {
                pending: Mutex::new(Arena::new(capacity)),
                enabled: AtomicBool::new(true),
                dropped: AtomicUsize::new(0),
            }),
            drain_started: false,
        }
    }

    /// Returns a posting handle.
    #[must_use]
    pub fn sender(&self) -> MessageSender {
        MessageSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Posts a `Pod` payload.
    ///
    /// # Errors
    ///
    /// See [`MessageSender::post`].
    pub fn post<T: Pod>(&self, id: i32, value: &T) -> Result<(), MessageBusError> {
        self.shared.post_raw(id, bytemuck::bytes_of(value))
    }

    /// Posts raw payload bytes.
    ///
    /// # Errors
    ///
    /// See [`MessageSender::post`].
    pub fn post_raw(&self, id: i32, payload: &[u8]) -> Result<(), MessageBusError> {
        self.shared.post_raw(id, payload)
    }

    /// Reads the next message of the current frame, FIFO.
    pub fn poll(&mut self) -> Option<Message> {
        self.current.read()
    }

    /// Frame boundary check.
    ///
    /// Returns `false` while the current arena still has unread messages.
    /// Once it is drained, the first call of a frame swaps in the pending
    /// arena; if that brings no messages, or the frame's messages were
    /// already drained, returns `true`.
    pub fn empty(&mut self) -> bool {
        if self.current.unread() > 0 {
            return false;
        }
        if self.drain_started {
            self.drain_started = false;
            return true;
        }

        self.current.reset();
        std::mem::swap(&mut self.current, &mut *self.shared.pending.lock());

        if self.current.unread() > 0 {
            tracing::trace!(count = self.current.count(), "message arenas swapped");
            self.drain_started = true;
            false
        } else {
            true
        }
    }

    /// Messages waiting for the next frame.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().count()
    }

    /// Messages not yet polled this frame.
    #[must_use]
    pub fn current_count(&self) -> usize {
        self.current.unread()
    }

    /// Bytes used in the pending arena.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.shared.pending.lock().bytes_used()
    }

    /// Capacity of each arena in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.current.capacity()
    }

    /// Messages rejected since creation.
    #[must_use]
    pub fn dropped_count(&self) -> usize {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Stops accepting messages. Already queued messages remain readable.
    pub fn disable(&self) {
        self.shared.enabled.store(false, Ordering::Release);
        tracing::info!("message bus disabled");
    }

    /// True unless [`MessageBus::disable`] was called.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }
}
