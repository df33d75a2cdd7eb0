//! In-memory half-duplex serial link.
//!
//! [`SimWire`] simulates the byte-oriented UART between the nodes: two
//! crossed FIFO channels with no framing, no buffering limits, and
//! disconnect detection when an endpoint is dropped.
//!
//! The endpoints are `Send`, so a driver loop can run against one end on its
//! own thread while a test plays the peer on the other.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use latchkey_core::error::WireError;
use latchkey_core::peripherals::WireLink;

#[derive(Debug, Default)]
struct Channel {
    bytes: VecDeque<u8>,
    sender_alive: bool,
    receiver_alive: bool,
}

type SharedChannel = Arc<Mutex<Channel>>;

/// One endpoint of a simulated serial link.
///
/// Created in pairs by [`SimWire::pair`]; bytes sent on one endpoint arrive
/// in order on the other. Dropping an endpoint disconnects the peer: its
/// sends fail immediately and its receives fail once the in-flight bytes
/// are drained.
#[derive(Debug)]
pub struct SimWire {
    outgoing: SharedChannel,
    incoming: SharedChannel,
}

impl SimWire {
    /// Create a connected pair of endpoints.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Mutex::new(Channel {
            bytes: VecDeque::new(),
            sender_alive: true,
            receiver_alive: true,
        }));
        let b_to_a = Arc::new(Mutex::new(Channel {
            bytes: VecDeque::new(),
            sender_alive: true,
            receiver_alive: true,
        }));

        let a = Self { outgoing: Arc::clone(&a_to_b), incoming: Arc::clone(&b_to_a) };
        let b = Self { outgoing: b_to_a, incoming: a_to_b };
        (a, b)
    }

    fn lock(channel: &SharedChannel) -> std::sync::MutexGuard<'_, Channel> {
        // Lock poisoning only happens if a holder panicked; propagating the
        // panic into the test is the desired behavior there.
        match channel.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn pop_incoming(&self) -> Result<Option<u8>, WireError> {
        let mut channel = Self::lock(&self.incoming);
        if let Some(byte) = channel.bytes.pop_front() {
            return Ok(Some(byte));
        }
        if channel.sender_alive { Ok(None) } else { Err(WireError::Disconnected) }
    }
}

impl WireLink for SimWire {
    fn send_byte(&mut self, byte: u8) -> Result<(), WireError> {
        let mut channel = Self::lock(&self.outgoing);
        if !channel.receiver_alive {
            return Err(WireError::Disconnected);
        }
        channel.bytes.push_back(byte);
        Ok(())
    }

    fn recv_byte(&mut self) -> Result<u8, WireError> {
        loop {
            if let Some(byte) = self.pop_incoming()? {
                return Ok(byte);
            }
            std::thread::yield_now();
        }
    }

    fn try_recv_byte(&mut self, timeout: Duration) -> Result<Option<u8>, WireError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(byte) = self.pop_incoming()? {
                return Ok(Some(byte));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Drop for SimWire {
    fn drop(&mut self) {
        Self::lock(&self.outgoing).sender_alive = false;
        Self::lock(&self.incoming).receiver_alive = false;
    }
}
