//! In-flight requests and correlation id allocation.
//!
//! Ids run from 1 to 65535 and wrap back to 1, skipping any id that is
//! still waiting for a response. The table is owned by one connection and
//! guarded by a single lock, so allocation and registration happen as one
//! step and two concurrent `send()` calls can never share an id.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::error::{BlazeError, Result};
use crate::protocol::Packet;

/// Highest correlation id handed out before wrapping to 1.
pub const MAX_REQUEST_ID: u32 = u16::MAX as u32;

/// Receiving side of a registered request.
pub type ResponseReceiver = oneshot::Receiver<Result<Packet>>;

struct PendingEntry {
    method: String,
    tx: oneshot::Sender<Result<Packet>>,
    submitted_at: Instant,
}

/// Outstanding requests keyed by correlation id.
pub struct PendingRequests {
    entries: HashMap<u32, PendingEntry>,
    next_id: u32,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocate an id and register a request under it.
    ///
    /// Fails with `TooManyPending` when every id is in use.
    pub fn register(&mut self, method: &str) -> Result<(u32, ResponseReceiver)> {
        let id = self.allocate_id()?;
        let (tx, rx) = oneshot::channel();
        self.entries.insert(
            id,
            PendingEntry {
                method: method.to_string(),
                tx,
                submitted_at: Instant::now(),
            },
        );
        Ok((id, rx))
    }

    fn allocate_id(&mut self) -> Result<u32> {
        if self.entries.len() >= MAX_REQUEST_ID as usize {
            return Err(BlazeError::TooManyPending(self.entries.len()));
        }
        let mut id = self.next_id;
        while self.entries.contains_key(&id) {
            id = Self::following(id);
        }
        self.next_id = Self::following(id);
        Ok(id)
    }

    #[inline]
    fn following(id: u32) -> u32 {
        if id >= MAX_REQUEST_ID {
            1
        } else {
            id + 1
        }
    }

    /// Resolve the request waiting on `packet.id`.
    ///
    /// Returns the packet back when nobody is waiting for it.
    pub fn complete(&mut self, packet: Packet) -> std::result::Result<(), Packet> {
        match self.entries.remove(&packet.id) {
            Some(entry) => {
                tracing::debug!(
                    "Request {} (id {}) answered in {:?}",
                    entry.method,
                    packet.id,
                    entry.submitted_at.elapsed()
                );
                // The caller may have given up in the meantime.
                let _ = entry.tx.send(Ok(packet));
                Ok(())
            }
            None => Err(packet),
        }
    }

    /// Drop a request without resolving it. Returns whether it was pending.
    pub fn cancel(&mut self, id: u32) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Fail every pending request with the error produced by `err`.
    pub fn fail_all(&mut self, err: impl Fn() -> BlazeError) {
        for (id, entry) in self.entries.drain() {
            tracing::debug!("Failing request {} (id {})", entry.method, id);
            let _ = entry.tx.send(Err(err()));
        }
    }

    /// Age of the oldest pending request.
    pub fn oldest_age(&self) -> Option<Duration> {
        self.entries
            .values()
            .map(|entry| entry.submitted_at.elapsed())
            .max()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}
