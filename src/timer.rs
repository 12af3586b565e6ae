//! Per-room timer slot
//!
//! A room holds at most one pending timer. Arming replaces (and aborts) the
//! previous one; each arm gets a fresh generation, and a fired task only acts
//! if its generation is still the current one once it holds the room lock.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::room::Room;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// The current turn runs out
    TurnExpiry,
    /// Pause after a round before the next one starts
    NextRound,
    /// Final results shown, back to the lobby
    ResetLobby,
}

#[derive(Debug)]
struct Pending {
    generation: u64,
    kind: TimerKind,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    pending: Option<Pending>,
}

impl TimerSlot {
    /// Schedule `kind` to fire against `room` after `delay`, cancelling
    /// whatever was pending.
    pub fn arm(&mut self, room: Weak<RwLock<Room>>, kind: TimerKind, delay: Duration) {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let deadline = Instant::now() + delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let Some(room) = room.upgrade() else {
                return;
            };
            let mut room = room.write().await;
            room.fire_timer(generation, kind);
        });

        self.pending = Some(Pending {
            generation,
            kind,
            handle,
        });
    }

    /// Cancel the pending timer, if any. Safe to call any number of times.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Called by a fired task holding the room lock. Clears the slot and
    /// returns true only if `generation` is still the armed one.
    pub(crate) fn claim(&mut self, generation: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.generation == generation => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn kind(&self) -> Option<TimerKind> {
        self.pending.as_ref().map(|p| p.kind)
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
