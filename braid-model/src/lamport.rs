//! Lamport clock: the logical timestamp carried by every log entry
//!
//! A `(id, time)` pair where `id` is the signer's public key and `time` is
//! a monotone counter. Unlike a hybrid clock there is no wall-time
//! component: ordering across replicas is purely logical, with the id as
//! the deterministic tie-breaker.

use std::cmp::Ordering;
use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::PubKey;

/// Logical clock stamped onto entries at append time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize,
    serde::Serialize, serde::Deserialize,
)]
pub struct LamportClock {
    /// Replica identifier: the signer's public key.
    pub id: PubKey,
    /// Monotone logical time. Never decreases for a given log instance.
    pub time: u64,
}

impl LamportClock {
    /// Create a clock with an explicit time.
    pub fn new(id: PubKey, time: u64) -> Self {
        Self { id, time }
    }

    /// Create a clock at time zero.
    pub fn start(id: PubKey) -> Self {
        Self { id, time: 0 }
    }

    /// Advance past an observed time: `max(local, observed) + 1`.
    ///
    /// The append path. Guarantees the returned time is strictly greater
    /// than both the local clock and anything observed.
    pub fn advance(&self, observed: u64) -> Self {
        Self {
            id: self.id,
            time: self.time.max(observed) + 1,
        }
    }

    /// Catch up to an observed time without incrementing: `max(local, observed)`.
    ///
    /// The join path. Merging remote entries must never rewind the clock,
    /// but it is not itself a new event.
    pub fn witness(&self, observed: u64) -> Self {
        Self {
            id: self.id,
            time: self.time.max(observed),
        }
    }
}

impl Ord for LamportClock {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => self.id.cmp(&other.id),
            other => other,
        }
    }
}

impl PartialOrd for LamportClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LamportClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.time, self.id.short())
    }
}
