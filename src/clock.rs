//! Clock
//!
//! Time source abstraction. Every time-aware engine reads the current instant
//! through an injected [`Clock`] rather than calling the wall clock directly,
//! so tests can drive time deterministically with a [`ManualClock`] while
//! production uses the real [`SystemClock`].

use std::sync::{Mutex, PoisonError};

use jiff::{SignedDuration, Timestamp};

/// A source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Timestamp;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Test-controlled virtual clock.
///
/// Starts at a fixed instant and only moves when [`ManualClock::advance`] is
/// called, allowing timeout-driven behaviour to be exercised deterministically.
/// Advancing through a shared reference keeps the clock usable behind an
/// [`std::sync::Arc`].
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    /// Creates a manual clock fixed at `instant`.
    pub fn starting_at(instant: Timestamp) -> Self {
        Self {
            current: Mutex::new(instant),
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: SignedDuration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(next) = current.checked_add(delta) {
            *current = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
