//! Simulation time.

use std::fmt;

/// A monotonically non-decreasing count of abstract simulation cycles.
///
/// The kernel is the only thing that advances this value, and only ever
/// forward: [`crate::event::EventKernel::schedule`] rejects an event whose
/// fire time is strictly earlier than the kernel's current time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(pub u64);

impl SimTime {
    /// Time zero, the instant the kernel starts at.
    pub const ZERO: Self = Self(0);

    /// Returns this time advanced by `cycles`.
    #[must_use]
    pub const fn advance(self, cycles: u64) -> Self {
        Self(self.0 + cycles)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

impl From<u64> for SimTime {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::ops::Add<u64> for SimTime {
    type Output = Self;

    fn add(self, rhs: u64) -> Self {
        self.advance(rhs)
    }
}
