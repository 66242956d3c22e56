//! Error taxonomy for the simulation kernel.
//!
//! Most of these are not fatal: the kernel keeps running after a
//! [`SimError::Temporal`], [`SimError::Protocol`], [`SimError::Capacity`], or
//! [`SimError::AddressOutOfRange`] condition and only surfaces them as
//! counters and trace records. Only [`SimError::Configuration`] and
//! [`SimError::GraphWiring`] are returned from fallible constructors and stop
//! simulation before it starts.

use thiserror::Error;

/// Failure taxonomy for the simulation kernel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimError {
    /// A configuration parameter is outside its declared range.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A specialized connection was started without all of its required
    /// source ports bound.
    #[error("graph wiring error: {0}")]
    GraphWiring(String),

    /// An event was scheduled at a time strictly earlier than the kernel's
    /// current time.
    #[error("temporal error: cannot schedule at {requested} when current time is {current}")]
    Temporal {
        /// The rejected fire time.
        requested: u64,
        /// The kernel's current time at the point of rejection.
        current: u64,
    },

    /// A destination port was occupied when a connection attempted delivery.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An enqueue was attempted against a full buffer.
    #[error("capacity error: {0}")]
    Capacity(String),

    /// A register or ROB index lookup fell outside the valid range.
    #[error("address out of range: {0}")]
    AddressOutOfRange(usize),
}

/// Convenience alias for kernel operations that may fail.
pub type SimResult<T> = Result<T, SimError>;
