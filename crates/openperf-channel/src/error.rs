// SPDX-License-Identifier: Apache-2.0

//! Errors for the bus and codec.
//!
//! Important note: it is important not to use `!Send` data types in errors
//! (e.g. avoid `Rc`) so these errors can cross the thread boundary between a
//! module server's dedicated OS thread and the REST facade's runtime.

/// Errors that can occur sending a request onto the bus.
#[derive(thiserror::Error, Debug)]
pub enum SendError<T> {
    /// The module server has shut down and is no longer receiving requests.
    #[error("bus is closed, the module server is not receiving requests")]
    Closed(T),
}

impl<T> SendError<T> {
    /// Returns the value that failed to send.
    pub fn into_inner(self) -> T {
        match self {
            Self::Closed(t) => t,
        }
    }
}

/// Errors that can occur waiting for a reply.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// The module server dropped the reply channel without answering, typically
    /// because it panicked or shut down mid-request.
    #[error("module server dropped the request without replying")]
    Closed,
}

/// Errors raised by the length-delimited wire codec (spec.md section 4.1 / 6.1).
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The frame was missing a part the variant's declaration requires.
    #[error("frame is missing part {index} required by the message")]
    MissingPart {
        /// Zero-based index of the missing part.
        index: usize,
    },

    /// The frame's final part still had the "more" flag set, or trailing parts
    /// were left unconsumed after decoding every declared field.
    #[error("frame was not fully consumed or did not terminate cleanly")]
    UnterminatedFrame,

    /// Part 0 did not match any known request/reply discriminant.
    #[error("unknown message discriminant {discriminant}")]
    UnknownDiscriminant {
        /// The discriminant value that failed to match a known variant.
        discriminant: u32,
    },

    /// A fixed-width scalar field did not have the expected byte length.
    #[error("part {index} has length {actual}, expected {expected}")]
    BadScalarLength {
        /// Zero-based index of the malformed part.
        index: usize,
        /// Expected byte length.
        expected: usize,
        /// Actual byte length encountered.
        actual: usize,
    },

    /// A length-prefixed string part was not valid UTF-8.
    #[error("part {index} is not valid UTF-8")]
    InvalidUtf8 {
        /// Zero-based index of the malformed part.
        index: usize,
    },
}

impl From<std::convert::Infallible> for ThreadTaskError {
    fn from(value: std::convert::Infallible) -> Self {
        match value {}
    }
}

/// Errors from [`crate::thread_task::spawn_thread_local_task`] and its handle.
#[derive(thiserror::Error, Debug)]
pub enum ThreadTaskError {
    /// Failed to spawn the dedicated OS thread.
    #[error("failed to spawn thread '{thread_name}': {source}")]
    Spawn {
        /// Name of the thread that failed to spawn.
        thread_name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The thread panicked instead of returning normally.
    #[error("thread '{thread_name}' panicked: {panic_message}")]
    Panic {
        /// Name of the thread that panicked.
        thread_name: String,
        /// Best-effort rendering of the panic payload.
        panic_message: String,
    },
}
