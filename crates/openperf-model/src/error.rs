// SPDX-License-Identifier: Apache-2.0

//! The shared error taxonomy of spec.md section 7, reused by every module's
//! registry so the REST facade has exactly one place to map errors onto status
//! codes (spec.md section 6.3).

/// Errors returned by registry and TVLP operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The referenced id is unknown. REST maps this to 404.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// What kind of object was looked up (e.g. "generator", "result", "tvlp").
        kind: &'static str,
        /// The id that was not found.
        id: String,
    },

    /// The id is already in use. REST maps this to 400/409.
    #[error("{kind} '{id}' already exists")]
    Exists {
        /// What kind of object already exists.
        kind: &'static str,
        /// The id that collided.
        id: String,
    },

    /// A malformed id, malformed config, or illegal state transition. REST maps
    /// this to 400.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable description of the violation.
        message: String,
    },

    /// A running generator is being deleted, or an active result is being
    /// deleted. REST maps this to 400.
    #[error("{kind} '{id}' is busy")]
    Busy {
        /// What kind of object is busy.
        kind: &'static str,
        /// The id that is busy.
        id: String,
    },

    /// The message codec or bus failed. REST maps this to 500.
    #[error("bus error: {message}")]
    BusError {
        /// Human-readable description of the failure.
        message: String,
    },

    /// A module-specific failure with a human-readable message. The caller
    /// picks 400 or 500 depending on context (spec.md section 7).
    #[error("{message}")]
    Custom {
        /// Human-readable description of the failure.
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    /// Shorthand for [`Error::Exists`].
    #[must_use]
    pub fn exists(kind: &'static str, id: impl Into<String>) -> Self {
        Self::Exists { kind, id: id.into() }
    }

    /// Shorthand for [`Error::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    /// Shorthand for [`Error::Busy`].
    #[must_use]
    pub fn busy(kind: &'static str, id: impl Into<String>) -> Self {
        Self::Busy { kind, id: id.into() }
    }
}
