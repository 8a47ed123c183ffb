// SPDX-License-Identifier: Apache-2.0

//! Generator, result, and TVLP identifiers (spec.md section 3.1).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-empty string over `[a-z0-9-]`, unique within the scope it was assigned in
/// (a module's generators, a module's results, or the set of TVLP configurations).
///
/// Identifiers are immutable after creation. An empty id in a create request means
/// "allocate a random id" — callers construct that case with [`Id::random`] rather
/// than trying to validate an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Validates `s` against `[a-z0-9-]+` and wraps it, or returns `None` if it
    /// is empty or contains a disallowed character.
    pub fn parse(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        if is_valid(&s) { Some(Self(s)) } else { None }
    }

    /// Allocates a random UUID-derived id. Used whenever a create request leaves
    /// `id` empty (spec.md section 3.1).
    #[must_use]
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns `true` iff `s` is non-empty and contains only `[a-z0-9-]` (spec.md
/// section 8, testable property 1).
#[must_use]
pub fn is_valid(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_matches_grammar() {
        assert!(Id::parse("gen-1").is_some());
        assert!(Id::parse("abc123").is_some());
        assert!(Id::parse("").is_none());
        assert!(Id::parse("Gen-1").is_none());
        assert!(Id::parse("gen_1").is_none());
        assert!(Id::parse("gen 1").is_none());
    }

    #[test]
    fn random_ids_are_valid_and_unique() {
        let a = Id::random();
        let b = Id::random();
        assert!(is_valid(a.as_str()));
        assert_ne!(a, b);
    }
}
