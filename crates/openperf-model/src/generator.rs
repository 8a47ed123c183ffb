// SPDX-License-Identifier: Apache-2.0

//! The per-module generator type (spec.md section 3.2).

use serde::{Deserialize, Serialize};

use crate::id::Id;

/// A configured, idle or running load-producing object within a module.
///
/// `running` is not stored directly: it is derived from whether
/// [`current_result_id`](Self::current_result_id) is set, matching spec.md
/// section 3.2's "running: derived: true iff a live result object points to
/// this generator".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator<C> {
    id: Id,
    config: C,
    current_result_id: Option<Id>,
}

impl<C> Generator<C> {
    /// Creates a new, idle generator.
    pub fn new(id: Id, config: C) -> Self {
        Self {
            id,
            config,
            current_result_id: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &Id {
        &self.id
    }

    #[must_use]
    pub fn config(&self) -> &C {
        &self.config
    }

    /// True iff a live result object points to this generator (spec.md section 3.2).
    #[must_use]
    pub fn running(&self) -> bool {
        self.current_result_id.is_some()
    }

    #[must_use]
    pub fn current_result_id(&self) -> Option<&Id> {
        self.current_result_id.as_ref()
    }

    pub(crate) fn attach_result(&mut self, result_id: Id) {
        self.current_result_id = Some(result_id);
    }

    pub(crate) fn detach_result(&mut self) -> Option<Id> {
        self.current_result_id.take()
    }
}
