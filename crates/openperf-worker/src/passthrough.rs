// SPDX-License-Identifier: Apache-2.0

//! Worker for the pass-through module kinds: packet-analyzer, packet-capture,
//! and stack. None of them drive a worker thread of their own (spec.md
//! section 1; SPEC_FULL.md section 3.7) — their load source is the external
//! packet I/O data plane named as an out-of-scope collaborator.

use openperf_model::id::Id;
use openperf_model::module::{PassthroughConfig, PassthroughStats};
use openperf_model::worker::GeneratorWorker;

use crate::tick;

/// Spawns a pass-through module's "worker": a placeholder satisfying
/// [`GeneratorWorker`] so the registry's start/stop lifecycle is uniform
/// across all module kinds, without a background thread.
#[must_use]
pub fn spawn(_id: &Id, _config: &PassthroughConfig) -> Box<dyn GeneratorWorker<PassthroughStats>> {
    tick::spawn_passthrough()
}
