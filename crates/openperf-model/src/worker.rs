// SPDX-License-Identifier: Apache-2.0

//! The capability every running generator's worker exposes to its [`crate::registry::Registry`].
//!
//! The trait lives here (rather than in `openperf-worker`) because the registry
//! is the thing that owns worker instances (spec.md section 4.2: "owns the
//! workers"); `openperf-worker` depends on this crate to provide concrete
//! per-module implementations (SPEC_FULL.md section 4.7).

/// A live generator's handle to its running worker(s).
///
/// The registry holds one boxed `GeneratorWorker` per running generator. Dropping
/// or calling [`stop`](Self::stop) tears down whatever OS thread(s) or resources
/// the worker owns; [`stats`](Self::stats) reads the latest published snapshot
/// without blocking the caller (spec.md section 5: "atomic pointer swap").
pub trait GeneratorWorker<S>: Send {
    /// Stops the worker and releases its resources. Consumes the box so a
    /// stopped worker cannot be queried again.
    fn stop(self: Box<Self>);

    /// Returns the latest published stats snapshot.
    fn stats(&self) -> S;
}

/// Constructs a worker for a newly-started generator.
///
/// Implemented as a `Fn` rather than a second trait so each module server can
/// close over whatever per-module context (core affinity pool, PID gains, …)
/// its worker constructor needs, without the registry knowing about it.
pub type WorkerFactory<C, S> = std::sync::Arc<dyn Fn(&crate::id::Id, &C) -> Box<dyn GeneratorWorker<S>> + Send + Sync>;
