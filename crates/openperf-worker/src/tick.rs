// SPDX-License-Identifier: Apache-2.0

//! Shared tick-loop scaffolding for the synthetic module workers (memory,
//! block, network, packet): one thread, woken every [`QUANTA`], publishing a
//! fresh stats snapshot through the same atomic-swap mechanism spec.md
//! section 5 specifies for the CPU worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use arc_swap::ArcSwap;
use openperf_model::worker::GeneratorWorker;

/// The worker's maximum scheduling quantum (spec.md GLOSSARY: "Quanta / THRESHOLD").
pub const QUANTA: Duration = Duration::from_millis(100);

/// A worker whose tick body is a plain closure over the previous stats snapshot.
pub struct SyntheticWorker<S> {
    stats: Arc<ArcSwap<S>>,
    stop: Arc<AtomicBool>,
    thread: thread::JoinHandle<()>,
}

impl<S> GeneratorWorker<S> for SyntheticWorker<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn stop(self: Box<Self>) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.thread.join();
    }

    fn stats(&self) -> S {
        (**self.stats.load()).clone()
    }
}

/// A worker for the pass-through module kinds (packet-analyzer,
/// packet-capture, stack) that have no worker thread of their own (spec.md
/// section 1; SPEC_FULL.md section 3.7): their load source is the external
/// packet I/O data plane, so `stats` never advances past the snapshot taken
/// at start.
pub struct NullWorker<S> {
    stats: S,
}

impl<S> GeneratorWorker<S> for NullWorker<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn stop(self: Box<Self>) {}

    fn stats(&self) -> S {
        self.stats.clone()
    }
}

/// Builds a worker for a pass-through generator: no thread, stats pinned at
/// the default snapshot.
pub fn spawn_passthrough<S>() -> Box<dyn GeneratorWorker<S>>
where
    S: Default + Clone + Send + Sync + 'static,
{
    Box::new(NullWorker { stats: S::default() })
}

/// Spawns a worker thread named `thread_name` that calls `tick_fn` with the
/// previous cumulative snapshot every [`QUANTA`] until stopped, publishing
/// whatever `tick_fn` returns as the next snapshot.
pub fn spawn<S, F>(thread_name: String, mut tick_fn: F) -> Box<dyn GeneratorWorker<S>>
where
    S: Default + Clone + Send + Sync + 'static,
    F: FnMut(&S) -> S + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(ArcSwap::from_pointee(S::default()));

    let thread_stop = stop.clone();
    let thread_stats = stats.clone();
    let thread = thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            while !thread_stop.load(Ordering::Relaxed) {
                let next = tick_fn(&thread_stats.load());
                thread_stats.store(Arc::new(next));
                thread::sleep(QUANTA);
            }
        })
        .expect("failed to spawn synthetic worker thread");

    Box::new(SyntheticWorker { stats, stop, thread })
}
