// SPDX-License-Identifier: Apache-2.0

//! The per-module TVLP worker (spec.md section 4.5): walks a scaled entry
//! series against one module's REST surface over a dedicated OS thread,
//! exactly as [`openperf_server::server`] gives each module its own thread.
//!
//! State is published lock-free: [`WorkerState`] and the current offset are
//! single atomically-written words, the error message and result vector are
//! atomically swapped immutable values (spec.md section 5).

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use openperf_channel::error::ThreadTaskError;
use openperf_channel::thread_task::{self, ThreadLocalTaskHandle};
use openperf_rest_client::RestClient;

use crate::profile::ProfileEntry;

/// The worker's maximum sleep granularity during countdown and between stats
/// pulls (spec.md section 4.5.1, GLOSSARY "Quanta / THRESHOLD").
pub const THRESHOLD: Duration = Duration::from_millis(100);

/// The worker's state machine (spec.md section 4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Ready,
    Countdown,
    Running,
    Error,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Ready,
            1 => WorkerState::Countdown,
            2 => WorkerState::Running,
            _ => WorkerState::Error,
        }
    }
}

/// The generator and result this worker currently owns in the target module
/// (spec.md section 3.6: "each worker owns the string-identifiers of the
/// generators and results it created ... and is responsible for deleting
/// them on stop").
struct ActiveEntry {
    generator_id: String,
    result_id: String,
}

struct SharedState {
    state: Arc<AtomicU8>,
    offset_ns: Arc<AtomicU64>,
    error: Arc<ArcSwapOption<String>>,
    results: Arc<ArcSwap<Vec<Value>>>,
}

impl SharedState {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn set_offset(&self, offset: Duration) {
        self.offset_ns
            .store(u64::try_from(offset.as_nanos()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    fn fail(&self, message: String) {
        self.error.store(Some(Arc::new(message)));
        self.set_state(WorkerState::Error);
    }

    fn push_snapshot(&self, snapshot: Value) {
        self.results.rcu(|current| {
            let mut next = (**current).clone();
            next.push(snapshot.clone());
            next
        });
    }

    fn replace_last_snapshot(&self, snapshot: Value) {
        self.results.rcu(|current| {
            let mut next = (**current).clone();
            match next.last_mut() {
                Some(last) => *last = snapshot.clone(),
                None => next.push(snapshot.clone()),
            }
            next
        });
    }
}

/// Drives one module's scaled entry series against its REST surface
/// (spec.md section 4.5.1, 4.5.2).
pub struct TvlpWorker<C> {
    module_path: &'static str,
    results_path: &'static str,
    supports_toggle: bool,
    entries: Vec<ProfileEntry<C>>,
    rest: RestClient,
    state: Arc<AtomicU8>,
    offset_ns: Arc<AtomicU64>,
    error: Arc<ArcSwapOption<String>>,
    results: Arc<ArcSwap<Vec<Value>>>,
    task: Mutex<Option<ThreadLocalTaskHandle<(), ThreadTaskError>>>,
}

impl<C> TvlpWorker<C>
where
    C: Clone + Serialize + Send + Sync + 'static,
{
    /// Builds a worker for one module's already-scaled entry series.
    /// `module_path`/`results_path` are the REST path segments from spec.md
    /// section 6.2 (e.g. `"cpu"`/`"cpu-results"`); `supports_toggle` mirrors
    /// [`openperf_model::module::ModuleKind::supports_toggle`].
    #[must_use]
    pub fn new(
        module_path: &'static str,
        results_path: &'static str,
        supports_toggle: bool,
        entries: Vec<ProfileEntry<C>>,
        rest: RestClient,
    ) -> Self {
        Self {
            module_path,
            results_path,
            supports_toggle,
            entries,
            rest,
            state: Arc::new(AtomicU8::new(WorkerState::Ready as u8)),
            offset_ns: Arc::new(AtomicU64::new(0)),
            error: Arc::new(ArcSwapOption::from(None)),
            results: Arc::new(ArcSwap::from_pointee(Vec::new())),
            task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn module_path(&self) -> &'static str {
        self.module_path
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn offset(&self) -> Duration {
        Duration::from_nanos(self.offset_ns.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.error.load_full().map(|message| (*message).clone())
    }

    #[must_use]
    pub fn results(&self) -> Vec<Value> {
        (**self.results.load()).clone()
    }

    /// Starts the countdown-to-`t0`-then-run series (spec.md section 4.5.1).
    /// Returns an error if the worker is already started.
    pub fn start(&self, t0: DateTime<Utc>) -> Result<(), String> {
        let mut guard = self.task.lock();
        if guard.is_some() {
            return Err("tvlp worker is already started".into());
        }

        self.state.store(WorkerState::Countdown as u8, Ordering::SeqCst);
        self.offset_ns.store(0, Ordering::SeqCst);
        self.error.store(None);
        self.results.store(Arc::new(Vec::new()));

        let shared = SharedState {
            state: Arc::clone(&self.state),
            offset_ns: Arc::clone(&self.offset_ns),
            error: Arc::clone(&self.error),
            results: Arc::clone(&self.results),
        };
        let rest = self.rest.clone();
        let module_path = self.module_path;
        let results_path = self.results_path;
        let supports_toggle = self.supports_toggle;
        let entries = self.entries.clone();

        let task = thread_task::spawn_thread_local_task(format!("openperf-tvlp-{module_path}"), move |cancel| {
            run_series(cancel, rest, module_path, results_path, supports_toggle, entries, t0, shared)
        })
        .map_err(|err| err.to_string())?;

        *guard = Some(task);
        Ok(())
    }

    /// Stops the worker (best-effort): signals cancellation and joins its
    /// thread, logging rather than propagating a join failure (spec.md
    /// section 4.6: controller `stop` is itself best-effort per worker).
    pub fn stop(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.shutdown_and_join() {
                tracing::warn!(module_path = self.module_path, error = %err, "tvlp worker thread did not join cleanly");
            }
        }
    }
}

fn run_series<C>(
    cancel: CancellationToken,
    rest: RestClient,
    module_path: &'static str,
    results_path: &'static str,
    supports_toggle: bool,
    entries: Vec<ProfileEntry<C>>,
    t0: DateTime<Utc>,
    shared: SharedState,
) -> impl Future<Output = Result<(), ThreadTaskError>>
where
    C: Serialize,
{
    async move {
        if wait_for_countdown(&cancel, t0).await.is_err() {
            shared.set_state(WorkerState::Ready);
            return Ok(());
        }

        shared.set_state(WorkerState::Running);
        let mut total_offset = Duration::ZERO;
        let mut previous: Option<ActiveEntry> = None;

        for (index, entry) in entries.iter().enumerate() {
            let is_last = index + 1 == entries.len();

            let (active, snapshot) = match do_entry_start(&rest, module_path, entry, previous.as_ref()).await {
                Ok(pair) => pair,
                Err(message) => {
                    if let Some(prev) = previous {
                        cleanup(&rest, module_path, &prev.generator_id).await;
                    }
                    shared.fail(message);
                    return Ok(());
                }
            };
            shared.push_snapshot(snapshot);

            let entry_start = Instant::now();
            loop {
                let elapsed = entry_start.elapsed();
                if elapsed >= entry.length {
                    break;
                }
                let wait = (entry.length - elapsed).min(THRESHOLD);
                tokio::select! {
                    () = cancel.cancelled() => {
                        cleanup(&rest, module_path, &active.generator_id).await;
                        shared.set_state(WorkerState::Ready);
                        return Ok(());
                    }
                    () = tokio::time::sleep(wait) => {}
                }

                shared.set_offset(total_offset + entry_start.elapsed());
                match do_entry_stats(&rest, results_path, &active.result_id).await {
                    Ok(snapshot) => shared.replace_last_snapshot(snapshot),
                    Err(message) => {
                        cleanup(&rest, module_path, &active.generator_id).await;
                        shared.fail(message);
                        return Ok(());
                    }
                }
            }

            total_offset += entry.length;
            shared.set_offset(total_offset);

            if !supports_toggle || is_last {
                match do_entry_stop(&rest, module_path, results_path, &active).await {
                    Ok(snapshot) => shared.replace_last_snapshot(snapshot),
                    Err(message) => {
                        shared.fail(message);
                        return Ok(());
                    }
                }
                previous = None;
            } else {
                previous = Some(active);
            }
        }

        shared.set_state(WorkerState::Ready);
        Ok(())
    }
}

/// Step 1 of spec.md section 4.5.1: sleeps in `THRESHOLD` increments until
/// `now >= t0`. Returns `Err(())` if cancelled first.
async fn wait_for_countdown(cancel: &CancellationToken, t0: DateTime<Utc>) -> Result<(), ()> {
    loop {
        let now = Utc::now();
        if now >= t0 {
            return Ok(());
        }
        let remaining = (t0 - now).to_std().unwrap_or(Duration::ZERO);
        let wait = remaining.min(THRESHOLD);
        tokio::select! {
            () = cancel.cancelled() => return Err(()),
            () = tokio::time::sleep(wait) => {}
        }
    }
}

/// `do_entry_start` (spec.md section 4.5.1 step 3a): creates the entry's
/// generator, then either starts it fresh or toggles it in for `previous`,
/// preserving the active result vector across the swap.
async fn do_entry_start<C: Serialize>(
    rest: &RestClient,
    module_path: &str,
    entry: &ProfileEntry<C>,
    previous: Option<&ActiveEntry>,
) -> Result<(ActiveEntry, Value), String> {
    let config = serde_json::to_value(&entry.config).map_err(|err| err.to_string())?;
    let created = rest.create_generator(module_path, None, &config).await.map_err(|err| err.to_string())?;
    let generator_id = extract_string(&created, "id")?;

    let started = match previous {
        None => rest.start(module_path, &generator_id, None).await,
        Some(prev) => rest.toggle(module_path, &prev.generator_id, &generator_id, None).await,
    };
    let snapshot = match started {
        Ok(snapshot) => snapshot,
        Err(err) => {
            cleanup(rest, module_path, &generator_id).await;
            return Err(err.to_string());
        }
    };

    if let Some(prev) = previous {
        if let Err(err) = rest.delete_generator(module_path, &prev.generator_id).await {
            tracing::warn!(module_path, generator_id = %prev.generator_id, error = %err, "failed to delete toggled-out generator");
        }
    }

    let result_id = extract_string(&snapshot, "id")?;
    Ok((ActiveEntry { generator_id, result_id }, snapshot))
}

/// `do_entry_stats` (spec.md section 4.5.1 step 3b): pulls the current
/// snapshot for the active result.
async fn do_entry_stats(rest: &RestClient, results_path: &str, result_id: &str) -> Result<Value, String> {
    rest.get_result(results_path, result_id).await.map_err(|err| err.to_string())
}

/// `do_entry_stop` (spec.md section 4.5.1 step 3d): a final stats pull, then
/// stop and delete the generator.
async fn do_entry_stop(rest: &RestClient, module_path: &str, results_path: &str, active: &ActiveEntry) -> Result<Value, String> {
    let snapshot = do_entry_stats(rest, results_path, &active.result_id).await?;
    rest.stop(module_path, &active.generator_id).await.map_err(|err| err.to_string())?;
    rest.delete_generator(module_path, &active.generator_id).await.map_err(|err| err.to_string())?;
    Ok(snapshot)
}

/// Best-effort stop-then-delete used on the error and cancellation paths
/// (spec.md section 4.5.1 step 4: "stop & delete whatever is live").
async fn cleanup(rest: &RestClient, module_path: &str, generator_id: &str) {
    let _ = rest.stop(module_path, generator_id).await;
    if let Err(err) = rest.delete_generator(module_path, generator_id).await {
        tracing::warn!(module_path, generator_id, error = %err, "failed to delete generator during tvlp cleanup");
    }
}

fn extract_string(value: &Value, field: &str) -> Result<String, String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| format!("response missing string field \"{field}\": {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn worker_state_round_trips_through_its_u8_encoding() {
        for state in [WorkerState::Ready, WorkerState::Countdown, WorkerState::Running, WorkerState::Error] {
            assert_eq!(WorkerState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn extract_string_reports_the_missing_field() {
        let err = extract_string(&json!({"other": "x"}), "id").unwrap_err();
        assert!(err.contains("id"));
    }

    #[tokio::test]
    async fn countdown_returns_immediately_once_past_t0() {
        let cancel = CancellationToken::new();
        let t0 = Utc::now() - chrono::Duration::seconds(1);
        assert!(wait_for_countdown(&cancel, t0).await.is_ok());
    }

    #[tokio::test]
    async fn countdown_is_interrupted_by_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let t0 = Utc::now() + chrono::Duration::seconds(10);
        assert!(wait_for_countdown(&cancel, t0).await.is_err());
    }

    #[test]
    fn fresh_worker_starts_ready_with_an_empty_result_vector() {
        let worker: TvlpWorker<Value> = TvlpWorker::new("cpu", "cpu-results", false, vec![], RestClient::new("http://127.0.0.1:0"));
        assert_eq!(worker.state(), WorkerState::Ready);
        assert!(worker.results().is_empty());
        assert!(worker.error().is_none());
    }
}
