// SPDX-License-Identifier: Apache-2.0

//! The TVLP controller (spec.md section 4.6): owns one worker per non-empty
//! module in a profile, computes the profile's total duration up front, and
//! aggregates per-worker state into a single observable result.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use openperf_model::id::Id;
use openperf_rest_client::RestClient;

use crate::profile::Profile;
use crate::worker::{TvlpWorker, WorkerState};

/// The controller's own state, derived from its workers (spec.md section 4.6
/// `update()`: "any error wins over running wins over countdown wins over
/// ready").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Ready,
    Countdown,
    Running,
    Error,
}

/// One TVLP instance: an id, its scaled profile, and the workers it owns for
/// whichever modules the profile references.
pub struct TvlpController {
    id: Id,
    time_scale: f64,
    load_scale: f64,
    total_length: Duration,
    result_id: Mutex<Option<Id>>,
    cpu: Option<TvlpWorker<openperf_model::module::CpuGeneratorConfig>>,
    memory: Option<TvlpWorker<openperf_model::module::MemoryGeneratorConfig>>,
    block: Option<TvlpWorker<openperf_model::module::BlockGeneratorConfig>>,
    network: Option<TvlpWorker<openperf_model::module::NetworkGeneratorConfig>>,
    packet_generator: Option<TvlpWorker<openperf_model::module::PacketGeneratorConfig>>,
}

impl TvlpController {
    /// Builds a controller for `profile`, scaling it and computing
    /// `total_length` up front (spec.md section 4.6, items 1-3). Fails the
    /// profile's own validation (empty profile, non-positive entry lengths).
    pub fn new(id: Option<Id>, profile: &Profile, time_scale: f64, load_scale: f64, rest: RestClient) -> Result<Self, String> {
        profile.validate()?;
        let scaled = profile.scaled(time_scale, load_scale);
        let total_length = scaled.total_length();

        Ok(Self {
            id: id.unwrap_or_else(Id::random),
            time_scale,
            load_scale,
            total_length,
            result_id: Mutex::new(None),
            cpu: worker_for("cpu", "cpu-results", false, scaled.cpu, &rest),
            memory: worker_for("memory", "memory-results", false, scaled.memory, &rest),
            block: worker_for("block", "block-results", false, scaled.block, &rest),
            network: worker_for("network", "network-results", true, scaled.network, &rest),
            packet_generator: worker_for(
                "packet-generator",
                "packet-generator-results",
                true,
                scaled.packet_generator,
                &rest,
            ),
        })
    }

    #[must_use]
    pub fn id(&self) -> &Id {
        &self.id
    }

    #[must_use]
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    #[must_use]
    pub fn load_scale(&self) -> f64 {
        self.load_scale
    }

    #[must_use]
    pub fn total_length(&self) -> Duration {
        self.total_length
    }

    #[must_use]
    pub fn result_id(&self) -> Option<Id> {
        self.result_id.lock().clone()
    }

    /// Detaches the current result id so the result no longer appears in any
    /// listing (spec.md section 6.2: `DELETE /tvlp-results/:id`). Does not
    /// touch any worker; a subsequent `start` allocates a fresh result id.
    pub fn clear_result(&self) {
        *self.result_id.lock() = None;
    }

    /// `start(T0)` (spec.md section 4.6): idempotent if already running;
    /// otherwise starts every referenced worker, rolling back (stopping
    /// whatever already started) on the first failure.
    pub fn start(&self, t0: DateTime<Utc>) -> Result<Id, String> {
        if matches!(self.update(), ControllerState::Countdown | ControllerState::Running) {
            if let Some(result_id) = self.result_id() {
                return Ok(result_id);
            }
        }

        let mut started: Vec<&dyn ErasedWorker> = Vec::new();
        for worker in self.workers() {
            if let Err(message) = worker.start_erased(t0) {
                for already in &started {
                    already.stop_erased();
                }
                return Err(message);
            }
            started.push(worker);
        }

        let result_id = Id::random();
        *self.result_id.lock() = Some(result_id.clone());
        Ok(result_id)
    }

    /// `stop()` (spec.md section 4.6): stops each worker best-effort; does
    /// not delete the result.
    pub fn stop(&self) {
        for worker in self.workers() {
            worker.stop_erased();
        }
    }

    /// `update()` (spec.md section 4.6): recomputes aggregate state from the
    /// owned workers' individually-published state.
    #[must_use]
    pub fn update(&self) -> ControllerState {
        let workers = self.workers();
        if workers.is_empty() {
            return ControllerState::Ready;
        }
        let states: Vec<WorkerState> = workers.iter().map(|w| w.state_erased()).collect();
        if states.iter().any(|s| *s == WorkerState::Error) {
            ControllerState::Error
        } else if states.iter().any(|s| *s == WorkerState::Running) {
            ControllerState::Running
        } else if states.iter().any(|s| *s == WorkerState::Countdown) {
            ControllerState::Countdown
        } else {
            ControllerState::Ready
        }
    }

    /// `current_offset = max(worker.offset)` (spec.md section 4.6).
    #[must_use]
    pub fn current_offset(&self) -> Duration {
        self.workers().iter().map(|w| w.offset_erased()).max().unwrap_or_default()
    }

    /// The first worker error encountered, if the controller is in `error`
    /// state (spec.md section 4.6: "a worker's error is surfaced in the
    /// controller's aggregated error string").
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.workers().into_iter().find_map(|w| w.error_erased())
    }

    /// Per-module JSON result vectors, keyed by module path (spec.md section
    /// 3.6: "Result object: `{id, tvlp_id, per-module json_vector of
    /// snapshots}`").
    #[must_use]
    pub fn result_snapshots(&self) -> Value {
        let mut map = serde_json::Map::new();
        for worker in self.workers() {
            map.insert(worker.module_path_erased().to_owned(), Value::Array(worker.results_erased()));
        }
        Value::Object(map)
    }

    fn workers(&self) -> Vec<&dyn ErasedWorker> {
        let mut workers: Vec<&dyn ErasedWorker> = Vec::new();
        if let Some(w) = &self.cpu {
            workers.push(w);
        }
        if let Some(w) = &self.memory {
            workers.push(w);
        }
        if let Some(w) = &self.block {
            workers.push(w);
        }
        if let Some(w) = &self.network {
            workers.push(w);
        }
        if let Some(w) = &self.packet_generator {
            workers.push(w);
        }
        workers
    }
}

fn worker_for<C: Clone + Serialize + Send + Sync + 'static>(
    module_path: &'static str,
    results_path: &'static str,
    supports_toggle: bool,
    entries: Vec<crate::profile::ProfileEntry<C>>,
    rest: &RestClient,
) -> Option<TvlpWorker<C>> {
    if entries.is_empty() {
        return None;
    }
    Some(TvlpWorker::new(module_path, results_path, supports_toggle, entries, rest.clone()))
}

/// Object-safe view over `TvlpWorker<C>` so [`TvlpController`] can hold a
/// `Vec` of workers with five different config types uniformly.
trait ErasedWorker {
    fn start_erased(&self, t0: DateTime<Utc>) -> Result<(), String>;
    fn stop_erased(&self);
    fn state_erased(&self) -> WorkerState;
    fn offset_erased(&self) -> Duration;
    fn error_erased(&self) -> Option<String>;
    fn results_erased(&self) -> Vec<Value>;
    fn module_path_erased(&self) -> &'static str;
}

impl<C> ErasedWorker for TvlpWorker<C>
where
    C: Clone + Serialize + Send + Sync + 'static,
{
    fn start_erased(&self, t0: DateTime<Utc>) -> Result<(), String> {
        self.start(t0)
    }
    fn stop_erased(&self) {
        self.stop();
    }
    fn state_erased(&self) -> WorkerState {
        self.state()
    }
    fn offset_erased(&self) -> Duration {
        self.offset()
    }
    fn error_erased(&self) -> Option<String> {
        self.error()
    }
    fn results_erased(&self) -> Vec<Value> {
        self.results()
    }
    fn module_path_erased(&self) -> &'static str {
        self.module_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_profile_is_rejected() {
        let rest = RestClient::new("http://127.0.0.1:0");
        let err = TvlpController::new(None, &Profile::default(), 1.0, 1.0, rest).unwrap_err();
        assert!(err.contains("at least one module"));
    }

    #[test]
    fn controller_with_no_referenced_modules_never_constructed_is_ready() {
        // A controller that *does* construct (non-empty profile) starts ready
        // before `start()` is called.
        let rest = RestClient::new("http://127.0.0.1:0");
        let mut profile = Profile::default();
        profile.cpu.push(crate::profile::ProfileEntry {
            length: Duration::from_secs(1),
            config: openperf_model::module::CpuGeneratorConfig {
                method: openperf_model::module::CpuGeneratorMethod::System {
                    utilization: 0.5,
                    targets: vec![],
                },
            },
            target_id: None,
        });
        let controller = TvlpController::new(None, &profile, 1.0, 1.0, rest).unwrap();
        assert_eq!(controller.update(), ControllerState::Ready);
        assert!(controller.result_id().is_none());
    }
}
