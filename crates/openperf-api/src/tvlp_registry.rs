// SPDX-License-Identifier: Apache-2.0

//! The set of live TVLP controllers (spec.md section 3.6, 4.6), reachable
//! through [`crate::tvlp_routes`]. `TvlpController` is a single concrete type
//! rather than a `(C, S)` pair, so this plays the same "own a map keyed by
//! id" role as [`openperf_model::registry::Registry`] without being generic
//! over it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use openperf_model::id::Id;
use openperf_model::module::{BlockGeneratorConfig, CpuGeneratorConfig, MemoryGeneratorConfig, NetworkGeneratorConfig, PacketGeneratorConfig};
use openperf_model::Error as ModelError;
use openperf_rest_client::RestClient;
use openperf_tvlp::{ControllerState, Profile, ProfileEntry, TvlpController};

/// One entry of a profile series, as it arrives over the wire (spec.md
/// section 3.5): duration in fractional seconds rather than
/// [`std::time::Duration`]'s struct form, matching the JSON the other module
/// endpoints already accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDto<C> {
    pub length: f64,
    pub config: C,
    #[serde(default)]
    pub target_id: Option<String>,
}

impl<C> EntryDto<C> {
    fn into_entry(self) -> ProfileEntry<C> {
        ProfileEntry {
            length: Duration::from_secs_f64(self.length.max(0.0)),
            config: self.config,
            target_id: self.target_id,
        }
    }
}

/// The wire form of a profile (spec.md section 3.5): a map from module kind
/// to series, every field defaulting to empty so a profile can reference
/// only the modules it needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDto {
    #[serde(default)]
    pub cpu: Vec<EntryDto<CpuGeneratorConfig>>,
    #[serde(default)]
    pub memory: Vec<EntryDto<MemoryGeneratorConfig>>,
    #[serde(default)]
    pub block: Vec<EntryDto<BlockGeneratorConfig>>,
    #[serde(default)]
    pub network: Vec<EntryDto<NetworkGeneratorConfig>>,
    #[serde(default)]
    pub packet_generator: Vec<EntryDto<PacketGeneratorConfig>>,
}

impl ProfileDto {
    fn into_profile(self) -> Profile {
        Profile {
            cpu: self.cpu.into_iter().map(EntryDto::into_entry).collect(),
            memory: self.memory.into_iter().map(EntryDto::into_entry).collect(),
            block: self.block.into_iter().map(EntryDto::into_entry).collect(),
            network: self.network.into_iter().map(EntryDto::into_entry).collect(),
            packet_generator: self.packet_generator.into_iter().map(EntryDto::into_entry).collect(),
        }
    }
}

/// `POST /tvlp` request body.
#[derive(Debug, Deserialize)]
pub struct CreateTvlpBody {
    #[serde(default)]
    pub id: Option<String>,
    pub profile: ProfileDto,
    #[serde(default = "default_scale")]
    pub time_scale: f64,
    #[serde(default = "default_scale")]
    pub load_scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

/// The JSON view of a TVLP configuration (spec.md section 3.6's attribute
/// table).
#[derive(Debug, Clone, Serialize)]
pub struct TvlpView {
    pub id: Id,
    pub profile: ProfileSummary,
    pub time_scale: f64,
    pub load_scale: f64,
    pub state: &'static str,
    pub total_length: f64,
    pub current_offset: f64,
    pub result_id: Option<Id>,
    pub error: Option<String>,
}

/// A coarse summary of which modules a profile touches; the full series is
/// echoed back nowhere since the controller already holds the scaled copy.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub modules: Vec<&'static str>,
}

fn state_str(state: ControllerState) -> &'static str {
    match state {
        ControllerState::Ready => "ready",
        ControllerState::Countdown => "countdown",
        ControllerState::Running => "running",
        ControllerState::Error => "error",
    }
}

fn view_of(controller: &TvlpController, modules: Vec<&'static str>) -> TvlpView {
    TvlpView {
        id: controller.id().clone(),
        profile: ProfileSummary { modules },
        time_scale: controller.time_scale(),
        load_scale: controller.load_scale(),
        state: state_str(controller.update()),
        total_length: controller.total_length().as_secs_f64(),
        current_offset: controller.current_offset().as_secs_f64(),
        result_id: controller.result_id(),
        error: controller.error(),
    }
}

/// The JSON view of a TVLP result object (spec.md section 3.6: "`{id,
/// tvlp_id, per-module json_vector of snapshots}`").
#[derive(Debug, Clone, Serialize)]
pub struct TvlpResultView {
    pub id: Id,
    pub tvlp_id: Id,
    pub values: Value,
}

struct Entry {
    controller: Arc<TvlpController>,
    modules: Vec<&'static str>,
}

/// The set of live TVLP controllers, keyed by id. Single-mutex-guarded: TVLP
/// creation/deletion is rare next to the per-request work each controller
/// does internally via its own workers, so one lock around the map is not a
/// contended path. `parking_lot::Mutex` keeps a panic inside one handler from
/// poisoning the map for every other in-flight request.
pub struct TvlpRegistry {
    rest: RestClient,
    entries: Mutex<BTreeMap<Id, Entry>>,
}

impl TvlpRegistry {
    #[must_use]
    pub fn new(rest: RestClient) -> Self {
        Self { rest, entries: Mutex::new(BTreeMap::new()) }
    }

    pub fn list(&self) -> Vec<TvlpView> {
        let entries = self.entries.lock();
        entries.values().map(|e| view_of(&e.controller, e.modules.clone())).collect()
    }

    pub fn get(&self, id: &Id) -> Result<TvlpView, ModelError> {
        let entries = self.entries.lock();
        let entry = entries.get(id).ok_or_else(|| ModelError::not_found("tvlp", id.to_string()))?;
        Ok(view_of(&entry.controller, entry.modules.clone()))
    }

    /// Builds and registers a new controller from a profile DTO (spec.md
    /// section 4.6, items 1-4). Returns `Exists` if the caller supplied an id
    /// already in use.
    pub fn create(&self, body: CreateTvlpBody) -> Result<TvlpView, ModelError> {
        let id = body.id.as_deref().map(|s| Id::parse(s).ok_or_else(|| ModelError::invalid_argument(format!("\"{s}\" is not a valid id")))).transpose()?;

        let mut entries = self.entries.lock();
        if let Some(id) = &id {
            if entries.contains_key(id) {
                return Err(ModelError::exists("tvlp", id.to_string()));
            }
        }

        let modules = referenced_modules(&body.profile);
        let profile = body.profile.into_profile();
        let controller = TvlpController::new(id, &profile, body.time_scale, body.load_scale, self.rest.clone())
            .map_err(ModelError::invalid_argument)?;
        let controller = Arc::new(controller);
        let view = view_of(&controller, modules.clone());
        entries.insert(controller.id().clone(), Entry { controller, modules });
        Ok(view)
    }

    /// Starts the named controller at `t0` (spec.md section 6.2: `POST
    /// /tvlp/:id/start?time=<rfc3339>`).
    pub fn start(&self, id: &Id, t0: DateTime<Utc>) -> Result<TvlpView, ModelError> {
        let entries = self.entries.lock();
        let entry = entries.get(id).ok_or_else(|| ModelError::not_found("tvlp", id.to_string()))?;
        entry.controller.start(t0).map_err(ModelError::invalid_argument)?;
        Ok(view_of(&entry.controller, entry.modules.clone()))
    }

    pub fn stop(&self, id: &Id) -> Result<(), ModelError> {
        let entries = self.entries.lock();
        let entry = entries.get(id).ok_or_else(|| ModelError::not_found("tvlp", id.to_string()))?;
        entry.controller.stop();
        Ok(())
    }

    /// Deletes the named controller. Refuses to delete one that is still
    /// running or counting down, mirroring every other module's "busy"
    /// erase rule (spec.md section 4.2).
    pub fn erase(&self, id: &Id) -> Result<(), ModelError> {
        let mut entries = self.entries.lock();
        let entry = entries.get(id).ok_or_else(|| ModelError::not_found("tvlp", id.to_string()))?;
        if matches!(entry.controller.update(), ControllerState::Countdown | ControllerState::Running) {
            return Err(ModelError::busy("tvlp", id.to_string()));
        }
        entries.remove(id);
        Ok(())
    }

    pub fn result_list(&self) -> Vec<TvlpResultView> {
        let entries = self.entries.lock();
        entries
            .values()
            .filter_map(|e| e.controller.result_id().map(|result_id| TvlpResultView {
                id: result_id,
                tvlp_id: e.controller.id().clone(),
                values: e.controller.result_snapshots(),
            }))
            .collect()
    }

    pub fn result_get(&self, result_id: &Id) -> Result<TvlpResultView, ModelError> {
        let entries = self.entries.lock();
        entries
            .values()
            .find(|e| e.controller.result_id().as_ref() == Some(result_id))
            .map(|e| TvlpResultView { id: result_id.clone(), tvlp_id: e.controller.id().clone(), values: e.controller.result_snapshots() })
            .ok_or_else(|| ModelError::not_found("tvlp result", result_id.to_string()))
    }

    /// Clears the association between a controller and its result id so the
    /// result no longer appears in [`Self::result_list`]/[`Self::result_get`].
    /// Refuses while the controller is still running (spec.md section 3.3:
    /// results are "only deletable once inactive").
    pub fn result_erase(&self, result_id: &Id) -> Result<(), ModelError> {
        let entries = self.entries.lock();
        let entry = entries
            .values()
            .find(|e| e.controller.result_id().as_ref() == Some(result_id))
            .ok_or_else(|| ModelError::not_found("tvlp result", result_id.to_string()))?;
        if matches!(entry.controller.update(), ControllerState::Countdown | ControllerState::Running) {
            return Err(ModelError::busy("tvlp result", result_id.to_string()));
        }
        entry.controller.clear_result();
        Ok(())
    }
}

fn referenced_modules(profile: &ProfileDto) -> Vec<&'static str> {
    let mut modules = Vec::new();
    if !profile.cpu.is_empty() {
        modules.push("cpu");
    }
    if !profile.memory.is_empty() {
        modules.push("memory");
    }
    if !profile.block.is_empty() {
        modules.push("block");
    }
    if !profile.network.is_empty() {
        modules.push("network");
    }
    if !profile.packet_generator.is_empty() {
        modules.push("packet-generator");
    }
    modules
}
