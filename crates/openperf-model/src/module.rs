// SPDX-License-Identifier: Apache-2.0

//! The module-kind enumeration and each module's configuration/statistics pair
//! (spec.md section 3, SPEC_FULL.md section 3.7-3.8).
//!
//! The generator lifecycle (registry, module server, TVLP worker) is written once
//! and instantiated per [`ModuleKind`] by monomorphizing [`crate::registry::Registry`]
//! over one of these config/stats pairs.

use serde::{Deserialize, Serialize};

use crate::id::Id;

/// The seven generator module kinds named in spec.md section 6.2, plus `stack`
/// (a pass-through compatibility module in the original system).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    Cpu,
    Memory,
    Block,
    Network,
    PacketGenerator,
    PacketAnalyzer,
    PacketCapture,
    Stack,
}

impl ModuleKind {
    /// All module kinds, in the order the REST facade registers their routers.
    pub const ALL: [ModuleKind; 8] = [
        ModuleKind::Cpu,
        ModuleKind::Memory,
        ModuleKind::Block,
        ModuleKind::Network,
        ModuleKind::PacketGenerator,
        ModuleKind::PacketAnalyzer,
        ModuleKind::PacketCapture,
        ModuleKind::Stack,
    ];

    /// The path segment used for this module's REST surface and `inproc://` endpoint
    /// name (spec.md section 6.1, 6.2).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Cpu => "cpu",
            ModuleKind::Memory => "memory",
            ModuleKind::Block => "block",
            ModuleKind::Network => "network",
            ModuleKind::PacketGenerator => "packet-generator",
            ModuleKind::PacketAnalyzer => "packet-analyzer",
            ModuleKind::PacketCapture => "packet-capture",
            ModuleKind::Stack => "stack",
        }
    }

    /// Whether this module's registry supports the atomic `toggle` operation
    /// (spec.md section 4.2: "network, packet only").
    #[must_use]
    pub fn supports_toggle(&self) -> bool {
        matches!(self, ModuleKind::Network | ModuleKind::PacketGenerator)
    }

    /// Whether this module drives a real worker thread, as opposed to the
    /// pass-through modules whose load source is an out-of-scope data plane
    /// collaborator (spec.md section 1; SPEC_FULL.md section 3.7).
    #[must_use]
    pub fn has_worker(&self) -> bool {
        !matches!(
            self,
            ModuleKind::PacketAnalyzer | ModuleKind::PacketCapture | ModuleKind::Stack
        )
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CPU (spec.md section 3.4, 4.3)
// ---------------------------------------------------------------------------

/// One scalar/vector workload a CPU worker alternates between within a tick
/// (spec.md section 3.4: "targets: ordered sequence").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuGeneratorTarget {
    pub instruction_set: CpuInstructionSet,
    pub data_type: CpuDataType,
    /// Relative share of the tick's scheduled time this target receives.
    /// Invariant: the sum across a core's targets is > 0 (spec.md section 3.4).
    pub weight: u32,
}

/// The micro-benchmark kernel a target invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuInstructionSet {
    Scalar,
    Vector,
}

/// The operand width/kind a target's kernel operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuDataType {
    Int32,
    Int64,
    Float32,
    Float64,
}

/// Per-core configuration used by [`CpuGeneratorMethod::Cores`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuGeneratorCoreConfig {
    /// Pinned core id (spec.md section 3.4: "core: small integer").
    pub core: u16,
    pub targets: Vec<CpuGeneratorTarget>,
    /// Target share of wall time, in `(0, 1]`.
    pub utilization: f64,
}

/// `method: cores | system` (SPEC_FULL.md section 3.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum CpuGeneratorMethod {
    /// Each listed core runs its own open-loop worker (spec.md section 4.3.1).
    Cores { cores: Vec<CpuGeneratorCoreConfig> },
    /// A single PID-governed worker targets process-wide utilization
    /// (spec.md section 4.3.2).
    System {
        utilization: f64,
        #[serde(default = "default_system_targets")]
        targets: Vec<CpuGeneratorTarget>,
    },
}

fn default_system_targets() -> Vec<CpuGeneratorTarget> {
    vec![CpuGeneratorTarget {
        instruction_set: CpuInstructionSet::Scalar,
        data_type: CpuDataType::Int64,
        weight: 1,
    }]
}

/// Configuration for a CPU generator (spec.md section 3.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuGeneratorConfig {
    #[serde(flatten)]
    pub method: CpuGeneratorMethod,
}

impl CpuGeneratorConfig {
    /// Validates the configuration per spec.md section 3.4's invariants: weights
    /// sum to a positive number, and utilization lies in `(0, 1]`.
    pub fn validate(&self) -> Result<(), String> {
        match &self.method {
            CpuGeneratorMethod::Cores { cores } => {
                if cores.is_empty() {
                    return Err("cpu generator with method \"cores\" needs at least one core".into());
                }
                for core in cores {
                    validate_targets_and_utilization(&core.targets, core.utilization)?;
                }
                Ok(())
            }
            CpuGeneratorMethod::System { utilization, targets } => {
                validate_targets_and_utilization(targets, *utilization)
            }
        }
    }

    /// Scales `utilization` by a TVLP `load_scale` (spec.md section 3.5),
    /// clamped back into `(0, 1]` since utilization is a fraction, not a rate.
    #[must_use]
    pub fn scaled(&self, load_scale: f64) -> Self {
        let scale_utilization = |u: f64| (u * load_scale).clamp(f64::MIN_POSITIVE, 1.0);
        Self {
            method: match &self.method {
                CpuGeneratorMethod::Cores { cores } => CpuGeneratorMethod::Cores {
                    cores: cores
                        .iter()
                        .map(|c| CpuGeneratorCoreConfig {
                            core: c.core,
                            targets: c.targets.clone(),
                            utilization: scale_utilization(c.utilization),
                        })
                        .collect(),
                },
                CpuGeneratorMethod::System { utilization, targets } => CpuGeneratorMethod::System {
                    utilization: scale_utilization(*utilization),
                    targets: targets.clone(),
                },
            },
        }
    }
}

fn validate_targets_and_utilization(targets: &[CpuGeneratorTarget], utilization: f64) -> Result<(), String> {
    if !(0.0..=1.0).contains(&utilization) || utilization <= 0.0 {
        return Err(format!("utilization {utilization} must be in (0, 1]"));
    }
    let weight_sum: u64 = targets.iter().map(|t| u64::from(t.weight)).sum();
    if weight_sum == 0 {
        return Err("sum of target weights must be > 0".into());
    }
    Ok(())
}

/// Cumulative accumulators for one CPU worker, summed tick over tick for the
/// life of the result (spec.md section 3.4, 4.3.1 step 5). All durations are
/// in seconds; `utilization / available` is the overall observed utilization
/// since the generator started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuGeneratorStats {
    /// Total micro-benchmark operations performed.
    pub operations: u64,
    /// Cumulative wall-clock time the worker has been scheduled.
    pub available: f64,
    /// Cumulative time spent sleeping to hit the utilization target.
    pub sleep: f64,
    /// Cumulative thread-busy ("util") time measured across ticks.
    pub utilization: f64,
    /// Cumulative share of `available` the scheduler stole for other work.
    /// Always 0: neither this thread's own clock source nor `sysinfo`'s
    /// cross-platform process view exposes hypervisor steal time.
    pub steal: f64,
    /// Cumulative thread-busy time, from this worker's own clock source.
    /// Equal to `utilization`, since that source does not split user/system.
    pub user: f64,
    /// `cores` method: always 0, see `user`. `system` method: the process-wide
    /// CPU busy time `sysinfo` reports for the whole process (all threads,
    /// all cores), the process-wide feedback signal the PID controller
    /// regulates against (spec.md section 4.3.2).
    pub system: f64,
    /// Current value of the accumulated sleep-target residual (spec.md
    /// section 4.3.1 step 5) — not summed further, just the latest value.
    pub error: f64,
}

// ---------------------------------------------------------------------------
// Memory (SPEC_FULL.md section 3.8)
// ---------------------------------------------------------------------------

/// Configuration for a memory generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryGeneratorConfig {
    pub buffer_size: u64,
    pub reads_per_sec: u64,
    pub writes_per_sec: u64,
    pub read_size: u32,
    pub write_size: u32,
}

impl MemoryGeneratorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_size == 0 {
            return Err("buffer_size must be > 0".into());
        }
        if self.reads_per_sec == 0 && self.writes_per_sec == 0 {
            return Err("at least one of reads_per_sec/writes_per_sec must be > 0".into());
        }
        Ok(())
    }

    /// Scales the load-like fields by a TVLP `load_scale` (spec.md section 3.5).
    #[must_use]
    pub fn scaled(&self, load_scale: f64) -> Self {
        Self {
            buffer_size: self.buffer_size,
            reads_per_sec: scale_u64(self.reads_per_sec, load_scale),
            writes_per_sec: scale_u64(self.writes_per_sec, load_scale),
            read_size: self.read_size,
            write_size: self.write_size,
        }
    }
}

fn scale_u64(v: u64, scale: f64) -> u64 {
    ((v as f64) * scale).round().max(0.0) as u64
}

/// Latency distribution summary shared by memory/block/network stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min_ns: u64,
    pub max_ns: u64,
    pub total_ns: u64,
}

/// Statistics produced by a memory generator worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryGeneratorStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub reads: u64,
    pub writes: u64,
    pub read_latency: LatencyStats,
    pub write_latency: LatencyStats,
}

// ---------------------------------------------------------------------------
// Block (spec.md section 3.5: target_id for block/packet modules)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockPattern {
    Random,
    Sequential,
}

/// Configuration for a block generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockGeneratorConfig {
    /// External device the generator drives; named `resource_id` in spec.md
    /// section 3.5 for block modules.
    pub resource_id: String,
    pub queue_depth: u32,
    pub pattern: BlockPattern,
    pub read_size: u32,
    pub write_size: u32,
    pub reads_per_sec: u64,
    pub writes_per_sec: u64,
}

impl BlockGeneratorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.resource_id.is_empty() {
            return Err("resource_id must be non-empty".into());
        }
        if self.queue_depth == 0 {
            return Err("queue_depth must be > 0".into());
        }
        Ok(())
    }

    #[must_use]
    pub fn scaled(&self, load_scale: f64) -> Self {
        Self {
            resource_id: self.resource_id.clone(),
            queue_depth: self.queue_depth,
            pattern: self.pattern,
            read_size: self.read_size,
            write_size: self.write_size,
            reads_per_sec: scale_u64(self.reads_per_sec, load_scale),
            writes_per_sec: scale_u64(self.writes_per_sec, load_scale),
        }
    }
}

/// Statistics produced by a block generator worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockGeneratorStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub reads: u64,
    pub writes: u64,
    pub read_latency: LatencyStats,
    pub write_latency: LatencyStats,
}

// ---------------------------------------------------------------------------
// Network (spec.md section 4.2: toggle-capable)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProtocol {
    Tcp,
    Udp,
}

/// Configuration for a network generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkGeneratorConfig {
    pub target: String,
    pub protocol: NetworkProtocol,
    pub reads_per_sec: u64,
    pub writes_per_sec: u64,
    pub block_size: u32,
}

impl NetworkGeneratorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.target.is_empty() {
            return Err("target must be non-empty".into());
        }
        Ok(())
    }

    #[must_use]
    pub fn scaled(&self, load_scale: f64) -> Self {
        Self {
            target: self.target.clone(),
            protocol: self.protocol,
            reads_per_sec: scale_u64(self.reads_per_sec, load_scale),
            writes_per_sec: scale_u64(self.writes_per_sec, load_scale),
            block_size: self.block_size,
        }
    }
}

/// Statistics produced by a network generator worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkGeneratorStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub reads: u64,
    pub writes: u64,
    pub read_latency: LatencyStats,
    pub write_latency: LatencyStats,
}

// ---------------------------------------------------------------------------
// Packet generator (spec.md section 3.5: target_id for packet modules)
// ---------------------------------------------------------------------------

/// Configuration for a packet generator. The protocol definition stack is
/// summarized rather than modeled field-by-field: the packet I/O data plane
/// that would interpret it is an out-of-scope collaborator (spec.md section 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketGeneratorConfig {
    /// External port the generator drives.
    pub target_id: String,
    pub protocol_summary: String,
    pub packets_per_sec: u64,
    pub packet_size: u32,
}

impl PacketGeneratorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.target_id.is_empty() {
            return Err("target_id must be non-empty".into());
        }
        if self.packets_per_sec == 0 {
            return Err("packets_per_sec must be > 0".into());
        }
        Ok(())
    }

    #[must_use]
    pub fn scaled(&self, load_scale: f64) -> Self {
        Self {
            target_id: self.target_id.clone(),
            protocol_summary: self.protocol_summary.clone(),
            packets_per_sec: scale_u64(self.packets_per_sec, load_scale),
            packet_size: self.packet_size,
        }
    }
}

/// Statistics produced by a packet generator worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PacketGeneratorStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub errors: u64,
}

// ---------------------------------------------------------------------------
// Pass-through modules: packet-analyzer, packet-capture, stack
// ---------------------------------------------------------------------------

/// Shared configuration shape for the pass-through modules: each merely names
/// the external source it observes (SPEC_FULL.md section 3.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassthroughConfig {
    pub source_id: String,
}

impl PassthroughConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.source_id.is_empty() {
            return Err("source_id must be non-empty".into());
        }
        Ok(())
    }
}

/// Counters for a pass-through module (no real worker drives these; see
/// [`ModuleKind::has_worker`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PassthroughStats {
    pub items_seen: u64,
    pub bytes_seen: u64,
}

/// Back-reference carried by a generator id: used by [`crate::id::Id`] scoping
/// so the same literal id string can be reused across different module kinds
/// (spec.md section 3.1: "unique within a module, not across modules").
pub fn scope(kind: ModuleKind, id: &Id) -> String {
    format!("{kind}:{id}")
}
