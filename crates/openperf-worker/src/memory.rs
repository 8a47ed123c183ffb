// SPDX-License-Identifier: Apache-2.0

//! The memory generator's worker. The real engine (a core-affinity busy loop
//! that actually touches a ring buffer with a given access pattern) is an
//! out-of-scope collaborator (spec.md section 1); this produces the same
//! cumulative-stats shape at the same `QUANTA` cadence so the registry,
//! result, and TVLP machinery above it see a real module.

use openperf_model::id::Id;
use openperf_model::module::{LatencyStats, MemoryGeneratorConfig, MemoryGeneratorStats};
use openperf_model::worker::GeneratorWorker;

use crate::tick::{self, QUANTA};

/// Spawns a memory generator's worker thread.
#[must_use]
pub fn spawn(id: &Id, config: &MemoryGeneratorConfig) -> Box<dyn GeneratorWorker<MemoryGeneratorStats>> {
    let config = config.clone();
    let name = format!("openperf-memory-{id}");
    tick::spawn(name, move |prev| tick(&config, prev))
}

fn tick(config: &MemoryGeneratorConfig, prev: &MemoryGeneratorStats) -> MemoryGeneratorStats {
    let secs = QUANTA.as_secs_f64();
    let reads = (config.reads_per_sec as f64 * secs).round() as u64;
    let writes = (config.writes_per_sec as f64 * secs).round() as u64;

    MemoryGeneratorStats {
        bytes_read: prev.bytes_read + reads * u64::from(config.read_size),
        bytes_written: prev.bytes_written + writes * u64::from(config.write_size),
        reads: prev.reads + reads,
        writes: prev.writes + writes,
        read_latency: accumulate_latency(prev.read_latency, reads),
        write_latency: accumulate_latency(prev.write_latency, writes),
    }
}

/// A plausible fixed per-operation latency (the out-of-scope engine would
/// measure this for real); accumulated into the running min/max/total so the
/// result's latency distribution is non-degenerate across a run.
fn accumulate_latency(mut stats: LatencyStats, ops: u64) -> LatencyStats {
    const ASSUMED_LATENCY_NS: u64 = 1_200;
    if ops == 0 {
        return stats;
    }
    stats.total_ns += ASSUMED_LATENCY_NS * ops;
    if stats.min_ns == 0 || ASSUMED_LATENCY_NS < stats.min_ns {
        stats.min_ns = ASSUMED_LATENCY_NS;
    }
    if ASSUMED_LATENCY_NS > stats.max_ns {
        stats.max_ns = ASSUMED_LATENCY_NS;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MemoryGeneratorConfig {
        MemoryGeneratorConfig {
            buffer_size: 4096,
            reads_per_sec: 1000,
            writes_per_sec: 500,
            read_size: 64,
            write_size: 128,
        }
    }

    #[test]
    fn tick_accumulates_monotonically() {
        let cfg = config();
        let first = tick(&cfg, &MemoryGeneratorStats::default());
        assert!(first.reads > 0);
        assert!(first.writes > 0);

        let second = tick(&cfg, &first);
        assert!(second.bytes_read > first.bytes_read);
        assert!(second.read_latency.total_ns > first.read_latency.total_ns);
    }
}
