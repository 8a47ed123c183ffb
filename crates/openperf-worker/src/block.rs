// SPDX-License-Identifier: Apache-2.0

//! The block generator's worker. Drives load against an external device named
//! by `resource_id`; the device I/O itself is out-of-scope (spec.md section
//! 1), so this synthesizes the same cumulative-stats shape [`memory`] does.

use openperf_model::id::Id;
use openperf_model::module::{BlockGeneratorConfig, BlockGeneratorStats, LatencyStats};
use openperf_model::worker::GeneratorWorker;

use crate::tick::{self, QUANTA};

/// Spawns a block generator's worker thread.
#[must_use]
pub fn spawn(id: &Id, config: &BlockGeneratorConfig) -> Box<dyn GeneratorWorker<BlockGeneratorStats>> {
    let config = config.clone();
    let name = format!("openperf-block-{id}");
    tick::spawn(name, move |prev| tick(&config, prev))
}

fn tick(config: &BlockGeneratorConfig, prev: &BlockGeneratorStats) -> BlockGeneratorStats {
    let secs = QUANTA.as_secs_f64();
    let reads = (config.reads_per_sec as f64 * secs).round() as u64;
    let writes = (config.writes_per_sec as f64 * secs).round() as u64;

    BlockGeneratorStats {
        bytes_read: prev.bytes_read + reads * u64::from(config.read_size),
        bytes_written: prev.bytes_written + writes * u64::from(config.write_size),
        reads: prev.reads + reads,
        writes: prev.writes + writes,
        read_latency: accumulate_latency(prev.read_latency, reads, config.queue_depth),
        write_latency: accumulate_latency(prev.write_latency, writes, config.queue_depth),
    }
}

/// Block latency is modeled as growing with queue depth, a cheap stand-in for
/// real queueing behavior against the out-of-scope device.
fn accumulate_latency(mut stats: LatencyStats, ops: u64, queue_depth: u32) -> LatencyStats {
    let assumed_latency_ns = 20_000u64 + 500 * u64::from(queue_depth);
    if ops == 0 {
        return stats;
    }
    stats.total_ns += assumed_latency_ns * ops;
    if stats.min_ns == 0 || assumed_latency_ns < stats.min_ns {
        stats.min_ns = assumed_latency_ns;
    }
    if assumed_latency_ns > stats.max_ns {
        stats.max_ns = assumed_latency_ns;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use openperf_model::module::BlockPattern;

    fn config() -> BlockGeneratorConfig {
        BlockGeneratorConfig {
            resource_id: "disk-0".into(),
            queue_depth: 4,
            pattern: BlockPattern::Random,
            read_size: 4096,
            write_size: 4096,
            reads_per_sec: 200,
            writes_per_sec: 100,
        }
    }

    #[test]
    fn tick_accumulates_monotonically() {
        let cfg = config();
        let first = tick(&cfg, &BlockGeneratorStats::default());
        let second = tick(&cfg, &first);
        assert!(second.reads > first.reads);
        assert!(second.bytes_written > first.bytes_written);
    }
}
