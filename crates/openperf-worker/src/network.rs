// SPDX-License-Identifier: Apache-2.0

//! The network generator's worker (spec.md section 4.2: toggle-capable). The
//! real socket I/O is out-of-scope (spec.md section 1); this synthesizes the
//! same cumulative-stats shape the other generators do.

use openperf_model::id::Id;
use openperf_model::module::{LatencyStats, NetworkGeneratorConfig, NetworkGeneratorStats};
use openperf_model::worker::GeneratorWorker;

use crate::tick::{self, QUANTA};

/// Spawns a network generator's worker thread.
#[must_use]
pub fn spawn(id: &Id, config: &NetworkGeneratorConfig) -> Box<dyn GeneratorWorker<NetworkGeneratorStats>> {
    let config = config.clone();
    let name = format!("openperf-network-{id}");
    tick::spawn(name, move |prev| tick(&config, prev))
}

fn tick(config: &NetworkGeneratorConfig, prev: &NetworkGeneratorStats) -> NetworkGeneratorStats {
    let secs = QUANTA.as_secs_f64();
    let reads = (config.reads_per_sec as f64 * secs).round() as u64;
    let writes = (config.writes_per_sec as f64 * secs).round() as u64;

    NetworkGeneratorStats {
        bytes_read: prev.bytes_read + reads * u64::from(config.block_size),
        bytes_written: prev.bytes_written + writes * u64::from(config.block_size),
        reads: prev.reads + reads,
        writes: prev.writes + writes,
        read_latency: accumulate_latency(prev.read_latency, reads),
        write_latency: accumulate_latency(prev.write_latency, writes),
    }
}

fn accumulate_latency(mut stats: LatencyStats, ops: u64) -> LatencyStats {
    const ASSUMED_LATENCY_NS: u64 = 80_000;
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
    use openperf_model::module::NetworkProtocol;

    fn config(reads_per_sec: u64) -> NetworkGeneratorConfig {
        NetworkGeneratorConfig {
            target: "10.0.0.1:5201".into(),
            protocol: NetworkProtocol::Tcp,
            reads_per_sec,
            writes_per_sec: 0,
            block_size: 1024,
        }
    }

    #[test]
    fn higher_configured_rate_accumulates_faster() {
        let slow = tick(&config(1000), &NetworkGeneratorStats::default());
        let fast = tick(&config(2000), &NetworkGeneratorStats::default());
        assert!(fast.bytes_read > slow.bytes_read);
    }
}
