// SPDX-License-Identifier: Apache-2.0

//! The packet generator's worker (spec.md section 4.2: toggle-capable). The
//! packet I/O data plane (NIC drivers, DPDK, lwIP) is out-of-scope (spec.md
//! section 1); this synthesizes the cumulative-stats shape that engine would
//! publish at the same `QUANTA` cadence.

use openperf_model::id::Id;
use openperf_model::module::{PacketGeneratorConfig, PacketGeneratorStats};
use openperf_model::worker::GeneratorWorker;

use crate::tick::{self, QUANTA};

/// Spawns a packet generator's worker thread.
#[must_use]
pub fn spawn(id: &Id, config: &PacketGeneratorConfig) -> Box<dyn GeneratorWorker<PacketGeneratorStats>> {
    let config = config.clone();
    let name = format!("openperf-packet-{id}");
    tick::spawn(name, move |prev| tick(&config, prev))
}

fn tick(config: &PacketGeneratorConfig, prev: &PacketGeneratorStats) -> PacketGeneratorStats {
    let secs = QUANTA.as_secs_f64();
    let sent = (config.packets_per_sec as f64 * secs).round() as u64;

    PacketGeneratorStats {
        packets_sent: prev.packets_sent + sent,
        bytes_sent: prev.bytes_sent + sent * u64::from(config.packet_size),
        errors: prev.errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PacketGeneratorConfig {
        PacketGeneratorConfig {
            target_id: "port0".into(),
            protocol_summary: "eth/ip/udp".into(),
            packets_per_sec: 10_000,
            packet_size: 128,
        }
    }

    #[test]
    fn tick_accumulates_packets_and_bytes() {
        let cfg = config();
        let first = tick(&cfg, &PacketGeneratorStats::default());
        assert!(first.packets_sent > 0);
        let second = tick(&cfg, &first);
        assert!(second.packets_sent > first.packets_sent);
        assert!(second.bytes_sent > first.bytes_sent);
    }
}
