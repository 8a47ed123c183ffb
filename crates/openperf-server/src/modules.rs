// SPDX-License-Identifier: Apache-2.0

//! Wires each of the eight module kinds (spec.md section 3.7) to a concrete
//! [`crate::server::ModuleServerHandle`]: the module's config/stats pair, its
//! validation rule, and the [`openperf_worker`] constructor for its worker.

use std::sync::Arc;

use openperf_channel::error::ThreadTaskError;
use openperf_model::module::{
    BlockGeneratorConfig, BlockGeneratorStats, CpuGeneratorConfig, CpuGeneratorStats, MemoryGeneratorConfig,
    MemoryGeneratorStats, NetworkGeneratorConfig, NetworkGeneratorStats, PacketGeneratorConfig, PacketGeneratorStats,
    PassthroughConfig, PassthroughStats,
};

use crate::server::{self, ModuleServerHandle};

/// One running [`crate::server::ModuleServerHandle`] per module kind named in
/// spec.md section 6.2's REST surface enumeration.
pub struct ModuleServers {
    pub cpu: ModuleServerHandle<CpuGeneratorConfig, CpuGeneratorStats>,
    pub memory: ModuleServerHandle<MemoryGeneratorConfig, MemoryGeneratorStats>,
    pub block: ModuleServerHandle<BlockGeneratorConfig, BlockGeneratorStats>,
    pub network: ModuleServerHandle<NetworkGeneratorConfig, NetworkGeneratorStats>,
    pub packet_generator: ModuleServerHandle<PacketGeneratorConfig, PacketGeneratorStats>,
    pub packet_analyzer: ModuleServerHandle<PassthroughConfig, PassthroughStats>,
    pub packet_capture: ModuleServerHandle<PassthroughConfig, PassthroughStats>,
    pub stack: ModuleServerHandle<PassthroughConfig, PassthroughStats>,
}

impl ModuleServers {
    /// Spawns all eight module servers, each on its own dedicated thread.
    #[must_use]
    pub fn spawn() -> Self {
        Self {
            cpu: server::spawn(
                "cpu generator",
                |cfg: &CpuGeneratorConfig| cfg.validate(),
                Arc::new(|id, cfg| openperf_worker::cpu::spawn(id, cfg)),
            ),
            memory: server::spawn(
                "memory generator",
                |cfg: &MemoryGeneratorConfig| cfg.validate(),
                Arc::new(|id, cfg| openperf_worker::memory::spawn(id, cfg)),
            ),
            block: server::spawn(
                "block generator",
                |cfg: &BlockGeneratorConfig| cfg.validate(),
                Arc::new(|id, cfg| openperf_worker::block::spawn(id, cfg)),
            ),
            network: server::spawn(
                "network generator",
                |cfg: &NetworkGeneratorConfig| cfg.validate(),
                Arc::new(|id, cfg| openperf_worker::network::spawn(id, cfg)),
            ),
            packet_generator: server::spawn(
                "packet generator",
                |cfg: &PacketGeneratorConfig| cfg.validate(),
                Arc::new(|id, cfg| openperf_worker::packet::spawn(id, cfg)),
            ),
            packet_analyzer: server::spawn(
                "packet analyzer",
                |cfg: &PassthroughConfig| cfg.validate(),
                Arc::new(|id, cfg| openperf_worker::passthrough::spawn(id, cfg)),
            ),
            packet_capture: server::spawn(
                "packet capture",
                |cfg: &PassthroughConfig| cfg.validate(),
                Arc::new(|id, cfg| openperf_worker::passthrough::spawn(id, cfg)),
            ),
            stack: server::spawn(
                "stack",
                |cfg: &PassthroughConfig| cfg.validate(),
                Arc::new(|id, cfg| openperf_worker::passthrough::spawn(id, cfg)),
            ),
        }
    }

    /// Shuts every module server down and joins its thread, collecting the
    /// first error encountered (each server is still asked to shut down even
    /// if an earlier one failed to join cleanly).
    pub fn shutdown_and_join(self) -> Result<(), ThreadTaskError> {
        let results = [
            self.cpu.shutdown_and_join(),
            self.memory.shutdown_and_join(),
            self.block.shutdown_and_join(),
            self.network.shutdown_and_join(),
            self.packet_generator.shutdown_and_join(),
            self.packet_analyzer.shutdown_and_join(),
            self.packet_capture.shutdown_and_join(),
            self.stack.shutdown_and_join(),
        ];
        results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
    }
}
