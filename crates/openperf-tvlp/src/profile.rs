// SPDX-License-Identifier: Apache-2.0

//! The TVLP profile data model (spec.md section 3.5, 3.6): a map from module
//! kind to a series of timed entries, plus the global scale factors applied
//! uniformly across every module's series.

use std::time::Duration;

use openperf_model::module::{
    BlockGeneratorConfig, CpuGeneratorConfig, MemoryGeneratorConfig, NetworkGeneratorConfig, PacketGeneratorConfig,
};

/// One step of a module's series (spec.md section 3.5): a duration, a
/// module-specific configuration, and — for block/packet modules — the
/// external device or port the generator should drive.
#[derive(Debug, Clone)]
pub struct ProfileEntry<C> {
    /// Unscaled duration; [`Profile::scaled`] applies `time_scale`.
    pub length: Duration,
    pub config: C,
    /// `resource_id` (block) or `target_id` (packet) in spec.md section 3.5;
    /// unused by modules that name the device inline in `config`.
    pub target_id: Option<String>,
}

/// A profile is a map from module kind to series of entries (spec.md section
/// 3.5). Only five module kinds carry a TVLP worker (spec.md section 4.6):
/// the three pass-through modules have no load-bearing configuration to
/// schedule.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub cpu: Vec<ProfileEntry<CpuGeneratorConfig>>,
    pub memory: Vec<ProfileEntry<MemoryGeneratorConfig>>,
    pub block: Vec<ProfileEntry<BlockGeneratorConfig>>,
    pub network: Vec<ProfileEntry<NetworkGeneratorConfig>>,
    pub packet_generator: Vec<ProfileEntry<PacketGeneratorConfig>>,
}

impl Profile {
    /// Validates the invariant common to every module's series: each entry's
    /// `length` must be greater than zero (spec.md section 3.5), and the
    /// profile as a whole must not be empty (spec.md section 4.6, item 3).
    pub fn validate(&self) -> Result<(), String> {
        if self.cpu.is_empty()
            && self.memory.is_empty()
            && self.block.is_empty()
            && self.network.is_empty()
            && self.packet_generator.is_empty()
        {
            return Err("tvlp profile must reference at least one module".into());
        }
        let zero_length = |entries: &[ProfileEntry<_>]| entries.iter().any(|e| e.length.is_zero());
        if zero_length(&self.cpu)
            || zero_length(&self.memory)
            || zero_length(&self.block)
            || zero_length(&self.network)
            || zero_length(&self.packet_generator)
        {
            return Err("every tvlp entry's length must be > 0".into());
        }
        Ok(())
    }

    /// Scales every entry's `length` by `time_scale` and, per module, every
    /// config's load-like fields by `load_scale` (spec.md section 3.5).
    #[must_use]
    pub fn scaled(&self, time_scale: f64, load_scale: f64) -> Self {
        Self {
            cpu: scale_series(&self.cpu, time_scale, load_scale),
            memory: scale_series(&self.memory, time_scale, load_scale),
            block: scale_series(&self.block, time_scale, load_scale),
            network: scale_series(&self.network, time_scale, load_scale),
            packet_generator: scale_series(&self.packet_generator, time_scale, load_scale),
        }
    }

    /// The total duration of the scaled series, per module (spec.md section
    /// 3.6: `total_length` is the **max** across modules).
    #[must_use]
    pub fn total_length(&self) -> Duration {
        [
            series_length(&self.cpu),
            series_length(&self.memory),
            series_length(&self.block),
            series_length(&self.network),
            series_length(&self.packet_generator),
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
    }
}

fn series_length<C>(entries: &[ProfileEntry<C>]) -> Duration {
    entries.iter().map(|e| e.length).sum()
}

fn scale_series<C: Scalable>(entries: &[ProfileEntry<C>], time_scale: f64, load_scale: f64) -> Vec<ProfileEntry<C>> {
    entries
        .iter()
        .map(|entry| ProfileEntry {
            length: entry.length.mul_f64(time_scale),
            config: entry.config.scaled(load_scale),
            target_id: entry.target_id.clone(),
        })
        .collect()
}

/// Every module config carries its own rule for which fields are "load-like"
/// (spec.md section 3.5); this trait lets [`scale_series`] stay generic.
trait Scalable {
    fn scaled(&self, load_scale: f64) -> Self;
}

impl Scalable for CpuGeneratorConfig {
    fn scaled(&self, load_scale: f64) -> Self {
        CpuGeneratorConfig::scaled(self, load_scale)
    }
}
impl Scalable for MemoryGeneratorConfig {
    fn scaled(&self, load_scale: f64) -> Self {
        MemoryGeneratorConfig::scaled(self, load_scale)
    }
}
impl Scalable for BlockGeneratorConfig {
    fn scaled(&self, load_scale: f64) -> Self {
        BlockGeneratorConfig::scaled(self, load_scale)
    }
}
impl Scalable for NetworkGeneratorConfig {
    fn scaled(&self, load_scale: f64) -> Self {
        NetworkGeneratorConfig::scaled(self, load_scale)
    }
}
impl Scalable for PacketGeneratorConfig {
    fn scaled(&self, load_scale: f64) -> Self {
        PacketGeneratorConfig::scaled(self, load_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openperf_model::module::{CpuGeneratorMethod, CpuGeneratorTarget, CpuInstructionSet, CpuDataType};

    fn cpu_entry(utilization: f64) -> ProfileEntry<CpuGeneratorConfig> {
        ProfileEntry {
            length: Duration::from_secs(2),
            config: CpuGeneratorConfig {
                method: CpuGeneratorMethod::System {
                    utilization,
                    targets: vec![CpuGeneratorTarget {
                        instruction_set: CpuInstructionSet::Scalar,
                        data_type: CpuDataType::Int64,
                        weight: 1,
                    }],
                },
            },
            target_id: None,
        }
    }

    #[test]
    fn total_length_is_the_max_across_modules() {
        let mut profile = Profile::default();
        profile.cpu = vec![cpu_entry(0.5), cpu_entry(0.5)];
        profile.memory.push(ProfileEntry {
            length: Duration::from_secs(1),
            config: MemoryGeneratorConfig {
                buffer_size: 1024,
                reads_per_sec: 10,
                writes_per_sec: 0,
                read_size: 64,
                write_size: 64,
            },
            target_id: None,
        });
        assert_eq!(profile.total_length(), Duration::from_secs(4));
    }

    #[test]
    fn time_scale_stretches_entry_lengths() {
        let mut profile = Profile::default();
        profile.cpu = vec![cpu_entry(0.5)];
        let scaled = profile.scaled(2.0, 1.0);
        assert_eq!(scaled.cpu[0].length, Duration::from_secs(4));
    }

    #[test]
    fn empty_profile_fails_validation() {
        assert!(Profile::default().validate().is_err());
    }

    #[test]
    fn zero_length_entry_fails_validation() {
        let mut profile = Profile::default();
        profile.cpu = vec![ProfileEntry { length: Duration::ZERO, ..cpu_entry(0.5) }];
        assert!(profile.validate().is_err());
    }
}
