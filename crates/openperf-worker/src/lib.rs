// SPDX-License-Identifier: Apache-2.0

//! Per-module worker tasks (spec.md section 2, item 3; SPEC_FULL.md section 4.7).
//!
//! [`cpu`] is the one worker spec.md describes in full algorithmic detail: a
//! thread pinned to a core running the measured micro-benchmark tick of
//! section 4.3, optionally PID-governed (section 4.3.2). [`memory`], [`block`],
//! [`network`] and [`packet`] synthesize plausible statistics at the same
//! `QUANTA` tick cadence, since their true engines (a core-affinity busy-loop
//! touching a buffer, DPDK NIC I/O, the pcap writer) are out-of-scope
//! collaborators named in spec.md section 1 — the generator lifecycle around
//! them is identical, only the tick body differs.

pub mod block;
pub mod cpu;
pub mod memory;
pub mod network;
pub mod packet;
pub mod passthrough;

mod tick;
