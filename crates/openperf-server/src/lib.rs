// SPDX-License-Identifier: Apache-2.0

//! Module servers (spec.md section 4.4): the event-loop dispatcher that owns
//! each module's [`openperf_model::registry::Registry`] and workers, reachable
//! over an [`openperf_channel::bus`].
//!
//! [`modules::ModuleServers`] wires up one server per module kind named in
//! spec.md section 6.2; [`server`] is the generic engine every one of them
//! instantiates.

pub mod modules;
pub mod server;

pub use modules::ModuleServers;
pub use server::ModuleServerHandle;
