// SPDX-License-Identifier: Apache-2.0

//! Time-varying load profile orchestration (spec.md section 3.5, 3.6, 4.5,
//! 4.6): a [`controller::TvlpController`] owning one [`worker::TvlpWorker`]
//! per module referenced by a [`profile::Profile`], each worker driving its
//! module purely over the loopback REST surface via
//! [`openperf_rest_client::RestClient`].

pub mod controller;
pub mod profile;
pub mod worker;

pub use controller::{ControllerState, TvlpController};
pub use profile::{Profile, ProfileEntry};
pub use worker::{TvlpWorker, WorkerState};
