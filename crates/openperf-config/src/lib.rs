// SPDX-License-Identifier: Apache-2.0

//! Startup config-file bootstrap (spec.md section 6.4): an optional YAML
//! file naming resources to create at boot, translated to JSON and POSTed to
//! this process's own REST facade via [`openperf_rest_client::RestClient`].

pub mod bootstrap;
pub mod error;

pub use bootstrap::{apply, load_file, parse, Resource};
pub use error::BootstrapError;
