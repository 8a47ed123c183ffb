// SPDX-License-Identifier: Apache-2.0

//! Generator lifecycle data model: identifiers, the generator/result types of
//! spec.md section 3, the per-module [`registry::Registry`] of section 4.2, and the
//! typed request/reply bus contract that every module server speaks (section 6.1).

pub mod error;
pub mod generator;
pub mod id;
pub mod module;
pub mod registry;
pub mod request;
pub mod result;
pub mod worker;

pub use error::Error;
pub use id::Id;
