// SPDX-License-Identifier: Apache-2.0

//! The internal request/reply bus used between the REST facade and each module server.
//!
//! Every module server owns an `inproc://openperf_<module>`-style endpoint: in this
//! implementation that is a dedicated [`bus::Bus`] pair, a dealer (client) side cloned
//! by every caller and a worker (server) side owned by the module's event loop. Requests
//! and replies are typed Rust values moved across a `tokio::sync::mpsc` channel rather than
//! literal socket frames — see [`wire`] for the companion byte-oriented codec that still
//! implements the length-delimited framing contract the original bus describes, for
//! conformance testing and documentation of the wire discriminants.

pub mod bus;
pub mod error;
pub mod thread_task;
pub mod wire;
