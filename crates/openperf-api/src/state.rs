// SPDX-License-Identifier: Apache-2.0

//! Shared state every route handler reaches through axum's `State` extractor
//! (grounded on the teacher's `admin::AppState`, which plays the same role).

use std::sync::Arc;

use openperf_server::ModuleServers;

use crate::tvlp_registry::TvlpRegistry;

/// Shared, cheaply-`Clone`-able handle to the running module servers and the
/// set of live TVLP controllers.
#[derive(Clone)]
pub struct AppState {
    pub servers: Arc<ModuleServers>,
    pub tvlp: Arc<TvlpRegistry>,
}
