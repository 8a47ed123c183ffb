// SPDX-License-Identifier: Apache-2.0

//! The REST facade (spec.md section 6): generator endpoints built generically
//! over each module's config/stats pair, plus the TVLP endpoints, served over
//! one `axum::Router` (grounded on the teacher's `otap_df_admin` crate).

pub mod app;
pub mod error;
pub mod module_routes;
pub mod state;
pub mod tvlp_registry;
pub mod tvlp_routes;

pub use app::{app_state, router, serve, serve_with_ready};
pub use error::ApiError;
pub use state::AppState;
pub use tvlp_registry::TvlpRegistry;
