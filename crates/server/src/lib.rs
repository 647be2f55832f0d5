// SPDX-License-Identifier: MIT
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! HTTP API + SSE Hub (spec §4.F): the only surface the browser UI and the
//! agent child process speak to.

pub mod error;
pub mod routes;
pub mod sse;
pub mod state;

pub use error::ApiError;
pub use sse::{BoardEvent, SseHub};
pub use state::AppState;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full router: routes plus the ambient tracing/CORS layers.
pub fn build_app(state: AppState) -> axum::Router {
    routes::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive())
}
