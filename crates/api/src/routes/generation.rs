//! Route definitions for the `/generate` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes mounted at `/generate`.
///
/// ```text
/// POST   /                -> submit_generation (202)
/// GET    /{id}/status     -> get_status
/// GET    /{id}/result     -> get_result
/// DELETE /{id}            -> cancel_generation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(generation::submit_generation))
        .route("/{id}", delete(generation::cancel_generation))
        .route("/{id}/status", get(generation::get_status))
        .route("/{id}/result", get(generation::get_result))
}
