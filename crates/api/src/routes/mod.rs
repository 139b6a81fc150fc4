pub mod generation;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generate                submit a generation request (POST, 202)
/// /generate/{id}/status    lightweight polling view (GET)
/// /generate/{id}/result    full result view (GET)
/// /generate/{id}           cancel a queued request (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/generate", generation::router())
}
