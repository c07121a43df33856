use axum::Router;

use crate::state::SharedState;

/// Swagger UI and OpenAPI document.
pub mod docs;
/// Health check route.
pub mod health;
/// Prize pool routes.
pub mod prize;
/// Quiz routes.
pub mod question;
/// Session and voting routes.
pub mod session;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(session::router())
        .merge(prize::router())
        .merge(question::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
