//! Router assembly and shared state

use axum::routing::get;
use axum::Router;
use huddle_core::conference::MembershipResolver;
use std::sync::Arc;

use crate::routes;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<MembershipResolver>,
}

/// Build the application router over an injected resolver.
pub fn router(resolver: Arc<MembershipResolver>) -> Router {
    Router::new()
        .route("/", get(routes::home))
        .route("/:room_id", get(routes::room))
        .with_state(AppState { resolver })
}
