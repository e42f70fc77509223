pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::service::ServiceContext;
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>) -> Router {
    let app_state = AppState::new(service_context);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        // Notification surface (any authenticated user)
        .nest("/api/announcements", announcement_routes(app_state.clone()))

        // Administration surface
        .nest("/admin/announcements", admin_routes(app_state.clone()))

        // Add state to the router
        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn announcement_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::announcements::list))
        .route("/unread-count", get(handlers::announcements::unread_count))
        .route("/stream", get(handlers::announcements::stream))
        .route("/:id", get(handlers::announcements::get))
        .route("/:id/read", post(handlers::announcements::mark_read))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::admin::list).post(handlers::admin::create))
        .route("/:id", put(handlers::admin::update).delete(handlers::admin::delete))
        .route("/:id/toggle", post(handlers::admin::toggle))
        .route("/:id/readers", get(handlers::admin::readers))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}
