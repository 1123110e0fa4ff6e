pub mod attendance;
pub mod auth;
pub mod broadcast;
pub mod extract;
pub mod hafalan;
pub mod halaqoh;
pub mod live;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use middleware::require_auth;
use rest::ApiDoc;
use state::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Builds the full application router: public auth routes, session-protected
/// routes, and the Swagger UI. CORS is layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/me", get(users::me_handler))
        .route("/users/{id}/role", put(users::set_role_handler))
        .route("/attendance/windows", post(attendance::create_window_handler))
        .route(
            "/attendance/windows/{id}/events",
            get(attendance::list_window_events_handler),
        )
        .route("/attendance/scan", post(attendance::scan_handler))
        .route(
            "/hafalan",
            get(hafalan::list_handler).post(hafalan::submit_handler),
        )
        .route("/hafalan/progress", get(hafalan::progress_handler))
        .route("/hafalan/{id}/review", post(hafalan::review_handler))
        .route(
            "/halaqoh",
            get(halaqoh::list_halaqoh_handler).post(halaqoh::create_halaqoh_handler),
        )
        .route(
            "/halaqoh/{id}/members",
            get(halaqoh::list_members_handler).post(halaqoh::add_member_handler),
        )
        .route(
            "/halaqoh/{id}/members/{santri_id}",
            delete(halaqoh::remove_member_handler),
        )
        .route("/ws/live", get(live::live_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
