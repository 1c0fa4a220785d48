use std::path::Path;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::util::ServiceExt;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

use handlers::ws::{create_chat_room, SharedChatRoom};

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
    pub chat: SharedChatRoom,
}

impl AppState {
    pub fn new(db: db::Database, config: config::Config) -> Self {
        Self {
            db,
            config,
            chat: create_chat_room(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Admin routes (require an administrator session)
    let admin_routes = routes::admin::router().route_layer(axum_middleware::from_fn(
        middleware::auth::require_admin,
    ));

    // Routes that require any session
    let protected_routes = Router::new()
        .merge(routes::home::router())
        .nest("/admin", admin_routes)
        .nest("/user", routes::user::router())
        .nest("/api", routes::api::router())
        .route("/ws", get(handlers::ws::ws_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(routes::home::public_router())
        .merge(routes::auth::router())
        .merge(protected_routes)
        .fallback(serve_spa)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn index_html(static_dir: &str) -> Response {
    match tokio::fs::read(Path::new(static_dir).join("index.html")).await {
        Ok(contents) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html")],
            contents,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// Page routes that only exist client-side.
pub async fn serve_index(State(state): State<AppState>) -> Response {
    index_html(&state.config.static_dir).await
}

async fn serve_spa(State(state): State<AppState>, req: Request<Body>) -> Response {
    let static_dir = &state.config.static_dir;
    let path = req.uri().path().trim_start_matches('/');

    // Try to serve static file first
    if !path.is_empty() && Path::new(static_dir).join(path).is_file() {
        return match ServeDir::new(static_dir).oneshot(req).await {
            Ok(res) => res.into_response(),
            Err(never) => match never {},
        };
    }

    // For SPA routes, serve index.html
    index_html(static_dir).await
}
