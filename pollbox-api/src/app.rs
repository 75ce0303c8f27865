//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use pollbox_api::{app::{build_router, AppState}, config::Config};
//! use pollbox_shared::store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let state = AppState::new(Arc::new(MemoryStore::new()), config);
//! let app = build_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use pollbox_shared::{auth::middleware::authenticate_bearer, store::PollStore};
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every handler; both fields are reference counted.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn PollStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Secret for signing and validating session tokens
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router with all routes and middleware
///
/// # Routes
///
/// ```text
/// GET    /health
/// POST   /api/register
/// POST   /api/login
/// POST   /api/refresh
/// GET    /api/polls?page=&limit=
/// GET    /api/polls/:id
/// GET    /api/user/:id/polls
///
/// Bearer token required:
/// GET    /api/me
/// POST   /api/polls
/// DELETE /api/polls/:id
/// GET    /api/polls/:id/vote
/// POST   /api/vote
/// GET    /api/check-bookmark?user_id=&poll_id=
/// POST   /api/bookmark
/// DELETE /api/bookmark
/// GET    /api/bookmarks/:user_id
/// ```
///
/// Public and authenticated routes share some paths; they are merged per
/// method, and the auth layer only wraps the authenticated methods.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/polls", get(routes::polls::list_polls))
        .route("/polls/:id", get(routes::polls::get_poll))
        .route("/user/:id/polls", get(routes::polls::list_user_polls));

    let authed_routes = Router::new()
        .route("/me", get(routes::auth::me))
        .route("/polls", post(routes::polls::create_poll))
        .route("/polls/:id", delete(routes::polls::delete_poll))
        .route("/polls/:id/vote", get(routes::votes::my_vote))
        .route("/vote", post(routes::votes::cast_vote))
        .route("/check-bookmark", get(routes::bookmarks::check_bookmark))
        .route(
            "/bookmark",
            post(routes::bookmarks::add_bookmark).delete(routes::bookmarks::remove_bookmark),
        )
        .route("/bookmarks/:user_id", get(routes::bookmarks::list_bookmarks))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", public_routes.merge(authed_routes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Validates the bearer token and injects an `AuthContext`
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate_bearer(req.headers(), state.jwt_secret())?;
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
