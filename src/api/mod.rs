use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::Config;
use crate::domain::Permission;
use crate::services::{AuthService, MailTransport};
use crate::state::SharedState;

pub mod auth;
mod error;
mod home;
mod posts;
mod tokens;
mod types;
mod users;
pub mod validation;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }
}

#[must_use]
pub fn create_app_state(shared: Arc<SharedState>) -> Arc<AppState> {
    Arc::new(AppState { shared })
}

pub async fn create_app_state_from_config(config: Config) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared))
}

/// Same as [`create_app_state_from_config`] with a custom mail transport.
pub async fn create_app_state_with_transport(
    config: Config,
    transport: Arc<dyn MailTransport>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::with_transport(config, transport).await?);
    Ok(create_app_state(shared))
}

pub fn router(state: Arc<AppState>) -> Router {
    let server = &state.config().server;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(server.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            server.session_inactivity_minutes,
        )));

    let cors_origins = &server.cors_allowed_origins;
    let cors_layer = if cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .route("/", get(home::index))
        .nest("/auth", create_auth_router())
        .nest("/api/v1", create_api_router())
        .layer(middleware::from_fn_with_state(state.clone(), auth::gateway))
        .layer(session_layer)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

fn create_auth_router() -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/unconfirmed", get(auth::unconfirmed));

    let signed_in = Router::new()
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/confirm", get(auth::resend_confirmation))
        .route("/confirm/{token}", get(auth::confirm))
        .route("/me", get(auth::get_current_user))
        .route("/password", put(auth::change_password))
        .route_layer(middleware::from_fn(auth::login_required));

    public.merge(signed_in)
}

fn create_api_router() -> Router<Arc<AppState>> {
    let signed_in = Router::new()
        .route("/token", get(tokens::issue_token))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route("/users/me", put(users::edit_profile))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/posts", get(users::get_user_posts))
        .route("/users/{id}/timeline", get(users::get_timeline))
        .route_layer(middleware::from_fn(auth::login_required));

    let writers = Router::new()
        .route("/posts", post(posts::create_post))
        .route("/posts/{id}", put(posts::edit_post))
        .route_layer(middleware::from_fn(
            auth::permission_required::<{ Permission::WRITE_ARTICLE.bits() }>,
        ));

    let followers = Router::new()
        .route(
            "/users/{id}/follow",
            post(users::follow).delete(users::unfollow),
        )
        .route_layer(middleware::from_fn(
            auth::permission_required::<{ Permission::FOLLOW.bits() }>,
        ));

    let admins = Router::new()
        .route("/users/{id}", put(users::edit_account))
        .route_layer(middleware::from_fn(
            auth::permission_required::<{ Permission::ADMINISTER.bits() }>,
        ));

    signed_in.merge(writers).merge(followers).merge(admins)
}
