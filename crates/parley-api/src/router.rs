use anyhow::Context;
use axum::{
    Router,
    http::{HeaderValue, Method, header::{AUTHORIZATION, CONTENT_TYPE}},
    middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, chat};

/// The whole HTTP surface. Every route sits behind the authentication gate,
/// which lets the public routes through without a token.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let origin = HeaderValue::from_str(&state.frontend_url)
        .with_context(|| format!("invalid frontend URL '{}'", state.frontend_url))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let router = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/guest", post(auth::guest))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/oauth2/authorization/google", get(auth::oauth_authorize))
        .route("/oauth2/callback/google", get(auth::oauth_callback))
        .route("/api/chat", post(chat::chat))
        .route("/api/chat/history", get(chat::history))
        .route("/api/chat/history/{id}", get(chat::conversation_messages))
        .route(
            "/api/chat/conversation/{id}",
            put(chat::rename_conversation).delete(chat::delete_conversation),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}
