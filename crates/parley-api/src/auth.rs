use axum::{
    Extension, Json,
    extract::{Query, State},
    response::Redirect,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use parley_types::api::{
    LoginRequest, OAuthCallbackQuery, ProfileResponse, RegisterRequest, RegisterResponse,
    TokenResponse,
};

use crate::blocking;
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<Json<RegisterResponse>, AppError> {
    let account = blocking(move || {
        state
            .credentials
            .register(&req.username, &req.email, &req.password)
    })
    .await?;

    Ok(Json(RegisterResponse {
        username: account.username,
        email: account.email,
        password_hash: account.password_hash,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = blocking(move || state.credentials.login(&req.email, &req.password)).await?;
    Ok(Json(TokenResponse { token }))
}

pub async fn guest(State(state): State<AppState>) -> Result<Json<TokenResponse>, AppError> {
    let token = blocking(move || state.guests.guest_login()).await?;
    Ok(Json(TokenResponse { token }))
}

/// Tokens are stateless, so this only acknowledges; the token stays valid until it expires.
pub async fn logout(Extension(user): Extension<AuthenticatedUser>) -> &'static str {
    info!("{} logged out", user.email);
    "Logged out successfully"
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ProfileResponse>, AppError> {
    let account = blocking(move || state.credentials.profile(&user.email)).await?;
    Ok(Json(ProfileResponse {
        id: account.id,
        username: account.username,
        email: account.email,
    }))
}

// -- Federated login --

/// GET /oauth2/authorization/google: send the browser to the consent screen.
pub async fn oauth_authorize(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::IdentityProvider("federated login is not configured".into()))?;

    let oauth_state = state.tokens.issue_oauth_state()?;
    let url = google.authorization_url(&oauth_state)?;
    Ok(Redirect::to(url.as_str()))
}

/// GET /oauth2/callback/google: finish the flow and hand the token to the frontend.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Redirect, AppError> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::IdentityProvider("federated login is not configured".into()))?;

    if let Some(error) = query.error {
        return Err(AppError::IdentityProvider(format!("provider returned '{error}'")));
    }
    let oauth_state = query
        .state
        .ok_or_else(|| AppError::IdentityProvider("missing state".into()))?;
    state.tokens.verify_oauth_state(&oauth_state)?;
    let code = query
        .code
        .ok_or_else(|| AppError::IdentityProvider("missing authorization code".into()))?;

    let identity = google.fetch_identity(&code).await?;

    let reconciler = state.oauth.clone();
    let token = blocking(move || {
        reconciler.reconcile(identity.email.as_deref(), identity.name.as_deref())
    })
    .await?;

    Ok(Redirect::to(&login_redirect(&state.frontend_url, &token)))
}

/// Where the browser lands after a federated login.
pub fn login_redirect(frontend_url: &str, token: &str) -> String {
    format!("{frontend_url}/login?token={token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_embeds_token() {
        assert_eq!(
            login_redirect("http://localhost:5173", "aaa.bbb.ccc"),
            "http://localhost:5173/login?token=aaa.bbb.ccc"
        );
    }
}
