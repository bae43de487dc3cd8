use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;
use crate::token::TokenService;

/// Routes reachable without a token.
const PUBLIC_PATHS: &[&str] = &["/api/auth/login", "/api/auth/register", "/api/auth/guest"];
/// Federated-login redirect and callback routes.
const PUBLIC_PREFIXES: &[&str] = &["/oauth2/"];

/// Identity resolved from the bearer token, attached to the request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub email: String,
}

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Decide who is calling. `Ok(None)` only for a public route without a token;
/// a token that is present is always validated.
pub fn authenticate(
    headers: &HeaderMap,
    path: &str,
    tokens: &TokenService,
) -> Result<Option<AuthenticatedUser>, AppError> {
    match headers.typed_get::<Authorization<Bearer>>() {
        Some(Authorization(bearer)) => {
            let email = tokens.validate(bearer.token())?;
            Ok(Some(AuthenticatedUser { email }))
        }
        None if is_public(path) => Ok(None),
        None => Err(AppError::Unauthenticated),
    }
}

/// Runs before every handler; rejected requests never reach handler code.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authenticate(req.headers(), req.uri().path(), &state.tokens).map_err(|e| {
        debug!("{} {} rejected: {}", req.method(), req.uri().path(), e);
        e
    })?;

    if let Some(user) = identity {
        req.extensions_mut().insert(user);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    fn tokens() -> TokenService {
        TokenService::new(b"test-secret-test-secret-test-sec", chrono::Duration::hours(1))
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn public_routes_pass_without_token() {
        let tokens = tokens();
        for path in ["/api/auth/login", "/api/auth/register", "/api/auth/guest", "/oauth2/callback/google"] {
            assert!(authenticate(&HeaderMap::new(), path, &tokens).unwrap().is_none(), "{path}");
        }
    }

    #[test]
    fn protected_route_without_token_is_unauthenticated() {
        let result = authenticate(&HeaderMap::new(), "/api/chat/history", &tokens());
        assert!(matches!(result, Err(AppError::Unauthenticated)));
        // Lookalike paths are not public.
        let result = authenticate(&HeaderMap::new(), "/api/auth/login/extra", &tokens());
        assert!(matches!(result, Err(AppError::Unauthenticated)));
    }

    #[test]
    fn valid_token_resolves_identity() {
        let tokens = tokens();
        let token = tokens.issue("a@x.com").unwrap();
        let user = authenticate(&bearer(&token), "/api/chat", &tokens).unwrap().unwrap();
        assert_eq!(user.email, "a@x.com");
    }

    #[test]
    fn bad_tokens_are_rejected_even_on_public_routes() {
        let tokens = tokens();
        assert!(matches!(
            authenticate(&bearer("garbage"), "/api/chat", &tokens),
            Err(AppError::TokenInvalid)
        ));
        assert!(matches!(
            authenticate(&bearer("garbage"), "/api/auth/login", &tokens),
            Err(AppError::TokenInvalid)
        ));

        let expired = tokens
            .issue_at("a@x.com", chrono::Utc::now() - chrono::Duration::hours(3))
            .unwrap();
        assert!(matches!(
            authenticate(&bearer(&expired), "/api/chat", &tokens),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn non_bearer_scheme_counts_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic YTpi"));
        assert!(matches!(
            authenticate(&headers, "/api/chat", &tokens()),
            Err(AppError::Unauthenticated)
        ));
    }
}
