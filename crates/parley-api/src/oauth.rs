//! Federated login: the Google authorization-code flow and reconciliation of
//! the external identity onto a local account.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_db::Database;
use parley_db::models::NewAccount;

use crate::error::AppError;
use crate::password::Passwords;
use crate::token::TokenService;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const FALLBACK_DISPLAY_NAME: &str = "Google User";
const MAX_RECONCILE_ATTEMPTS: usize = 3;

/// Identity asserted by the external provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FederatedIdentity {
    pub email: Option<String>,
    pub name: Option<String>,
    pub email_verified: Option<bool>,
}

/// Maps federated identities onto local accounts, creating them on first sight.
#[derive(Clone)]
pub struct OAuthReconciler {
    db: Arc<Database>,
    tokens: Arc<TokenService>,
    passwords: Passwords,
}

impl OAuthReconciler {
    pub fn new(db: Arc<Database>, tokens: Arc<TokenService>, passwords: Passwords) -> Self {
        Self { db, tokens, passwords }
    }

    /// Returns a bearer token for the account owning `email`.
    pub fn reconcile(&self, email: Option<&str>, display_name: Option<&str>) -> Result<String, AppError> {
        let email = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::IdentityProvider("provider did not supply an email".into()))?;

        for _ in 0..MAX_RECONCILE_ATTEMPTS {
            if let Some(account) = self.db.find_account_by_email(email)? {
                return self.tokens.issue(&account.email);
            }

            let username = federated_username(display_name);
            let password_hash = self.passwords.unusable_hash()?;
            let created = self.db.create_account(&NewAccount {
                username: &username,
                email,
                password_hash: &password_hash,
                created_at: Utc::now(),
            })?;

            match created {
                Some(account) => {
                    info!("Created federated account {} ({})", account.id, account.email);
                    return self.tokens.issue(&account.email);
                }
                // Another callback for the same email got there first.
                None => debug!("Federated account insert for {} lost a race", email),
            }
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "federated account for {email} could not be reconciled"
        )))
    }
}

/// `{display name}_{4 hex chars}`; the suffix keeps same-named users apart.
fn federated_username(display_name: Option<&str>) -> String {
    let base = display_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_DISPLAY_NAME);
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", base, &suffix[..4])
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Absolute URL of our callback route.
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
}

/// Minimal Google OAuth2 client: builds the consent URL and turns a callback
/// `code` into the user's identity.
pub struct GoogleOAuth {
    config: GoogleOAuthConfig,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleOAuthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn authorization_url(&self, state: &str) -> Result<Url, AppError> {
        Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Internal(e.into()))
    }

    pub async fn fetch_identity(&self, code: &str) -> Result<FederatedIdentity, AppError> {
        let exchange = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| provider_error("code exchange failed", e))?
            .json::<TokenExchangeResponse>()
            .await
            .map_err(|e| provider_error("malformed token response", e))?;

        let identity = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&exchange.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| provider_error("userinfo request failed", e))?
            .json::<FederatedIdentity>()
            .await
            .map_err(|e| provider_error("malformed userinfo response", e))?;

        if identity.email_verified == Some(false) {
            return Err(AppError::IdentityProvider("provider email is not verified".into()));
        }

        Ok(identity)
    }
}

fn provider_error(context: &str, err: reqwest::Error) -> AppError {
    warn!("Google OAuth {}: {}", context, err);
    AppError::IdentityProvider(context.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password;

    fn reconciler() -> (OAuthReconciler, Arc<Database>, Arc<TokenService>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let tokens = Arc::new(TokenService::new(b"test-secret-test-secret-test-sec", chrono::Duration::hours(1)));
        (
            OAuthReconciler::new(db.clone(), tokens.clone(), password::cheap()),
            db,
            tokens,
        )
    }

    #[test]
    fn first_login_creates_account_with_suffixed_username() {
        let (oauth, db, tokens) = reconciler();
        let token = oauth.reconcile(Some("ada@gmail.com"), Some("Ada Lovelace")).unwrap();
        assert_eq!(tokens.validate(&token).unwrap(), "ada@gmail.com");

        let account = db.find_account_by_email("ada@gmail.com").unwrap().unwrap();
        let (base, suffix) = account.username.rsplit_once('_').unwrap();
        assert_eq!(base, "Ada Lovelace");
        assert_eq!(suffix.len(), 4);
    }

    #[test]
    fn existing_account_is_reused() {
        let (oauth, db, _) = reconciler();
        oauth.reconcile(Some("ada@gmail.com"), Some("Ada")).unwrap();
        let first = db.find_account_by_email("ada@gmail.com").unwrap().unwrap();

        oauth.reconcile(Some("ada@gmail.com"), Some("Someone Else")).unwrap();
        let second = db.find_account_by_email("ada@gmail.com").unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.username, second.username);
    }

    #[test]
    fn missing_display_name_falls_back() {
        let (oauth, db, _) = reconciler();
        oauth.reconcile(Some("anon@gmail.com"), Some("  ")).unwrap();
        let account = db.find_account_by_email("anon@gmail.com").unwrap().unwrap();
        assert!(account.username.starts_with("Google User_"));
    }

    #[test]
    fn missing_email_is_provider_error() {
        let (oauth, _, _) = reconciler();
        assert!(matches!(oauth.reconcile(None, Some("Ada")), Err(AppError::IdentityProvider(_))));
        assert!(matches!(oauth.reconcile(Some(""), None), Err(AppError::IdentityProvider(_))));
    }

    #[test]
    fn authorization_url_carries_client_and_state() {
        let google = GoogleOAuth::new(GoogleOAuthConfig {
            client_id: "client-123".into(),
            client_secret: "shh".into(),
            redirect_uri: "http://localhost:8080/oauth2/callback/google".into(),
        })
        .unwrap();

        let url = google.authorization_url("state-xyz").unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["state"], "state-xyz");
        assert_eq!(params["redirect_uri"], "http://localhost:8080/oauth2/callback/google");
        assert!(!url.as_str().contains("shh"));
    }
}
