use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Placeholder signing secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];
const MIN_SECRET_LEN: usize = 32;
const DEFAULT_TOKEN_TTL_MS: i64 = 86_400_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PARLEY_JWT_SECRET is unset or still a placeholder")]
    MissingSecret,
    #[error("PARLEY_JWT_SECRET must be at least {MIN_SECRET_LEN} characters")]
    ShortSecret,
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub frontend_url: String,
    pub public_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub google: Option<GoogleCredentials>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("PARLEY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::MissingSecret);
        }
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::ShortSecret);
        }

        let ttl_ms = match var("PARLEY_JWT_EXPIRATION_MS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::Invalid { name: "PARLEY_JWT_EXPIRATION_MS", value: raw })?,
            None => DEFAULT_TOKEN_TTL_MS,
        };

        let host = var("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("PARLEY_PORT").unwrap_or_else(|| "8080".into());
        let addr_raw = format!("{host}:{port}");
        let addr = addr_raw
            .parse()
            .map_err(|_| ConfigError::Invalid { name: "PARLEY_HOST/PARLEY_PORT", value: addr_raw.clone() })?;

        let google = match (var("GOOGLE_CLIENT_ID"), var("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GoogleCredentials { client_id, client_secret }),
            _ => None,
        };

        Ok(Self {
            jwt_secret,
            token_ttl: chrono::Duration::milliseconds(ttl_ms),
            db_path: var("PARLEY_DB_PATH").unwrap_or_else(|| "parley.db".into()).into(),
            addr,
            frontend_url: var("PARLEY_FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".into()),
            public_url: var("PARLEY_PUBLIC_URL").unwrap_or_else(|| "http://localhost:8080".into()),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".into()),
            google,
        })
    }

    /// Callback URL registered with the OAuth provider.
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/oauth2/callback/google", self.public_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_with_only_a_secret() {
        let cfg = config(&[("PARLEY_JWT_SECRET", SECRET)]).unwrap();
        assert_eq!(cfg.token_ttl, chrono::Duration::hours(24));
        assert_eq!(cfg.addr.port(), 8080);
        assert!(cfg.google.is_none());
        assert!(cfg.gemini_api_key.is_none());
        assert_eq!(cfg.oauth_redirect_uri(), "http://localhost:8080/oauth2/callback/google");
    }

    #[test]
    fn secret_must_be_present_and_strong() {
        assert!(matches!(config(&[]), Err(ConfigError::MissingSecret)));
        assert!(matches!(
            config(&[("PARLEY_JWT_SECRET", "dev-secret-change-me")]),
            Err(ConfigError::MissingSecret)
        ));
        assert!(matches!(config(&[("PARLEY_JWT_SECRET", "short")]), Err(ConfigError::ShortSecret)));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        assert!(matches!(
            config(&[("PARLEY_JWT_SECRET", SECRET), ("PARLEY_JWT_EXPIRATION_MS", "soon")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[("PARLEY_JWT_SECRET", SECRET), ("PARLEY_PORT", "http")]),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn google_needs_both_id_and_secret() {
        let partial = config(&[("PARLEY_JWT_SECRET", SECRET), ("GOOGLE_CLIENT_ID", "id")]).unwrap();
        assert!(partial.google.is_none());

        let full = config(&[
            ("PARLEY_JWT_SECRET", SECRET),
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "shh"),
        ])
        .unwrap();
        assert_eq!(full.google.unwrap().client_id, "id");
    }
}
