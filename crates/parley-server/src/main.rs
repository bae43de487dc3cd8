mod config;

use std::sync::Arc;

use tracing::{info, warn};

use parley_api::generator::{EchoGenerator, GeminiClient, ReplyGenerator};
use parley_api::oauth::{GoogleOAuth, GoogleOAuthConfig};
use parley_api::password::Passwords;
use parley_api::router::build_router;
use parley_api::state::AppStateInner;
use parley_api::token::TokenService;
use parley_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,parley_api=debug,parley_db=info,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path)?);
    let tokens = Arc::new(TokenService::new(config.jwt_secret.as_bytes(), config.token_ttl));

    let generator: Arc<dyn ReplyGenerator> = match &config.gemini_api_key {
        Some(key) => {
            info!("Replies generated by Gemini model {}", config.gemini_model);
            Arc::new(GeminiClient::new(key.clone(), config.gemini_model.clone())?)
        }
        None => {
            warn!("GEMINI_API_KEY not set; replies will echo the prompt");
            Arc::new(EchoGenerator)
        }
    };

    let google = match &config.google {
        Some(creds) => Some(GoogleOAuth::new(GoogleOAuthConfig {
            client_id: creds.client_id.clone(),
            client_secret: creds.client_secret.clone(),
            redirect_uri: config.oauth_redirect_uri(),
        })?),
        None => {
            warn!("GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET not set; federated login disabled");
            None
        }
    };

    let state = AppStateInner::assemble(
        db,
        tokens,
        Passwords::default(),
        generator,
        google,
        config.frontend_url.clone(),
    );
    let app = build_router(state)?;

    info!("Parley server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Could not install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
