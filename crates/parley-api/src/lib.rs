pub mod auth;
pub mod chat;
pub mod conversations;
pub mod credentials;
pub mod error;
pub mod generator;
pub mod guest;
pub mod middleware;
pub mod oauth;
pub mod password;
pub mod router;
pub mod state;
pub mod token;

use tracing::error;

use crate::error::AppError;

/// Run blocking work (password hashing, SQLite) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        AppError::Internal(anyhow::anyhow!("blocking task failed: {e}"))
    })?
}
