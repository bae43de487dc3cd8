use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use parley_db::Database;
use parley_db::models::NewAccount;
use parley_types::models::{Account, GUEST_USERNAME};

use crate::error::AppError;
use crate::password::Passwords;
use crate::token::TokenService;

const MAX_USERNAME_CHARS: usize = 64;
const MIN_PASSWORD_CHARS: usize = 8;

/// Username/password registration and login.
#[derive(Clone)]
pub struct CredentialAuthenticator {
    db: Arc<Database>,
    tokens: Arc<TokenService>,
    passwords: Passwords,
}

impl CredentialAuthenticator {
    pub fn new(db: Arc<Database>, tokens: Arc<TokenService>, passwords: Passwords) -> Self {
        Self { db, tokens, passwords }
    }

    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<Account, AppError> {
        let username = username.trim();
        let email = email.trim();
        validate_registration(username, email, password)?;

        if self.db.find_account_by_email(email)?.is_some() {
            return Err(AppError::DuplicateEmail);
        }

        let password_hash = self.passwords.hash(password)?;
        let account = self
            .db
            .create_account(&NewAccount {
                username,
                email,
                password_hash: &password_hash,
                created_at: Utc::now(),
            })?
            // A concurrent registration won the unique index.
            .ok_or(AppError::DuplicateEmail)?;

        info!("Registered account {} ({})", account.id, account.email);
        Ok(account)
    }

    /// Verify the password and issue a bearer token bound to the account email.
    pub fn login(&self, email: &str, password: &str) -> Result<String, AppError> {
        let account = self
            .db
            .find_account_by_email(email.trim())?
            .ok_or(AppError::AccountNotFound)?;

        if !self.passwords.verify(password, &account.password_hash)? {
            warn!("Failed login for account {}", account.id);
            return Err(AppError::InvalidCredentials);
        }

        self.tokens.issue(&account.email)
    }

    /// Public profile of the account behind a token subject.
    pub fn profile(&self, email: &str) -> Result<Account, AppError> {
        self.db
            .find_account_by_email(email)?
            .ok_or(AppError::AccountNotFound)
    }
}

fn validate_registration(username: &str, email: &str, password: &str) -> Result<(), AppError> {
    let username_len = username.chars().count();
    if username_len == 0 || username_len > MAX_USERNAME_CHARS {
        return Err(AppError::Validation(format!(
            "username must be 1 to {MAX_USERNAME_CHARS} characters"
        )));
    }
    if username == GUEST_USERNAME {
        return Err(AppError::Validation("this username is reserved".into()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("a valid email is required".into()));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}
