use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use parley_db::Database;
use parley_db::models::NewAccount;
use parley_types::models::GUEST_USERNAME;

use crate::error::AppError;
use crate::password::Passwords;
use crate::token::TokenService;

/// Lookup/insert rounds before giving up. A lost insert race is followed by a
/// lookup that finds the winner, so two rounds normally suffice.
const MAX_PROVISION_ATTEMPTS: usize = 3;

/// Find-or-create for the singleton guest account.
///
/// The partial unique index on the guest username is what keeps the account
/// unique when first logins race; the loser's insert is rejected and it
/// re-reads the winner's row.
#[derive(Clone)]
pub struct GuestProvisioner {
    db: Arc<Database>,
    tokens: Arc<TokenService>,
    passwords: Passwords,
}

impl GuestProvisioner {
    pub fn new(db: Arc<Database>, tokens: Arc<TokenService>, passwords: Passwords) -> Self {
        Self { db, tokens, passwords }
    }

    pub fn guest_login(&self) -> Result<String, AppError> {
        for attempt in 1..=MAX_PROVISION_ATTEMPTS {
            if let Some(guest) = self.db.find_account_by_username(GUEST_USERNAME)? {
                return self.tokens.issue(&guest.email);
            }

            let email = guest_email();
            let password_hash = self.passwords.unusable_hash()?;
            let created = self.db.create_account(&NewAccount {
                username: GUEST_USERNAME,
                email: &email,
                password_hash: &password_hash,
                created_at: Utc::now(),
            })?;

            match created {
                Some(guest) => {
                    info!("Provisioned guest account {} ({})", guest.id, guest.email);
                    return self.tokens.issue(&guest.email);
                }
                None => debug!("Guest insert lost a race (attempt {}), re-reading", attempt),
            }
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "guest account could not be provisioned after {MAX_PROVISION_ATTEMPTS} attempts"
        )))
    }
}

fn guest_email() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("guest_{}@temp.com", &id[..8])
}
