use std::sync::Arc;

use parley_db::Database;

use crate::conversations::ConversationStore;
use crate::credentials::CredentialAuthenticator;
use crate::generator::ReplyGenerator;
use crate::guest::GuestProvisioner;
use crate::oauth::{GoogleOAuth, OAuthReconciler};
use crate::password::Passwords;
use crate::token::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub tokens: Arc<TokenService>,
    pub credentials: CredentialAuthenticator,
    pub guests: GuestProvisioner,
    pub oauth: OAuthReconciler,
    /// `None` when no OAuth client is configured.
    pub google: Option<GoogleOAuth>,
    pub conversations: ConversationStore,
    pub frontend_url: String,
}

impl AppStateInner {
    /// Wire every component from its collaborators.
    pub fn assemble(
        db: Arc<Database>,
        tokens: Arc<TokenService>,
        passwords: Passwords,
        generator: Arc<dyn ReplyGenerator>,
        google: Option<GoogleOAuth>,
        frontend_url: impl Into<String>,
    ) -> AppState {
        Arc::new(Self {
            credentials: CredentialAuthenticator::new(db.clone(), tokens.clone(), passwords.clone()),
            guests: GuestProvisioner::new(db.clone(), tokens.clone(), passwords.clone()),
            oauth: OAuthReconciler::new(db.clone(), tokens.clone(), passwords),
            conversations: ConversationStore::new(db, generator),
            google,
            tokens,
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
        })
    }
}
