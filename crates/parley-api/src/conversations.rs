//! Ownership-scoped conversation store.
//!
//! Every operation resolves the caller's email to an account first; reads and
//! writes on an existing conversation require the caller to be its owner.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use parley_db::Database;
use parley_types::models::{Account, Conversation, Message, Role};

use crate::blocking;
use crate::error::AppError;
use crate::generator::ReplyGenerator;

const TITLE_CHARS: usize = 30;
const TITLE_ELLIPSIS: &str = "...";
pub const MAX_CONTENT_CHARS: usize = 5000;
const MAX_TITLE_CHARS: usize = 255;

/// Outcome of posting a message.
#[derive(Debug, Clone)]
pub struct PostedReply {
    pub conversation_id: i64,
    pub reply: String,
}

#[derive(Clone)]
pub struct ConversationStore {
    db: Arc<Database>,
    generator: Arc<dyn ReplyGenerator>,
}

impl ConversationStore {
    pub fn new(db: Arc<Database>, generator: Arc<dyn ReplyGenerator>) -> Self {
        Self { db, generator }
    }

    /// The owner's conversations, newest first.
    pub fn list_conversations(&self, owner_email: &str) -> Result<Vec<Conversation>, AppError> {
        let owner = self.resolve(owner_email)?;
        Ok(self.db.list_conversations(owner.id)?)
    }

    /// Messages of an owned conversation, oldest first.
    pub fn list_messages(&self, conversation_id: i64, owner_email: &str) -> Result<Vec<Message>, AppError> {
        let owner = self.resolve(owner_email)?;
        self.owned(conversation_id, &owner)?;
        Ok(self.db.list_messages(conversation_id)?)
    }

    /// Store the user's message, ask the generator, store and return its reply.
    /// Without `conversation_id` a new conversation titled after the message is created.
    ///
    /// Storage work runs on the blocking pool; only the generator call is awaited
    /// on the runtime.
    pub async fn post_message(
        &self,
        content: &str,
        owner_email: &str,
        conversation_id: Option<i64>,
    ) -> Result<PostedReply, AppError> {
        validate_content(content)?;

        let store = self.clone();
        let (prompt, email) = (content.to_string(), owner_email.to_string());
        let conversation_id =
            blocking(move || store.record_prompt(&prompt, &email, conversation_id)).await?;

        let mut reply = self
            .generator
            .generate_reply(content)
            .await
            .map_err(AppError::Generation)?;

        if reply.chars().count() > MAX_CONTENT_CHARS {
            warn!(
                "Truncating {}-char reply in conversation {}",
                reply.chars().count(),
                conversation_id
            );
            reply = reply.chars().take(MAX_CONTENT_CHARS).collect();
        }

        let store = self.clone();
        let reply = blocking(move || {
            store.append(conversation_id, Role::Assistant, &reply)?;
            Ok(reply)
        })
        .await?;

        Ok(PostedReply {
            conversation_id,
            reply,
        })
    }

    /// Resolve or create the target conversation and append the user's message to it.
    fn record_prompt(
        &self,
        content: &str,
        owner_email: &str,
        conversation_id: Option<i64>,
    ) -> Result<i64, AppError> {
        let owner = self.resolve(owner_email)?;

        let conversation = match conversation_id {
            Some(id) => self.owned(id, &owner)?,
            None => {
                let convo = self
                    .db
                    .create_conversation(owner.id, &title_from(content), Utc::now())?;
                info!("Account {} started conversation {}", owner.id, convo.id);
                convo
            }
        };

        self.append(conversation.id, Role::User, content)?;
        Ok(conversation.id)
    }

    /// Delete an owned conversation together with all of its messages.
    pub fn delete_conversation(&self, conversation_id: i64, owner_email: &str) -> Result<(), AppError> {
        let owner = self.resolve(owner_email)?;
        self.owned(conversation_id, &owner)?;

        if !self.db.delete_conversation(conversation_id)? {
            return Err(AppError::NotFound("conversation"));
        }
        info!("Account {} deleted conversation {}", owner.id, conversation_id);
        Ok(())
    }

    /// Change the title of an owned conversation. Nothing else is touched.
    pub fn rename_conversation(
        &self,
        conversation_id: i64,
        new_title: &str,
        owner_email: &str,
    ) -> Result<(), AppError> {
        let title = new_title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
            return Err(AppError::Validation(format!(
                "title must be 1 to {MAX_TITLE_CHARS} characters"
            )));
        }

        let owner = self.resolve(owner_email)?;
        self.owned(conversation_id, &owner)?;

        if !self.db.rename_conversation(conversation_id, title)? {
            return Err(AppError::NotFound("conversation"));
        }
        Ok(())
    }

    fn resolve(&self, email: &str) -> Result<Account, AppError> {
        self.db
            .find_account_by_email(email)?
            .ok_or(AppError::AccountNotFound)
    }

    fn owned(&self, conversation_id: i64, owner: &Account) -> Result<Conversation, AppError> {
        let conversation = self
            .db
            .get_conversation(conversation_id)?
            .ok_or(AppError::NotFound("conversation"))?;

        if conversation.owner_id != owner.id {
            warn!(
                "Account {} denied access to conversation {} owned by {}",
                owner.id, conversation_id, conversation.owner_id
            );
            return Err(AppError::Forbidden("conversation"));
        }
        Ok(conversation)
    }

    fn append(&self, conversation_id: i64, role: Role, content: &str) -> Result<Message, AppError> {
        self.db
            .insert_message(conversation_id, role, content, Utc::now())?
            // Deleted while we were working on it.
            .ok_or(AppError::NotFound("conversation"))
    }
}

/// First 30 characters of the message, with an ellipsis when cut.
fn title_from(content: &str) -> String {
    if content.chars().count() > TITLE_CHARS {
        let head: String = content.chars().take(TITLE_CHARS).collect();
        format!("{head}{TITLE_ELLIPSIS}")
    } else {
        content.to_string()
    }
}

fn validate_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".into()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(format!(
            "message must be at most {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}
