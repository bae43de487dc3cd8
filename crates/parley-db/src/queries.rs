use crate::models::{AccountRow, ConversationRow, MessageRow, NewAccount, format_timestamp};
use crate::Database;
use anyhow::Result;
use chrono::{DateTime, Utc};
use parley_types::models::{Account, Conversation, Message, Role};
use rusqlite::{Connection, ffi};
use tracing::debug;

impl Database {
    // -- Accounts --

    /// Insert an account. Returns `None` when a uniqueness constraint rejects
    /// the row (email already taken, or a second guest account).
    pub fn create_account(&self, new: &NewAccount<'_>) -> Result<Option<Account>> {
        self.with_conn_mut(|conn| {
            let created_at = format_timestamp(new.created_at);
            let inserted = conn.execute(
                "INSERT INTO accounts (username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (new.username, new.email, new.password_hash, &created_at),
            );

            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint(&e, ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                    debug!("Account insert for {} rejected by unique constraint", new.email);
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }

            query_account(conn, "id = ?1", conn.last_insert_rowid())
        })
    }

    pub fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.with_conn(|conn| query_account(conn, "email = ?1", email))
    }

    /// First account (lowest id) carrying this username.
    pub fn find_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.with_conn(|conn| query_account(conn, "username = ?1", username))
    }

    // -- Conversations --

    pub fn create_conversation(
        &self,
        owner_id: i64,
        title: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Conversation> {
        self.with_conn_mut(|conn| {
            let created = format_timestamp(created_at);
            conn.execute(
                "INSERT INTO conversations (title, owner_id, created_at) VALUES (?1, ?2, ?3)",
                (title, owner_id, &created),
            )?;

            Ok(Conversation {
                id: conn.last_insert_rowid(),
                title: title.to_string(),
                owner_id,
                created_at,
            })
        })
    }

    pub fn get_conversation(&self, id: i64) -> Result<Option<Conversation>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, title, owner_id, created_at FROM conversations WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(ConversationRow {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            owner_id: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;

            row.map(Conversation::try_from).transpose()
        })
    }

    /// Conversations owned by `owner_id`, newest first.
    pub fn list_conversations(&self, owner_id: i64) -> Result<Vec<Conversation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, owner_id, created_at
                 FROM conversations
                 WHERE owner_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;

            let rows = stmt
                .query_map([owner_id], |row| {
                    Ok(ConversationRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        owner_id: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(Conversation::try_from).collect()
        })
    }

    /// Returns false if the conversation no longer exists.
    pub fn rename_conversation(&self, id: i64, title: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE conversations SET title = ?1 WHERE id = ?2",
                (title, id),
            )?;
            Ok(changed > 0)
        })
    }

    /// Delete a conversation and every message in it, in one transaction.
    /// Returns false (and changes nothing) if the conversation does not exist.
    pub fn delete_conversation(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let messages = tx.execute("DELETE FROM messages WHERE conversation_id = ?1", [id])?;
            let conversations = tx.execute("DELETE FROM conversations WHERE id = ?1", [id])?;

            if conversations == 0 {
                // Dropping the transaction rolls it back.
                return Ok(false);
            }

            tx.commit()?;
            debug!("Deleted conversation {} with {} messages", id, messages);
            Ok(true)
        })
    }

    // -- Messages --

    /// Append a message. Returns `None` if the parent conversation is gone.
    pub fn insert_message(
        &self,
        conversation_id: i64,
        role: Role,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Option<Message>> {
        self.with_conn_mut(|conn| {
            let created = format_timestamp(created_at);
            let inserted = conn.execute(
                "INSERT INTO messages (conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (conversation_id, role.as_str(), content, &created),
            );

            match inserted {
                Ok(_) => Ok(Some(Message {
                    id: conn.last_insert_rowid(),
                    role,
                    content: content.to_string(),
                    conversation_id,
                    created_at,
                })),
                Err(e) if is_constraint(&e, ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Messages of a conversation, oldest first.
    pub fn list_messages(&self, conversation_id: i64) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;

            let rows = stmt
                .query_map([conversation_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        role: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(Message::try_from).collect()
        })
    }
}

fn query_account<P: rusqlite::ToSql>(
    conn: &Connection,
    predicate: &str,
    param: P,
) -> Result<Option<Account>> {
    let sql = format!(
        "SELECT id, username, email, password_hash, created_at
         FROM accounts WHERE {predicate} ORDER BY id LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([param], |row| {
            Ok(AccountRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password_hash: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    row.map(Account::try_from).transpose()
}

fn is_constraint(err: &rusqlite::Error, extended_code: i32) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == extended_code)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
