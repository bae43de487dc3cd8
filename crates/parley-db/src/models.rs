//! Database row types. These map directly to SQLite rows and are converted to
//! the parley-types domain models on the way out.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parley_types::models::{Account, Conversation, Message, Role};

pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: i64,
    pub title: String,
    pub owner_id: i64,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

/// Input for a new account. The caller decides `created_at`.
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Fixed-width UTC form, so lexical order in SQLite is chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp '{raw}'"))?;
    Ok(ts.with_timezone(&Utc))
}

impl TryFrom<AccountRow> for Account {
    type Error = anyhow::Error;

    fn try_from(row: AccountRow) -> Result<Self> {
        Ok(Account {
            created_at: parse_timestamp(&row.created_at)?,
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
        })
    }
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = anyhow::Error;

    fn try_from(row: ConversationRow) -> Result<Self> {
        Ok(Conversation {
            created_at: parse_timestamp(&row.created_at)?,
            id: row.id,
            title: row.title,
            owner_id: row.owner_id,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e: String| anyhow::anyhow!("message {}: {}", row.id, e))?;

        Ok(Message {
            created_at: parse_timestamp(&row.created_at)?,
            id: row.id,
            role,
            content: row.content,
            conversation_id: row.conversation_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexically_in_time_order() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(format_timestamp(earlier) < format_timestamp(later));
        assert_eq!(parse_timestamp(&format_timestamp(later)).unwrap(), later);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let row = MessageRow {
            id: 1,
            conversation_id: 1,
            role: "system".into(),
            content: "hi".into(),
            created_at: format_timestamp(Utc::now()),
        };
        assert!(Message::try_from(row).is_err());
    }
}
