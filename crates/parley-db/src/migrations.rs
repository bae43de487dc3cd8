use anyhow::Result;
use parley_types::models::GUEST_USERNAME;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(&format!(
            "
            BEGIN;

            CREATE TABLE accounts (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            -- At most one guest account, whatever the number of concurrent first logins.
            CREATE UNIQUE INDEX idx_accounts_single_guest
                ON accounts(username) WHERE username = '{GUEST_USERNAME}';

            CREATE INDEX idx_accounts_username ON accounts(username);

            CREATE TABLE conversations (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL,
                owner_id    INTEGER NOT NULL REFERENCES accounts(id),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_conversations_owner
                ON conversations(owner_id, created_at);

            CREATE TABLE messages (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id     INTEGER NOT NULL REFERENCES conversations(id),
                role                TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content             TEXT NOT NULL,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            "
        ))?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
