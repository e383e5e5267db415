// Session persistence in a local SQLite database

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::types::{Identity, Session, TokenPair};

/// Key of the saved session in the `auth_kv` table
const SESSION_KEY: &str = "vps-panel:session";

/// On-disk shape of a saved session
#[derive(Serialize, Deserialize)]
struct SavedSession {
    tokens: TokenPair,
    identity: Option<Identity>,
    saved_at: DateTime<Utc>,
}

fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create session directory: {}", parent.display())
            })?;
        }
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS auth_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )
    .context("Failed to create auth_kv table")?;

    Ok(conn)
}

/// Load the saved session, if any
pub fn load_session(path: &Path) -> Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }

    let conn = open(path)?;
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM auth_kv WHERE key = ?",
            [SESSION_KEY],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to load session from SQLite")?;

    let Some(json) = value else {
        return Ok(None);
    };

    let saved: SavedSession =
        serde_json::from_str(&json).context("Failed to parse saved session")?;

    tracing::debug!(
        "Loaded session saved at {}",
        saved.saved_at.to_rfc3339()
    );

    Ok(Some(Session::authenticated(saved.tokens, saved.identity)))
}

/// Save the session, or delete the saved copy when it is no longer authenticated
pub fn save_session(path: &Path, session: &Session) -> Result<()> {
    let Some(tokens) = session.tokens() else {
        return delete_session(path);
    };

    let saved = SavedSession {
        tokens: tokens.clone(),
        identity: session.identity().cloned(),
        saved_at: Utc::now(),
    };
    let json = serde_json::to_string(&saved).context("Failed to serialize session")?;

    let conn = open(path)?;
    conn.execute(
        "INSERT INTO auth_kv (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SESSION_KEY, json],
    )
    .context("Failed to save session to SQLite")?;

    Ok(())
}

/// Remove the saved session
pub fn delete_session(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let conn = open(path)?;
    conn.execute("DELETE FROM auth_kv WHERE key = ?", [SESSION_KEY])
        .context("Failed to delete session from SQLite")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_db() -> PathBuf {
        std::env::temp_dir()
            .join(format!("vps-panel-test-{}", uuid::Uuid::new_v4()))
            .join("session.sqlite3")
    }

    fn identity() -> Identity {
        serde_json::from_value(serde_json::json!({
            "id": 4,
            "email": "support@example.com",
            "username": "support",
            "role": "support",
            "is_2fa_enabled": true
        }))
        .unwrap()
    }

    #[test]
    fn test_missing_database_has_no_session() {
        let path = temp_db();
        assert!(load_session(&path).unwrap().is_none());
        // Loading must not create the file
        assert!(!path.exists());
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_db();
        let session = Session::authenticated(
            TokenPair {
                access_token: "A1".to_string(),
                refresh_token: "R1".to_string(),
            },
            Some(identity()),
        );

        save_session(&path, &session).unwrap();
        let loaded = load_session(&path).unwrap().unwrap();
        assert_eq!(loaded, session);

        // Saving again overwrites the row
        let rotated = Session::authenticated(
            TokenPair {
                access_token: "A2".to_string(),
                refresh_token: "R2".to_string(),
            },
            Some(identity()),
        );
        save_session(&path, &rotated).unwrap();
        assert_eq!(load_session(&path).unwrap().unwrap().access_token(), Some("A2"));
    }

    #[test]
    fn test_saving_cleared_session_deletes_it() {
        let path = temp_db();
        let session = Session::authenticated(
            TokenPair {
                access_token: "A1".to_string(),
                refresh_token: "R1".to_string(),
            },
            None,
        );
        save_session(&path, &session).unwrap();

        save_session(&path, &Session::default()).unwrap();
        assert!(load_session(&path).unwrap().is_none());
    }
}
