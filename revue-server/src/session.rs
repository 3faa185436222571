use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::db::{format_timestamp, timestamp_column, uuid_column, Database};

/// Database-backed access tokens handed out by the auth endpoints
///
/// Tokens are UUID v4 strings stored in `sessions` with an expiry. Expired
/// tokens are rejected and removed on lookup; `cleanup_expired_sessions`
/// sweeps the rest.
#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(db: Database, ttl_days: i64) -> Self {
        Self {
            db,
            ttl: Duration::days(ttl_days),
        }
    }

    /// Create a new session for a user and return its access token
    pub fn create_session(&self, user_id: Uuid) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let expires_at = created_at + self.ttl;

        let conn = self.db.connection()?;
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                token,
                user_id.to_string(),
                format_timestamp(&created_at),
                format_timestamp(&expires_at),
            ],
        )
        .context("Failed to create session")?;

        tracing::info!("Created session for user {}", user_id);
        Ok(token)
    }

    /// Resolve a token to its user. `None` for unknown or expired tokens.
    pub fn validate_session(&self, token: &str) -> Result<Option<Uuid>> {
        let conn = self.db.connection()?;

        let row = conn
            .query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
                rusqlite::params![token],
                |row| Ok((uuid_column(row, 0)?, timestamp_column(row, 1)?)),
            )
            .optional()
            .context("Failed to look up session")?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        if Utc::now() > expires_at {
            conn.execute("DELETE FROM sessions WHERE token = ?1", rusqlite::params![token])
                .context("Failed to delete expired session")?;
            tracing::debug!("Rejected expired session for user {}", user_id);
            return Ok(None);
        }

        Ok(Some(user_id))
    }

    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let conn = self.db.connection()?;
        let rows_affected = conn
            .execute("DELETE FROM sessions WHERE token = ?1", rusqlite::params![token])
            .context("Failed to delete session")?;

        if rows_affected > 0 {
            tracing::info!("Deleted session");
        }
        Ok(rows_affected > 0)
    }

    /// Remove every session past its expiry, returning how many were removed
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.db.connection()?;
        let rows_affected = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                rusqlite::params![format_timestamp(&Utc::now())],
            )
            .context("Failed to cleanup expired sessions")?;

        if rows_affected > 0 {
            tracing::info!("Cleaned up {} expired sessions", rows_affected);
        }
        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::ProfileRepository;

    fn setup() -> (Database, SessionManager, Uuid) {
        let db = Database::in_memory().expect("Failed to create test database");
        db.initialize().expect("Failed to initialize database");
        let user_id = ProfileRepository::new(db.pool.clone())
            .create("testuser", None)
            .expect("Failed to create test user")
            .id;
        let manager = SessionManager::new(db.clone(), 30);
        (db, manager, user_id)
    }

    #[test]
    fn test_create_and_validate_session() {
        let (_db, manager, user_id) = setup();

        let token = manager.create_session(user_id).expect("Failed to create session");
        assert!(Uuid::parse_str(&token).is_ok(), "Token should be a valid UUID");
        assert_eq!(manager.validate_session(&token).unwrap(), Some(user_id));
    }

    #[test]
    fn test_validate_unknown_token() {
        let (_db, manager, _) = setup();
        assert_eq!(manager.validate_session("invalid-token").unwrap(), None);
    }

    #[test]
    fn test_delete_session() {
        let (_db, manager, user_id) = setup();
        let token = manager.create_session(user_id).unwrap();

        assert!(manager.delete_session(&token).unwrap());
        assert_eq!(manager.validate_session(&token).unwrap(), None);
        assert!(!manager.delete_session(&token).unwrap());
    }

    #[test]
    fn test_expired_sessions() {
        let (db, manager, user_id) = setup();
        let expired = manager.create_session(user_id).unwrap();
        let live = manager.create_session(user_id).unwrap();

        {
            let conn = db.connection().unwrap();
            conn.execute(
                "UPDATE sessions SET expires_at = ?1 WHERE token = ?2",
                rusqlite::params![format_timestamp(&(Utc::now() - Duration::days(1))), expired],
            )
            .unwrap();
        }

        assert_eq!(manager.cleanup_expired_sessions().unwrap(), 1);
        assert_eq!(manager.validate_session(&expired).unwrap(), None);
        assert_eq!(manager.validate_session(&live).unwrap(), Some(user_id));
    }

    #[test]
    fn test_session_requires_existing_profile() {
        let (_db, manager, _) = setup();
        assert!(manager.create_session(Uuid::new_v4()).is_err());
    }
}
