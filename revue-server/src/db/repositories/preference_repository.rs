use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use revue_types::{MediaPreference, MediaType};

use crate::db::{enum_column, format_timestamp, timestamp_column, uuid_column, DbPool, DbResult};

pub struct PreferenceRepository {
    pool: DbPool,
}

impl PreferenceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn list_with(conn: &Connection, user_id: &Uuid) -> DbResult<Vec<MediaPreference>> {
        let mut stmt = conn.prepare(
            "SELECT user_id, media_type, created_at
             FROM user_media_preferences
             WHERE user_id = ?
             ORDER BY created_at, rowid",
        )?;
        let preferences = stmt
            .query_map([user_id.to_string()], |row| {
                Ok(MediaPreference {
                    user_id: uuid_column(row, 0)?,
                    media_type: enum_column(row, 1, MediaType::parse)?,
                    created_at: timestamp_column(row, 2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(preferences)
    }

    pub fn list(&self, user_id: &Uuid) -> DbResult<Vec<MediaPreference>> {
        let conn = self.pool.get()?;
        Self::list_with(&conn, user_id)
    }

    /// Replace the user's preferences with `media_types`; duplicates are collapsed
    pub fn replace(&self, user_id: &Uuid, media_types: &[MediaType]) -> DbResult<Vec<MediaPreference>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "DELETE FROM user_media_preferences WHERE user_id = ?",
            [user_id.to_string()],
        )?;

        let now = format_timestamp(&Utc::now());
        for media_type in media_types {
            tx.execute(
                "INSERT OR IGNORE INTO user_media_preferences (user_id, media_type, created_at)
                 VALUES (?, ?, ?)",
                (user_id.to_string(), media_type.as_str(), &now),
            )?;
        }

        let preferences = Self::list_with(&tx, user_id)?;
        tx.commit()?;
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::ProfileRepository;
    use crate::db::{Database, DbError};

    fn setup() -> (PreferenceRepository, Uuid) {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        let user = ProfileRepository::new(db.pool.clone())
            .create("bookworm", None)
            .unwrap()
            .id;
        (PreferenceRepository::new(db.pool), user)
    }

    #[test]
    fn test_replace_keeps_order_and_collapses_duplicates() {
        let (repo, user) = setup();
        assert!(repo.list(&user).unwrap().is_empty());

        let stored = repo
            .replace(&user, &[MediaType::Book, MediaType::Podcast, MediaType::Book])
            .unwrap();
        let types: Vec<MediaType> = stored.iter().map(|p| p.media_type).collect();
        assert_eq!(types, vec![MediaType::Book, MediaType::Podcast]);

        let replaced = repo.replace(&user, &[MediaType::Game]).unwrap();
        assert_eq!(replaced.len(), 1);
        assert_eq!(repo.list(&user).unwrap()[0].media_type, MediaType::Game);
    }

    #[test]
    fn test_replace_for_missing_user() {
        let (repo, _) = setup();
        let result = repo.replace(&Uuid::new_v4(), &[MediaType::Movie]);
        assert!(matches!(result, Err(DbError::ForeignKey(_))));
    }
}
