use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use revue_types::UserProfile;

use crate::db::{format_timestamp, timestamp_column, uuid_column, DbError, DbPool, DbResult};

const PROFILE_COLUMNS: &str =
    "id, username, display_name, avatar_url, onboarding_completed, contacts_synced, created_at";

pub struct ProfileRepository {
    pool: DbPool,
}

impl ProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
        Ok(UserProfile {
            id: uuid_column(row, 0)?,
            username: row.get(1)?,
            display_name: row.get(2)?,
            avatar_url: row.get(3)?,
            onboarding_completed: row.get::<_, i32>(4)? == 1,
            contacts_synced: row.get::<_, i32>(5)? == 1,
            created_at: timestamp_column(row, 6)?,
        })
    }

    /// Create a profile for a new account
    pub fn create(&self, username: &str, display_name: Option<&str>) -> DbResult<UserProfile> {
        let conn = self.pool.get()?;

        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM profiles WHERE LOWER(username) = LOWER(?))",
            [username],
            |row| row.get(0),
        )?;
        if taken {
            return Err(DbError::Invalid(format!("username '{}' is taken", username)));
        }

        let profile = UserProfile {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: display_name.map(str::to_string),
            avatar_url: None,
            onboarding_completed: false,
            contacts_synced: false,
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO profiles (id, username, display_name, avatar_url, onboarding_completed, contacts_synced, created_at)
             VALUES (?, ?, ?, NULL, 0, 0, ?)",
            (
                profile.id.to_string(),
                &profile.username,
                &profile.display_name,
                format_timestamp(&profile.created_at),
            ),
        )?;

        Ok(profile)
    }

    /// Lookup usable inside an open transaction
    pub fn find_with(conn: &Connection, user_id: &Uuid) -> DbResult<Option<UserProfile>> {
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS),
                [user_id.to_string()],
                Self::map_row,
            )
            .optional()?;
        Ok(profile)
    }

    /// Get profile by username (case-insensitive)
    pub fn get_by_username(&self, username: &str) -> DbResult<Option<UserProfile>> {
        let conn = self.pool.get()?;
        let profile = conn
            .query_row(
                &format!(
                    "SELECT {} FROM profiles WHERE LOWER(username) = LOWER(?)",
                    PROFILE_COLUMNS
                ),
                [username],
                Self::map_row,
            )
            .optional()?;
        Ok(profile)
    }

    /// Store the fields collected by the onboarding flow and mark it complete
    pub fn complete_onboarding(
        &self,
        user_id: &Uuid,
        display_name: &str,
        avatar_url: Option<&str>,
        contacts_synced: bool,
    ) -> DbResult<UserProfile> {
        let conn = self.pool.get()?;
        let updated = conn.execute(
            "UPDATE profiles
             SET display_name = ?, avatar_url = ?, contacts_synced = ?, onboarding_completed = 1
             WHERE id = ?",
            (
                display_name,
                avatar_url,
                contacts_synced as i32,
                user_id.to_string(),
            ),
        )?;

        if updated == 0 {
            return Err(DbError::NotFound(format!("profile {}", user_id)));
        }

        Self::find_with(&conn, user_id)?
            .ok_or_else(|| DbError::NotFound(format!("profile {}", user_id)))
    }
}
