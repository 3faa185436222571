use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use revue_types::{Notification, NotificationKind};

use crate::db::{
    enum_column, format_timestamp, optional_uuid_column, timestamp_column, uuid_column, DbPool,
    DbResult,
};

const NOTIFICATION_SELECT: &str =
    "SELECT n.id, n.recipient_id, n.actor_id, a.username, n.kind, n.post_id, n.comment_id, n.is_read, n.created_at
     FROM notifications n
     LEFT JOIN profiles a ON a.id = n.actor_id";

/// Fields of a notification about to be written
#[derive(Debug, Clone, Copy)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub kind: NotificationKind,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
}

pub struct NotificationRepository {
    pool: DbPool,
}

impl NotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
        Ok(Notification {
            id: uuid_column(row, 0)?,
            recipient_id: uuid_column(row, 1)?,
            actor_id: optional_uuid_column(row, 2)?,
            actor_username: row.get(3)?,
            kind: enum_column(row, 4, NotificationKind::parse)?,
            post_id: optional_uuid_column(row, 5)?,
            comment_id: optional_uuid_column(row, 6)?,
            is_read: row.get::<_, i32>(7)? == 1,
            created_at: timestamp_column(row, 8)?,
        })
    }

    /// Write a notification as part of the caller's transaction.
    /// Actions on one's own content are not notified.
    pub fn insert_with(conn: &Connection, new: &NewNotification) -> DbResult<Option<Uuid>> {
        if new.recipient_id == new.actor_id {
            return Ok(None);
        }

        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO notifications (id, recipient_id, actor_id, kind, post_id, comment_id, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
            (
                id.to_string(),
                new.recipient_id.to_string(),
                new.actor_id.to_string(),
                new.kind.as_str(),
                new.post_id.map(|id| id.to_string()),
                new.comment_id.map(|id| id.to_string()),
                format_timestamp(&Utc::now()),
            ),
        )?;
        Ok(Some(id))
    }

    /// Drop the unread notification left by an action that was undone (unlike, unfollow)
    pub fn retract_with(
        conn: &Connection,
        actor_id: &Uuid,
        kind: NotificationKind,
        post_id: Option<&Uuid>,
        recipient_id: &Uuid,
    ) -> DbResult<()> {
        conn.execute(
            "DELETE FROM notifications
             WHERE actor_id = ? AND kind = ? AND recipient_id = ? AND is_read = 0
               AND ((?4 IS NULL AND post_id IS NULL) OR post_id = ?4)",
            (
                actor_id.to_string(),
                kind.as_str(),
                recipient_id.to_string(),
                post_id.map(|id| id.to_string()),
            ),
        )?;
        Ok(())
    }

    /// Notifications for a user, newest first
    pub fn list(
        &self,
        recipient_id: &Uuid,
        limit: u32,
        offset: u32,
        unread_only: bool,
    ) -> DbResult<Vec<Notification>> {
        let conn = self.pool.get()?;
        let query = format!(
            "{} WHERE n.recipient_id = ?1 AND (?2 = 0 OR n.is_read = 0)
             ORDER BY n.created_at DESC, n.rowid DESC
             LIMIT ?3 OFFSET ?4",
            NOTIFICATION_SELECT
        );
        let mut stmt = conn.prepare(&query)?;

        let notifications = stmt
            .query_map(
                (recipient_id.to_string(), unread_only as i32, limit, offset),
                Self::map_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notifications)
    }

    /// Mark one of the recipient's notifications read. `None` when the id does
    /// not belong to the recipient.
    pub fn mark_read(&self, recipient_id: &Uuid, notification_id: &Uuid) -> DbResult<Option<Notification>> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ? AND recipient_id = ?",
            (notification_id.to_string(), recipient_id.to_string()),
        )?;

        let notification = conn
            .query_row(
                &format!("{} WHERE n.id = ? AND n.recipient_id = ?", NOTIFICATION_SELECT),
                (notification_id.to_string(), recipient_id.to_string()),
                Self::map_row,
            )
            .optional()?;
        Ok(notification)
    }
}
