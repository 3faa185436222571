use chrono::Utc;
use rusqlite::TransactionBehavior;
use uuid::Uuid;

use revue_types::{FollowState, NotificationKind};

use crate::db::repositories::{NewNotification, NotificationRepository, ProfileRepository};
use crate::db::{format_timestamp, DbError, DbPool, DbResult};

pub struct FollowRepository {
    pool: DbPool,
}

impl FollowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Follow `target_id`, or unfollow when already following
    pub fn toggle(&self, follower_id: &Uuid, target_id: &Uuid) -> DbResult<FollowState> {
        if follower_id == target_id {
            return Err(DbError::Invalid("cannot follow yourself".to_string()));
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if ProfileRepository::find_with(&tx, target_id)?.is_none() {
            return Err(DbError::ForeignKey(format!(
                "follows.following_id: profile {} does not exist",
                target_id
            )));
        }

        let removed = tx.execute(
            "DELETE FROM follows WHERE follower_id = ? AND following_id = ?",
            (follower_id.to_string(), target_id.to_string()),
        )?;

        let following = if removed == 0 {
            tx.execute(
                "INSERT INTO follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
                (
                    follower_id.to_string(),
                    target_id.to_string(),
                    format_timestamp(&Utc::now()),
                ),
            )?;
            NotificationRepository::insert_with(
                &tx,
                &NewNotification {
                    recipient_id: *target_id,
                    actor_id: *follower_id,
                    kind: NotificationKind::Follow,
                    post_id: None,
                    comment_id: None,
                },
            )?;
            true
        } else {
            NotificationRepository::retract_with(
                &tx,
                follower_id,
                NotificationKind::Follow,
                None,
                target_id,
            )?;
            false
        };

        let follower_count = tx.query_row(
            "SELECT COUNT(*) FROM follows WHERE following_id = ?",
            [target_id.to_string()],
            |row| row.get(0),
        )?;
        tx.commit()?;

        Ok(FollowState {
            user_id: *target_id,
            following,
            follower_count,
        })
    }
}
