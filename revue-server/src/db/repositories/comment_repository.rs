use chrono::Utc;
use rusqlite::{OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use revue_types::{Comment, NotificationKind, Visibility};

use crate::db::repositories::{NewNotification, NotificationRepository, PostRepository, ProfileRepository};
use crate::db::{
    enum_column, format_timestamp, optional_uuid_column, timestamp_column, uuid_column, DbError,
    DbPool, DbResult,
};

pub struct CommentRepository {
    pool: DbPool,
}

impl CommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
        Ok(Comment {
            id: uuid_column(row, 0)?,
            post_id: uuid_column(row, 1)?,
            user_id: uuid_column(row, 2)?,
            content: row.get(3)?,
            parent_comment_id: optional_uuid_column(row, 4)?,
            created_at: timestamp_column(row, 5)?,
            author_username: row.get(6)?,
            author_display_name: row.get(7)?,
            author_avatar_url: row.get(8)?,
        })
    }

    /// Append a comment and bump the post's comment counter in one transaction.
    ///
    /// The post author is notified; for a reply the parent comment's author is
    /// notified too when they are a third party.
    pub fn create(
        &self,
        user_id: &Uuid,
        post_id: &Uuid,
        content: &str,
        parent_comment_id: Option<&Uuid>,
    ) -> DbResult<Comment> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let post_author = PostRepository::author_for_actor_with(&tx, post_id, user_id, "comments")?;

        let author = ProfileRepository::find_with(&tx, user_id)?.ok_or_else(|| {
            DbError::ForeignKey(format!("comments.user_id: profile {} does not exist", user_id))
        })?;

        let parent_author = match parent_comment_id {
            Some(parent_id) => {
                let parent: Option<(Uuid, Uuid)> = tx
                    .query_row(
                        "SELECT post_id, user_id FROM comments WHERE id = ?",
                        [parent_id.to_string()],
                        |row| Ok((uuid_column(row, 0)?, uuid_column(row, 1)?)),
                    )
                    .optional()?;
                match parent {
                    None => {
                        return Err(DbError::ForeignKey(format!(
                            "comments.parent_comment_id: comment {} does not exist",
                            parent_id
                        )))
                    }
                    Some((parent_post, _)) if parent_post != *post_id => {
                        return Err(DbError::Invalid(format!(
                            "comment {} belongs to another post",
                            parent_id
                        )))
                    }
                    Some((_, parent_author)) => Some(parent_author),
                }
            }
            None => None,
        };

        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: *post_id,
            user_id: *user_id,
            content: content.to_string(),
            parent_comment_id: parent_comment_id.copied(),
            created_at: Utc::now(),
            author_username: Some(author.username.clone()),
            author_display_name: author.display_name.clone(),
            author_avatar_url: author.avatar_url.clone(),
        };

        tx.execute(
            "INSERT INTO comments (id, post_id, user_id, content, parent_comment_id, created_at,
                                   author_username, author_display_name, author_avatar_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                comment.id.to_string(),
                comment.post_id.to_string(),
                comment.user_id.to_string(),
                &comment.content,
                comment.parent_comment_id.map(|id| id.to_string()),
                format_timestamp(&comment.created_at),
                &comment.author_username,
                &comment.author_display_name,
                &comment.author_avatar_url,
            ),
        )?;

        PostRepository::recount_comments_with(&tx, post_id)?;

        NotificationRepository::insert_with(
            &tx,
            &NewNotification {
                recipient_id: post_author,
                actor_id: *user_id,
                kind: NotificationKind::Comment,
                post_id: Some(*post_id),
                comment_id: Some(comment.id),
            },
        )?;

        if let Some(parent_author) = parent_author.filter(|id| *id != post_author) {
            NotificationRepository::insert_with(
                &tx,
                &NewNotification {
                    recipient_id: parent_author,
                    actor_id: *user_id,
                    kind: NotificationKind::Reply,
                    post_id: Some(*post_id),
                    comment_id: Some(comment.id),
                },
            )?;
        }

        tx.commit()?;

        tracing::debug!("Created comment {} on post {}", comment.id, post_id);
        Ok(comment)
    }

    /// Comments of a post, oldest first with insertion order breaking ties.
    /// Live profile fields win over the values cached on the row.
    pub fn list(
        &self,
        post_id: &Uuid,
        viewer: Option<&Uuid>,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<Comment>> {
        let conn = self.pool.get()?;

        let post: Option<(Uuid, Visibility)> = conn
            .query_row(
                "SELECT user_id, visibility FROM posts WHERE id = ?",
                [post_id.to_string()],
                |row| Ok((uuid_column(row, 0)?, enum_column(row, 1, Visibility::parse)?)),
            )
            .optional()?;

        match post {
            None => return Err(DbError::NotFound(format!("post {}", post_id))),
            Some((author, Visibility::Private)) if viewer != Some(&author) => {
                return Err(DbError::NotFound(format!("post {}", post_id)))
            }
            Some(_) => {}
        }

        let mut stmt = conn.prepare(
            "SELECT c.id, c.post_id, c.user_id, c.content, c.parent_comment_id, c.created_at,
                    COALESCE(u.username, c.author_username),
                    COALESCE(u.display_name, c.author_display_name),
                    COALESCE(u.avatar_url, c.author_avatar_url)
             FROM comments c
             LEFT JOIN profiles u ON u.id = c.user_id
             WHERE c.post_id = ?1
             ORDER BY c.created_at ASC, c.rowid ASC
             LIMIT ?2 OFFSET ?3",
        )?;

        let comments = stmt
            .query_map((post_id.to_string(), limit, offset), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}
