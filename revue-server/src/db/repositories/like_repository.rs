use chrono::Utc;
use rusqlite::TransactionBehavior;
use uuid::Uuid;

use revue_types::{LikeState, NotificationKind};

use crate::db::repositories::{NewNotification, NotificationRepository, PostRepository};
use crate::db::{format_timestamp, DbPool, DbResult};

pub struct LikeRepository {
    pool: DbPool,
}

impl LikeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Flip the user's like on a post and return the recomputed state.
    /// Applying it twice leaves the post as it was.
    pub fn toggle(&self, user_id: &Uuid, post_id: &Uuid) -> DbResult<LikeState> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let author_id = PostRepository::author_for_actor_with(&tx, post_id, user_id, "post_likes")?;

        let removed = tx.execute(
            "DELETE FROM post_likes WHERE user_id = ? AND post_id = ?",
            (user_id.to_string(), post_id.to_string()),
        )?;

        let liked = if removed == 0 {
            tx.execute(
                "INSERT INTO post_likes (user_id, post_id, created_at) VALUES (?, ?, ?)",
                (
                    user_id.to_string(),
                    post_id.to_string(),
                    format_timestamp(&Utc::now()),
                ),
            )?;
            NotificationRepository::insert_with(
                &tx,
                &NewNotification {
                    recipient_id: author_id,
                    actor_id: *user_id,
                    kind: NotificationKind::Like,
                    post_id: Some(*post_id),
                    comment_id: None,
                },
            )?;
            true
        } else {
            NotificationRepository::retract_with(
                &tx,
                user_id,
                NotificationKind::Like,
                Some(post_id),
                &author_id,
            )?;
            false
        };

        let like_count = PostRepository::recount_likes_with(&tx, post_id)?;
        tx.commit()?;

        Ok(LikeState {
            post_id: *post_id,
            liked,
            like_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{NewPost, ProfileRepository};
    use crate::db::{Database, DbError};
    use revue_types::Visibility;
    use std::sync::{Arc, Barrier};

    struct Fixture {
        db: Database,
        likes: LikeRepository,
        author: Uuid,
        fan: Uuid,
        post_id: Uuid,
    }

    fn fixture() -> Fixture {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        let profiles = ProfileRepository::new(db.pool.clone());
        let author = profiles.create("author", None).unwrap().id;
        let fan = profiles.create("fan", None).unwrap().id;
        let post_id = PostRepository::new(db.pool.clone())
            .create(&NewPost {
                user_id: author,
                content: "Worth a rewatch".to_string(),
                media_item_id: None,
                rating: None,
                contains_spoilers: false,
                visibility: Visibility::Public,
            })
            .unwrap()
            .id;
        Fixture {
            likes: LikeRepository::new(db.pool.clone()),
            db,
            author,
            fan,
            post_id,
        }
    }

    fn notification_count(db: &Database) -> i32 {
        let conn = db.connection().unwrap();
        conn.query_row("SELECT COUNT(*) FROM notifications WHERE kind = 'like'", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_double_toggle_restores_count() {
        let f = fixture();

        let first = f.likes.toggle(&f.fan, &f.post_id).unwrap();
        assert!(first.liked);
        assert_eq!(first.like_count, 1);
        assert_eq!(notification_count(&f.db), 1);

        let second = f.likes.toggle(&f.fan, &f.post_id).unwrap();
        assert!(!second.liked);
        assert_eq!(second.like_count, 0);
        assert_eq!(notification_count(&f.db), 0);
    }

    #[test]
    fn test_likes_from_different_users_accumulate() {
        let f = fixture();
        f.likes.toggle(&f.fan, &f.post_id).unwrap();
        let state = f.likes.toggle(&f.author, &f.post_id).unwrap();

        assert_eq!(state.like_count, 2);
        // Liking your own post is not notified
        assert_eq!(notification_count(&f.db), 1);
    }

    #[test]
    fn test_toggle_missing_post() {
        let f = fixture();
        let result = f.likes.toggle(&f.fan, &Uuid::new_v4());
        assert!(matches!(result, Err(DbError::ForeignKey(_))));
    }

    #[test]
    fn test_concurrent_toggles_on_file_database() {
        const FANS: usize = 8;
        const ROUNDS: usize = 5;

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = Database::new(dir.path().join("likes.db")).expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");

        let profiles = ProfileRepository::new(db.pool.clone());
        let author = profiles.create("author", None).unwrap().id;
        let fans: Vec<Uuid> = (0..FANS)
            .map(|i| profiles.create(&format!("fan_{}", i), None).unwrap().id)
            .collect();
        let post_id = PostRepository::new(db.pool.clone())
            .create(&NewPost {
                user_id: author,
                content: "Everyone likes this one".to_string(),
                media_item_id: None,
                rating: None,
                contains_spoilers: false,
                visibility: Visibility::Public,
            })
            .unwrap()
            .id;

        let barrier = Arc::new(Barrier::new(FANS));
        let handles: Vec<_> = fans
            .into_iter()
            .map(|fan| {
                let likes = LikeRepository::new(db.pool.clone());
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let mut failures = Vec::new();
                    for round in 0..ROUNDS {
                        barrier.wait();
                        if let Err(e) = likes.toggle(&fan, &post_id) {
                            failures.push(format!("round {}: {}", round, e));
                        }
                    }
                    failures
                })
            })
            .collect();

        let failures: Vec<String> = handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("toggle thread panicked"))
            .collect();
        assert!(failures.is_empty(), "toggles failed: {:?}", failures);

        // An odd number of rounds leaves every fan liking the post
        let conn = db.connection().unwrap();
        let (stored, actual): (i64, i64) = conn
            .query_row(
                "SELECT like_count, (SELECT COUNT(*) FROM post_likes WHERE post_id = ?1) FROM posts WHERE id = ?1",
                [post_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(actual, FANS as i64);
        assert_eq!(stored, actual);
        assert_eq!(notification_count(&db), FANS as i32);
    }
}
