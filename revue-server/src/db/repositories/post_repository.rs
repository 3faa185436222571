use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use revue_types::{FeedCategory, FeedPost, MediaType, Post, Visibility};

use crate::db::repositories::ProfileRepository;
use crate::db::{
    enum_column, format_timestamp, optional_enum_column, timestamp_column, uuid_column, DbError,
    DbPool, DbResult,
};

/// Post row joined with live author profile and media item. Column order is
/// relied upon by [`PostRepository::map_feed_row`].
const FEED_SELECT: &str =
    "SELECT p.id, p.user_id, p.content, p.media_item_id, p.rating, p.contains_spoilers, p.visibility,
            p.like_count, p.comment_count, p.created_at,
            p.author_username, p.author_display_name, p.author_avatar_url,
            u.username, u.display_name, u.avatar_url,
            m.title, m.media_type, m.cover_url,
            EXISTS(SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = :viewer) AS liked_by_me
     FROM posts p
     LEFT JOIN profiles u ON u.id = p.user_id
     LEFT JOIN media_items m ON m.id = p.media_item_id";

/// Input of the `create_post` procedure after validation
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: Uuid,
    pub content: String,
    pub media_item_id: Option<String>,
    pub rating: Option<i32>,
    pub contains_spoilers: bool,
    pub visibility: Visibility,
}

pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_feed_row(row: &Row<'_>) -> rusqlite::Result<FeedPost> {
        Ok(FeedPost {
            post: Post {
                id: uuid_column(row, 0)?,
                user_id: uuid_column(row, 1)?,
                content: row.get(2)?,
                media_item_id: row.get(3)?,
                rating: row.get(4)?,
                contains_spoilers: row.get::<_, i32>(5)? == 1,
                visibility: enum_column(row, 6, Visibility::parse)?,
                like_count: row.get(7)?,
                comment_count: row.get(8)?,
                created_at: timestamp_column(row, 9)?,
                author_username: row.get(10)?,
                author_display_name: row.get(11)?,
                author_avatar_url: row.get(12)?,
            },
            username: row.get(13)?,
            display_name: row.get(14)?,
            avatar_url: row.get(15)?,
            media_title: row.get(16)?,
            media_type: optional_enum_column(row, 17, MediaType::parse)?,
            media_cover_url: row.get(18)?,
            liked_by_me: row.get::<_, i32>(19)? == 1,
        })
    }

    /// Create a post. Author and media references are checked inside the
    /// transaction so a dangling reference fails instead of writing a row.
    pub fn create(&self, new: &NewPost) -> DbResult<Post> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let author = ProfileRepository::find_with(&tx, &new.user_id)?.ok_or_else(|| {
            DbError::ForeignKey(format!(
                "posts.user_id: profile {} does not exist",
                new.user_id
            ))
        })?;

        if let Some(media_item_id) = &new.media_item_id {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM media_items WHERE id = ?)",
                [media_item_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(DbError::ForeignKey(format!(
                    "posts.media_item_id: media item '{}' does not exist",
                    media_item_id
                )));
            }
        }

        let post = Post {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            content: new.content.clone(),
            media_item_id: new.media_item_id.clone(),
            rating: new.rating,
            contains_spoilers: new.contains_spoilers,
            visibility: new.visibility,
            like_count: 0,
            comment_count: 0,
            created_at: Utc::now(),
            author_username: Some(author.username.clone()),
            author_display_name: author.display_name.clone(),
            author_avatar_url: author.avatar_url.clone(),
        };

        tx.execute(
            "INSERT INTO posts (id, user_id, content, media_item_id, rating, contains_spoilers, visibility,
                                like_count, comment_count, created_at,
                                author_username, author_display_name, author_avatar_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?)",
            (
                post.id.to_string(),
                post.user_id.to_string(),
                &post.content,
                &post.media_item_id,
                post.rating,
                post.contains_spoilers as i32,
                post.visibility.as_str(),
                format_timestamp(&post.created_at),
                &post.author_username,
                &post.author_display_name,
                &post.author_avatar_url,
            ),
        )?;
        tx.commit()?;

        tracing::debug!("Created post {} for user {}", post.id, post.user_id);
        Ok(post)
    }

    /// Posts for a feed tab, newest first; insertion order breaks timestamp ties
    pub fn get_feed(
        &self,
        category: FeedCategory,
        viewer: Option<&Uuid>,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<FeedPost>> {
        let conn = self.pool.get()?;

        let filter = match category {
            FeedCategory::ForYou => "WHERE p.visibility = 'public' OR p.user_id = :viewer",
            FeedCategory::Following => {
                "WHERE p.user_id = :viewer
                    OR (p.visibility = 'public'
                        AND p.user_id IN (SELECT following_id FROM follows WHERE follower_id = :viewer))"
            }
        };

        let query = format!(
            "{} {} ORDER BY p.created_at DESC, p.rowid DESC LIMIT :limit OFFSET :offset",
            FEED_SELECT, filter
        );
        let mut stmt = conn.prepare(&query)?;

        let posts = stmt
            .query_map(
                named_params! {
                    ":viewer": viewer.map(|id| id.to_string()),
                    ":limit": limit,
                    ":offset": offset,
                },
                Self::map_feed_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    /// A single post as the viewer may see it; private posts are only visible to their author
    pub fn get_feed_post(&self, post_id: &Uuid, viewer: Option<&Uuid>) -> DbResult<Option<FeedPost>> {
        let conn = self.pool.get()?;
        let query = format!(
            "{} WHERE p.id = :post_id AND (p.visibility = 'public' OR p.user_id = :viewer)",
            FEED_SELECT
        );

        let post = conn
            .query_row(
                &query,
                named_params! {
                    ":post_id": post_id.to_string(),
                    ":viewer": viewer.map(|id| id.to_string()),
                },
                Self::map_feed_row,
            )
            .optional()?;
        Ok(post)
    }

    /// Author of a post the actor may interact with.
    ///
    /// A missing post is a dangling reference; a private post of another
    /// user is reported as not found.
    pub fn author_for_actor_with(
        conn: &Connection,
        post_id: &Uuid,
        actor_id: &Uuid,
        table: &str,
    ) -> DbResult<Uuid> {
        let row = conn
            .query_row(
                "SELECT user_id, visibility FROM posts WHERE id = ?",
                [post_id.to_string()],
                |row| Ok((uuid_column(row, 0)?, enum_column(row, 1, Visibility::parse)?)),
            )
            .optional()?;

        match row {
            None => Err(DbError::ForeignKey(format!(
                "{}.post_id: post {} does not exist",
                table, post_id
            ))),
            Some((author_id, Visibility::Private)) if author_id != *actor_id => {
                Err(DbError::NotFound(format!("post {}", post_id)))
            }
            Some((author_id, _)) => Ok(author_id),
        }
    }

    /// Recompute the denormalized like counter from `post_likes`
    pub fn recount_likes_with(conn: &Connection, post_id: &Uuid) -> DbResult<i32> {
        conn.execute(
            "UPDATE posts SET like_count = (SELECT COUNT(*) FROM post_likes WHERE post_id = ?1) WHERE id = ?1",
            [post_id.to_string()],
        )?;
        let count = conn.query_row(
            "SELECT like_count FROM posts WHERE id = ?",
            [post_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Recompute the denormalized comment counter from `comments`
    pub fn recount_comments_with(conn: &Connection, post_id: &Uuid) -> DbResult<i32> {
        conn.execute(
            "UPDATE posts SET comment_count = (SELECT COUNT(*) FROM comments WHERE post_id = ?1) WHERE id = ?1",
            [post_id.to_string()],
        )?;
        let count = conn.query_row(
            "SELECT comment_count FROM posts WHERE id = ?",
            [post_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use proptest::prelude::*;

    struct Fixture {
        repo: PostRepository,
        author: Uuid,
        other: Uuid,
        db: Database,
    }

    fn fixture() -> Fixture {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        db.seed_demo_data().expect("Failed to seed");
        let profiles = ProfileRepository::new(db.pool.clone());
        let author = profiles.create("critic", Some("The Critic")).unwrap().id;
        let other = profiles.create("reader", None).unwrap().id;
        Fixture {
            repo: PostRepository::new(db.pool.clone()),
            author,
            other,
            db,
        }
    }

    fn new_post(user_id: Uuid, content: &str) -> NewPost {
        NewPost {
            user_id,
            content: content.to_string(),
            media_item_id: None,
            rating: None,
            contains_spoilers: false,
            visibility: Visibility::Public,
        }
    }

    #[test]
    fn test_create_caches_author_fields() {
        let f = fixture();
        let post = f.repo.create(&new_post(f.author, "Great pacing")).unwrap();

        assert_eq!(post.author_username.as_deref(), Some("critic"));
        assert_eq!(post.author_display_name.as_deref(), Some("The Critic"));
        assert_eq!(post.like_count, 0);
    }

    #[test]
    fn test_create_with_missing_media_is_foreign_key_error() {
        let f = fixture();
        let mut new = new_post(f.author, "Review of nothing");
        new.media_item_id = Some("tmdb:does-not-exist".to_string());

        assert!(matches!(f.repo.create(&new), Err(DbError::ForeignKey(_))));

        let feed = f.repo.get_feed(FeedCategory::ForYou, None, 10, 0).unwrap();
        assert!(feed.is_empty(), "failed create must not leave a row behind");
    }

    #[test]
    fn test_create_with_missing_author_is_foreign_key_error() {
        let f = fixture();
        let result = f.repo.create(&new_post(Uuid::new_v4(), "Ghost writer"));
        assert!(matches!(result, Err(DbError::ForeignKey(_))));
    }

    #[test]
    fn test_feed_joins_media_and_tolerates_null_media() {
        let f = fixture();
        let mut with_media = new_post(f.author, "Red pill");
        with_media.media_item_id = Some("tmdb:603".to_string());
        with_media.rating = Some(5);
        f.repo.create(&with_media).unwrap();
        f.repo.create(&new_post(f.author, "General musings")).unwrap();

        let feed = f.repo.get_feed(FeedCategory::ForYou, None, 10, 0).unwrap();
        assert_eq!(feed.len(), 2);

        let plain = &feed[0];
        assert_eq!(plain.post.content, "General musings");
        assert_eq!(plain.media_title, None);
        assert_eq!(plain.media_type, None);

        let reviewed = &feed[1];
        assert_eq!(reviewed.media_title.as_deref(), Some("The Matrix"));
        assert_eq!(reviewed.media_type, Some(MediaType::Movie));
        assert_eq!(reviewed.post.rating, Some(5));
        assert_eq!(reviewed.display_name.as_deref(), Some("The Critic"));
    }

    #[test]
    fn test_private_posts_only_visible_to_author() {
        let f = fixture();
        let mut private = new_post(f.author, "Notes to self");
        private.visibility = Visibility::Private;
        let post = f.repo.create(&private).unwrap();

        let own = f.repo.get_feed(FeedCategory::ForYou, Some(&f.author), 10, 0).unwrap();
        assert_eq!(own.len(), 1);

        let others = f.repo.get_feed(FeedCategory::ForYou, Some(&f.other), 10, 0).unwrap();
        assert!(others.is_empty());

        assert!(f.repo.get_feed_post(&post.id, Some(&f.other)).unwrap().is_none());
        assert!(f.repo.get_feed_post(&post.id, Some(&f.author)).unwrap().is_some());
    }

    #[test]
    fn test_following_feed() {
        let f = fixture();
        f.repo.create(&new_post(f.author, "From the critic")).unwrap();

        let before = f.repo.get_feed(FeedCategory::Following, Some(&f.other), 10, 0).unwrap();
        assert!(before.is_empty());

        {
            let conn = f.db.connection().unwrap();
            conn.execute(
                "INSERT INTO follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
                (f.other.to_string(), f.author.to_string(), format_timestamp(&Utc::now())),
            )
            .unwrap();
        }

        let after = f.repo.get_feed(FeedCategory::Following, Some(&f.other), 10, 0).unwrap();
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let f = fixture();
        f.repo.create(&new_post(f.author, "Only post")).unwrap();

        let page = f.repo.get_feed(FeedCategory::ForYou, None, 10, 50).unwrap();
        assert!(page.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        // Paging through the feed visits every post exactly once, newest first
        #[test]
        fn prop_pagination_covers_feed_in_order(count in 1usize..25, page_size in 1u32..8) {
            let f = fixture();
            let mut created = Vec::new();
            for i in 0..count {
                created.push(f.repo.create(&new_post(f.author, &format!("post {}", i))).unwrap().id);
            }

            let mut seen = Vec::new();
            let mut offset = 0;
            loop {
                let page = f.repo.get_feed(FeedCategory::ForYou, None, page_size, offset).unwrap();
                if page.is_empty() {
                    break;
                }
                offset += page.len() as u32;
                seen.extend(page.into_iter().map(|p| p.post.id));
            }

            created.reverse();
            prop_assert_eq!(seen, created);
        }
    }
}
