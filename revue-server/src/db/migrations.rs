//! Versioned schema migrations.
//!
//! Schema changes are only ever made by appending a new [`Migration`] to
//! [`MIGRATIONS`]. Applied versions are recorded in `schema_migrations`, so
//! running the migrator again is a no-op.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::{format_timestamp, timestamp_column};

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_profiles_and_media_items",
        sql: r#"
CREATE TABLE profiles (
    id TEXT PRIMARY KEY,
    username TEXT UNIQUE NOT NULL,
    display_name TEXT,
    avatar_url TEXT,
    onboarding_completed INTEGER NOT NULL DEFAULT 0,
    contacts_synced INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE media_items (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    media_type TEXT NOT NULL
        CHECK(media_type IN ('movie', 'tv', 'book', 'game', 'music', 'podcast')),
    cover_url TEXT,
    release_year INTEGER
);

CREATE INDEX idx_media_items_title ON media_items(title COLLATE NOCASE);
"#,
    },
    Migration {
        version: 2,
        name: "create_posts",
        sql: r#"
CREATE TABLE posts (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    content TEXT NOT NULL,
    media_item_id TEXT,
    rating INTEGER CHECK(rating IS NULL OR rating BETWEEN 1 AND 5),
    contains_spoilers INTEGER NOT NULL DEFAULT 0,
    visibility TEXT NOT NULL DEFAULT 'public' CHECK(visibility IN ('public', 'private')),
    like_count INTEGER NOT NULL DEFAULT 0,
    comment_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    author_username TEXT,
    author_display_name TEXT,
    author_avatar_url TEXT,
    FOREIGN KEY (user_id) REFERENCES profiles(id) ON DELETE CASCADE,
    FOREIGN KEY (media_item_id) REFERENCES media_items(id) ON DELETE SET NULL
);

CREATE INDEX idx_posts_created_at ON posts(created_at DESC);
CREATE INDEX idx_posts_user_id ON posts(user_id);
CREATE INDEX idx_posts_media_item_id ON posts(media_item_id);
"#,
    },
    Migration {
        version: 3,
        name: "create_likes_and_comments",
        sql: r#"
CREATE TABLE post_likes (
    user_id TEXT NOT NULL,
    post_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_id, post_id),
    FOREIGN KEY (user_id) REFERENCES profiles(id) ON DELETE CASCADE,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE INDEX idx_post_likes_post_id ON post_likes(post_id);

CREATE TABLE comments (
    id TEXT PRIMARY KEY,
    post_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    content TEXT NOT NULL,
    parent_comment_id TEXT,
    created_at TEXT NOT NULL,
    author_username TEXT,
    author_display_name TEXT,
    author_avatar_url TEXT,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES profiles(id) ON DELETE CASCADE,
    FOREIGN KEY (parent_comment_id) REFERENCES comments(id) ON DELETE CASCADE
);

CREATE INDEX idx_comments_post_created ON comments(post_id, created_at);
"#,
    },
    Migration {
        version: 4,
        name: "create_follows_and_notifications",
        sql: r#"
CREATE TABLE follows (
    follower_id TEXT NOT NULL,
    following_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (follower_id, following_id),
    CHECK (follower_id <> following_id),
    FOREIGN KEY (follower_id) REFERENCES profiles(id) ON DELETE CASCADE,
    FOREIGN KEY (following_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX idx_follows_following ON follows(following_id);

CREATE TABLE notifications (
    id TEXT PRIMARY KEY,
    recipient_id TEXT NOT NULL,
    actor_id TEXT,
    kind TEXT NOT NULL CHECK(kind IN ('like', 'comment', 'reply', 'follow')),
    post_id TEXT,
    comment_id TEXT,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    FOREIGN KEY (recipient_id) REFERENCES profiles(id) ON DELETE CASCADE,
    FOREIGN KEY (actor_id) REFERENCES profiles(id) ON DELETE SET NULL,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (comment_id) REFERENCES comments(id) ON DELETE CASCADE
);

CREATE INDEX idx_notifications_recipient ON notifications(recipient_id, created_at DESC);
"#,
    },
    Migration {
        version: 5,
        name: "create_user_media_preferences",
        sql: r#"
CREATE TABLE user_media_preferences (
    user_id TEXT NOT NULL,
    media_type TEXT NOT NULL
        CHECK(media_type IN ('movie', 'tv', 'book', 'game', 'music', 'podcast')),
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_id, media_type),
    FOREIGN KEY (user_id) REFERENCES profiles(id) ON DELETE CASCADE
);
"#,
    },
    Migration {
        version: 6,
        name: "create_sessions",
        sql: r#"
CREATE TABLE sessions (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    FOREIGN KEY (user_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX idx_sessions_user_id ON sessions(user_id);
CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
"#,
    },
    Migration {
        version: 7,
        name: "rating_requires_media_item",
        sql: r#"
UPDATE posts SET rating = NULL WHERE rating IS NOT NULL AND media_item_id IS NULL;

CREATE TRIGGER posts_rating_requires_media_insert
BEFORE INSERT ON posts
WHEN NEW.rating IS NOT NULL AND NEW.media_item_id IS NULL
BEGIN
    SELECT RAISE(ABORT, 'rating requires a media item');
END;

CREATE TRIGGER posts_rating_requires_media_update
BEFORE UPDATE OF rating ON posts
WHEN NEW.rating IS NOT NULL AND NEW.media_item_id IS NULL
BEGIN
    SELECT RAISE(ABORT, 'rating requires a media item');
END;
"#,
    },
];

const LEDGER_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

/// Applies [`Migration`]s in version order, each inside its own transaction
pub struct Migrator<'a> {
    migrations: &'a [Migration],
}

impl Migrator<'static> {
    pub fn new() -> Self {
        Self {
            migrations: MIGRATIONS,
        }
    }
}

impl Default for Migrator<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Migrator<'a> {
    pub fn with_migrations(migrations: &'a [Migration]) -> Self {
        Self { migrations }
    }

    pub fn migrations(&self) -> &'a [Migration] {
        self.migrations
    }

    /// Versions must be strictly increasing
    fn validate(&self) -> Result<()> {
        for pair in self.migrations.windows(2) {
            if pair[1].version <= pair[0].version {
                bail!(
                    "Migration {} ({}) is out of order after version {}",
                    pair[1].version,
                    pair[1].name,
                    pair[0].version
                );
            }
        }
        Ok(())
    }

    /// Migrations already recorded in the ledger, oldest first
    pub fn applied(&self, conn: &Connection) -> Result<Vec<AppliedMigration>> {
        conn.execute(LEDGER_TABLE, [])
            .context("Failed to create schema_migrations table")?;

        let mut stmt =
            conn.prepare("SELECT version, name, applied_at FROM schema_migrations ORDER BY version")?;
        let applied = stmt
            .query_map([], |row| {
                Ok(AppliedMigration {
                    version: row.get(0)?,
                    name: row.get(1)?,
                    applied_at: timestamp_column(row, 2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read schema_migrations")?;

        Ok(applied)
    }

    /// Migrations not yet applied, in the order they would run
    pub fn pending(&self, conn: &Connection) -> Result<Vec<Migration>> {
        self.validate()?;
        let applied = self.applied(conn)?;

        if let Some(unknown) = applied
            .iter()
            .find(|a| !self.migrations.iter().any(|m| m.version == a.version))
        {
            bail!(
                "Database has migration {} ({}) which this build does not know about",
                unknown.version,
                unknown.name
            );
        }

        Ok(self
            .migrations
            .iter()
            .filter(|m| !applied.iter().any(|a| a.version == m.version))
            .copied()
            .collect())
    }

    /// Apply every pending migration and return the versions applied
    pub fn run(&self, conn: &mut Connection) -> Result<Vec<i64>> {
        let pending = self.pending(conn)?;
        let mut applied = Vec::with_capacity(pending.len());

        for migration in pending {
            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql).with_context(|| {
                format!(
                    "Migration {} ({}) failed",
                    migration.version, migration.name
                )
            })?;
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                (
                    migration.version,
                    migration.name,
                    format_timestamp(&Utc::now()),
                ),
            )?;
            tx.commit()?;

            tracing::info!("Applied migration {} ({})", migration.version, migration.name);
            applied.push(migration.version);
        }

        Ok(applied)
    }
}
