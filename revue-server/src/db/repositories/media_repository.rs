use rusqlite::Row;

use revue_types::{MediaItem, MediaType};

use crate::db::{enum_column, DbPool, DbResult};

pub struct MediaRepository {
    pool: DbPool,
}

impl MediaRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<MediaItem> {
        Ok(MediaItem {
            id: row.get(0)?,
            title: row.get(1)?,
            media_type: enum_column(row, 2, MediaType::parse)?,
            cover_url: row.get(3)?,
            release_year: row.get(4)?,
        })
    }

    /// Case-insensitive title search; an exact id ranks first, then title prefixes.
    /// The query is matched literally, `%` and `_` included.
    pub fn search(&self, query: &str, limit: u32) -> DbResult<Vec<MediaItem>> {
        let conn = self.pool.get()?;
        let needle = query.trim().to_lowercase();
        let pattern = escape_like(&needle);
        let mut stmt = conn.prepare(
            "SELECT id, title, media_type, cover_url, release_year
             FROM media_items
             WHERE LOWER(title) LIKE '%' || ?1 || '%' ESCAPE '\\' OR LOWER(id) = ?3
             ORDER BY CASE
                 WHEN LOWER(id) = ?3 THEN 0
                 WHEN LOWER(title) LIKE ?1 || '%' ESCAPE '\\' THEN 1
                 ELSE 2
             END, title COLLATE NOCASE
             LIMIT ?2",
        )?;

        let items = stmt
            .query_map((pattern, limit, needle), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

/// Backslash-escape LIKE wildcards and the escape character itself
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn seeded() -> (Database, MediaRepository) {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        db.seed_demo_data().expect("Failed to seed");
        let repo = MediaRepository::new(db.pool.clone());
        (db, repo)
    }

    fn add_movie(db: &Database, id: &str, title: &str) {
        db.connection()
            .unwrap()
            .execute(
                "INSERT INTO media_items (id, title, media_type) VALUES (?, ?, 'movie')",
                (id, title),
            )
            .unwrap();
    }

    fn titles(items: &[MediaItem]) -> Vec<&str> {
        items.iter().map(|m| m.title.as_str()).collect()
    }

    #[test]
    fn test_exact_id_match() {
        let (_db, repo) = seeded();
        let results = repo.search("TMDB:603", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "The Matrix");
        assert_eq!(results[0].media_type, MediaType::Movie);
        assert!(repo.search("tmdb:0", 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_ranks_prefix_first() {
        let (db, repo) = seeded();
        add_movie(&db, "tmdb:1", "Return to Inception");

        let results = repo.search("incep", 10).unwrap();
        assert_eq!(titles(&results), vec!["Inception", "Return to Inception"]);
    }

    #[test]
    fn test_wildcards_match_literally() {
        let (db, repo) = seeded();
        assert!(repo.search("%", 10).unwrap().is_empty());
        assert!(repo.search("_", 10).unwrap().is_empty());
        assert!(repo.search("\\", 10).unwrap().is_empty());

        add_movie(&db, "tmdb:2", "100% Wolf");
        add_movie(&db, "tmdb:3", "1000 Wolves");
        let results = repo.search("100%", 10).unwrap();
        assert_eq!(titles(&results), vec!["100% Wolf"]);
    }
}
