use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

use super::migrations::Migrator;
use super::seed::DEMO_DATA;

/// SQLite in-memory database identifier
const MEMORY_DB_PATH: &str = ":memory:";

/// Per-connection setup: foreign keys are off by default in SQLite
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

/// File databases run in WAL mode so readers never block the single writer
fn init_file_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CONNECTION_PRAGMAS)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    Ok(())
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database wrapper with connection pooling support
#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    /// Create a new database connection pool
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();

        // Every in-memory connection is its own database, so the pool is
        // limited to a single connection.
        let pool = if path_str.trim().eq_ignore_ascii_case(MEMORY_DB_PATH) {
            let manager = SqliteConnectionManager::memory()
                .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
            Pool::builder().max_size(1).build(manager)
        } else {
            let manager = SqliteConnectionManager::file(path).with_init(init_file_connection);
            Pool::new(manager)
        }
        .context("Failed to create database connection pool")?;

        Ok(Self { pool })
    }

    /// Create an in-memory database pool (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(MEMORY_DB_PATH)
    }

    /// Apply pending schema migrations, returning the versions applied
    pub fn initialize(&self) -> Result<Vec<i64>> {
        let mut conn = self.connection()?;
        Migrator::new()
            .run(&mut conn)
            .context("Failed to migrate database schema")
    }

    /// Seed the database with demo profiles and media items
    pub fn seed_demo_data(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(DEMO_DATA)
            .context("Failed to seed demo data")?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn connection(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .context("Failed to get database connection from pool")
    }
}
