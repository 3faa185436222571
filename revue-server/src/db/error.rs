use rusqlite::ffi;
use thiserror::Error;

/// Failure classes reported by the stored-procedure layer
#[derive(Error, Debug)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A referenced row does not exist
    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                DbError::ForeignKey(
                    msg.clone()
                        .unwrap_or_else(|| "FOREIGN KEY constraint failed".to_string()),
                )
            }
            rusqlite::Error::SqliteFailure(e, msg)
                if e.extended_code == ffi::SQLITE_CONSTRAINT_CHECK
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_TRIGGER =>
            {
                DbError::Invalid(
                    msg.clone()
                        .unwrap_or_else(|| "CHECK constraint failed".to_string()),
                )
            }
            _ => DbError::Sqlite(err),
        }
    }
}
