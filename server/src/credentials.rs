use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Keyed lookup behind register and login. The connection handler only sees
/// the boolean outcome.
pub trait CredentialStore: Send + Sync {
    /// Returns false when the username is already taken.
    fn register(&self, username: &str, password: &str) -> Result<bool, CredentialError>;

    fn verify(&self, username: &str, password: &str) -> Result<bool, CredentialError>;
}

pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let conn = Connection::open(path.as_ref())?;
        log::info!("Opened credential database {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, CredentialError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CredentialError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl CredentialStore for SqliteCredentialStore {
    fn register(&self, username: &str, password: &str) -> Result<bool, CredentialError> {
        let conn = self.conn.lock();
        match conn.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, hash_password(password)],
        ) {
            Ok(_) => {
                log::info!("Registered user {}", username);
                Ok(true)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                log::info!("Username {} is already registered", username);
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn verify(&self, username: &str, password: &str) -> Result<bool, CredentialError> {
        let conn = self.conn.lock();
        let stored: Option<String> = conn
            .query_row(
                "SELECT password_hash FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        Ok(stored.map_or(false, |hash| hash == hash_password(password)))
    }
}
