use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use jobscout_core::config::StoreConfig;
use jobscout_core::error::AppError;

use crate::migrations;
use crate::repository::ListingRepository;

/// Store facade — owns the SQLite pool, runs migrations, and hands out
/// the listing repository.
///
/// The store is opened in WAL journal mode so concurrent readers (exports,
/// stats queries) never block the single writer.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the SQLite database at the configured path.
    pub async fn connect(config: &StoreConfig) -> Result<Self, AppError> {
        let path = Path::new(&config.path);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::DatabaseError(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))
            .map_err(|e| AppError::DatabaseError(format!("Invalid database path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the schema if needed and apply pending column additions.
    pub async fn migrate(&self) -> Result<(), AppError> {
        migrations::run(&self.pool).await
    }

    /// Get a [`ListingRepository`] backed by this pool.
    pub fn listings(&self) -> ListingRepository {
        ListingRepository::new(self.pool.clone())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
