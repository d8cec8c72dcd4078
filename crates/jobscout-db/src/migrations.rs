//! Schema creation and additive migrations, raw SQL run at startup.
//!
//! Column additions are attempted unconditionally so a database written by
//! an older build picks up new columns on open. A "duplicate column"
//! failure means the column is already there and is skipped; any other
//! failure is a genuine structural error and propagates.

use sqlx::SqlitePool;
use tracing::{debug, error};

use jobscout_core::error::AppError;

const CREATE_LISTINGS: &str = r#"
    CREATE TABLE IF NOT EXISTS listings (
        identity TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        company TEXT NOT NULL,
        location TEXT NOT NULL,
        source TEXT,
        url TEXT,
        job_type TEXT,
        is_remote BOOLEAN,
        level TEXT,
        description TEXT,
        date_posted DATE,
        min_salary REAL,
        max_salary REAL,
        currency TEXT,
        company_url TEXT,
        first_seen DATE NOT NULL,
        last_seen DATE NOT NULL,
        relevance_score INTEGER DEFAULT 0,
        applied BOOLEAN DEFAULT FALSE
    )
"#;

const CREATE_LAST_SEEN_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_listings_last_seen ON listings(last_seen)";

/// Columns added after the first release, for databases created before
/// they existed.
const ADD_COLUMNS: &[&str] = &[
    "ALTER TABLE listings ADD COLUMN source TEXT",
    "ALTER TABLE listings ADD COLUMN job_type TEXT",
    "ALTER TABLE listings ADD COLUMN is_remote BOOLEAN",
    "ALTER TABLE listings ADD COLUMN level TEXT",
    "ALTER TABLE listings ADD COLUMN description TEXT",
    "ALTER TABLE listings ADD COLUMN date_posted DATE",
    "ALTER TABLE listings ADD COLUMN min_salary REAL",
    "ALTER TABLE listings ADD COLUMN max_salary REAL",
    "ALTER TABLE listings ADD COLUMN currency TEXT",
    "ALTER TABLE listings ADD COLUMN company_url TEXT",
];

pub async fn run(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(CREATE_LISTINGS)
        .execute(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Schema creation failed: {e}")))?;

    sqlx::query(CREATE_LAST_SEEN_INDEX)
        .execute(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Index creation failed: {e}")))?;

    for statement in ADD_COLUMNS {
        if let Err(e) = sqlx::query(statement).execute(pool).await {
            let message = e.to_string().to_lowercase();
            if message.contains("duplicate column") || message.contains("already exists") {
                debug!(statement, "column already present, skipping");
            } else {
                error!(statement, error = %e, "migration failed");
                return Err(AppError::DatabaseError(format!("Migration failed: {e}")));
            }
        }
    }

    Ok(())
}
