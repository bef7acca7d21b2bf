//! Storage layer: SQLite pool setup and schema migrations for the facet index.
//!
//! The pool is the one handle shared between the scan task and the
//! filesystem-query call paths; sqlx serializes access internally, so callers
//! need no extra locking discipline around it.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Opens (creating if needed) the index database behind `database_url`.
///
/// Accepts either a `sqlite:` URL or a bare filesystem path. Failure here is
/// the only fatal storage error: without a store there is nothing to mount.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let mut url = database_url.to_string();
    if !database_url.starts_with("sqlite:") {
        let path = std::path::PathBuf::from(database_url);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let norm = path.to_string_lossy().replace('\\', "/");
        if path.is_absolute() {
            url = format!("sqlite:///{}?mode=rwc", norm.trim_start_matches('/'));
        } else {
            url = format!("sqlite://{}?mode=rwc", norm);
        }
    }
    let mut opts = SqlitePoolOptions::new();
    if url.contains("memory") && !url.contains("cache=shared") {
        // A private in-memory DB exists per connection; keep exactly one.
        opts = opts.max_connections(1);
    } else {
        opts = opts.max_connections(5);
    }
    let pool = opts.connect(&url).await?;
    Ok(pool)
}

/// Applies the migrations under `crates/storage/migrations`.
/// Idempotent; safe to run on every startup.
pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
