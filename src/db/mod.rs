pub mod models;
pub mod queries;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

use crate::auth::password;
use crate::config::Config;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_indexes",
        include_str!("../../migrations/002_indexes.sql"),
    ),
];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas are per-connection, so apply them to every pooled connection.
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Ensure the configured admin account exists. Returns true if it was created.
pub fn seed_admin(pool: &DbPool, config: &Config) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let admin = &config.admin;
    let email = admin.email.trim().to_lowercase();

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )
        .optional()?;

    if existing.is_some() {
        tracing::info!("Admin user already exists: {}", email);
        return Ok(false);
    }

    let hash = password::hash_password(&admin.password, config.auth.bcrypt_cost)?;
    conn.execute(
        "INSERT INTO users (email, password, name, role, is_admin, verification_status, created_at)
         VALUES (?1, ?2, 'Admin', 'admin', 1, 'verified', ?3)",
        params![email, hash, now_timestamp()],
    )?;

    tracing::info!("Admin user created: {}", email);
    Ok(true)
}

/// Timestamps are stored as RFC 3339 text in UTC.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
