use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the bookmark schema in an open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS timeboxes (
            system TEXT NOT NULL,
            tbl TEXT NOT NULL,
            last_updated_timestamp TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (system, tbl)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_timeboxes_updated_at ON timeboxes(updated_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}

/// `bagel init`: create the SQLite database and its schema.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.timebox.path).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}
