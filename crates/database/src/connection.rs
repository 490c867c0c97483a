use crate::error::DbError;
use configuration::Settings;
use sqlx::{PgPool, postgres::PgPoolOptions};

/// Establishes a connection pool to the PostgreSQL database.
///
/// The pool is sized from the settings and can be shared across the whole
/// application; `Store` clones are cheap handles onto it.
pub async fn connect(settings: &Settings) -> Result<PgPool, DbError> {
    let database_url = settings
        .require_db_url()
        .map_err(|e| DbError::ConnectionConfigError(e.to_string()))?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout())
        .connect(database_url)
        .await?;

    tracing::info!(
        max_connections = settings.max_connections,
        "PostgreSQL connection pool established"
    );
    Ok(pool)
}

/// Applies the embedded schema migrations, bringing the database up to date.
///
/// This is what tests and embedding applications use at startup; the
/// `simplebank` binary drives migrations step by step through `migrator`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("../../db/migration").run(pool).await?;
    Ok(())
}
