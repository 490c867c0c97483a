use std::time::Duration;
use thiserror::Error;

/// SQLSTATE raised when concurrent transactions cannot be serialized.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE raised when the server breaks a lock cycle.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE raised when an insert references a missing row.
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE class shared by every integrity constraint violation.
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";
/// SQLSTATE class for a broken or refused client connection.
const CONNECTION_EXCEPTION_CLASS: &str = "08";
/// SQLSTATE prefix for a server shutting down or ending the session
/// (`admin_shutdown`, `crash_shutdown`, `cannot_connect_now` and friends).
const OPERATOR_INTERVENTION_PREFIX: &str = "57P0";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load configuration for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("The requested data was not found in the database.")]
    NotFound,

    #[error("Concurrent update conflict, the transaction can be retried: {0}")]
    Conflict(#[source] sqlx::Error),

    #[error("Constraint violation: {0}")]
    Constraint(#[source] sqlx::Error),

    #[error("Failed to reach the database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("tx err: {source}, rb err: {rollback}")]
    Rollback {
        source: Box<DbError>,
        rollback: sqlx::Error,
    },

    #[error("Transaction cancelled after {0:?}, outcome unknown if the deadline hit during commit")]
    Cancelled(Duration),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Migration file error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// True when re-running the whole unit of work from scratch may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Conflict(_) => true,
            DbError::Rollback { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Reinterprets a foreign-key violation raised by an insert as a missing
    /// referenced row.
    pub(crate) fn missing_reference(self) -> Self {
        match self {
            DbError::Constraint(sqlx::Error::Database(ref e))
                if e.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) =>
            {
                DbError::NotFound
            }
            other => other,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
            _ => None,
        };

        match code.as_deref() {
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED) => return DbError::Conflict(err),
            Some(code) if code.starts_with(INTEGRITY_CONSTRAINT_CLASS) => {
                return DbError::Constraint(err);
            }
            Some(code)
                if code.starts_with(CONNECTION_EXCEPTION_CLASS)
                    || code.starts_with(OPERATOR_INTERVENTION_PREFIX) =>
            {
                return DbError::Connection(err);
            }
            _ => {}
        }

        match err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            e @ (sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Protocol(_)) => DbError::Connection(e),
            e => DbError::Query(e),
        }
    }
}

impl From<core_types::CoreError> for DbError {
    fn from(err: core_types::CoreError) -> Self {
        DbError::InvalidInput(err.to_string())
    }
}
