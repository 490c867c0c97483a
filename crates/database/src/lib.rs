//! # Simplebank Database Crate
//!
//! This crate owns everything that talks to PostgreSQL: the ledger queries,
//! the transaction executor and the funds-transfer transaction built on them.
//!
//! ## Architectural Principles
//!
//! - **Explicit transaction scope:** queries run on a `Queries` view that borrows
//!   one connection. Inside `Store::exec_tx` that connection is the open
//!   transaction, so the unit of work never reaches for ambient state.
//! - **Locking in the database:** concurrent transfers coordinate only through
//!   PostgreSQL row locks, taken in ascending account id order.
//! - **Asynchronous & Pooled:** all operations are async and share a `PgPool`.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: pool setup and embedded schema migrations.
//! - `Store`: `exec_tx`, `transfer_tx` and the standalone ledger queries.
//! - `Queries`: the single-statement ledger operations.
//! - `migrator`: the step-wise migration actions behind the `simplebank` binary.
//! - `DbError`: the error taxonomy shared by all of the above.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod migrator;
pub mod queries;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use migrator::MigrationOutcome;
pub use queries::Queries;
pub use store::Store;
