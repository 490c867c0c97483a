use crate::error::DbError;
use crate::queries::Queries;
use core_types::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, EntrySide, ListAccountsParams, ListEntriesParams,
    ListTransfersParams, Transfer, TransferTxParams, TransferTxResult, UpdateAccountParams,
};
use futures::future::BoxFuture;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The `Store` runs ledger queries on their own and composes them into
/// database transactions.
///
/// It holds nothing but the pool, so clones can be handed to as many
/// concurrent tasks as needed; all coordination happens in PostgreSQL.
#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Creates a new `Store` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs `work` inside a new database transaction.
    ///
    /// `work` gets a `Queries` bound to the transaction. The transaction is
    /// committed when `work` succeeds and rolled back when it fails; if the
    /// rollback fails too, both errors are returned in `DbError::Rollback`.
    /// Dropping the returned future before it completes also rolls back.
    pub async fn exec_tx<T, F>(&self, work: F) -> Result<T, DbError>
    where
        F: for<'q, 'c> FnOnce(&'q mut Queries<'c>) -> BoxFuture<'q, Result<T, DbError>>,
    {
        let mut tx = self.pool.begin().await?;
        debug!("Transaction started");

        let outcome = {
            let mut queries = Queries::new(&mut *tx);
            work(&mut queries).await
        };

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                debug!("Transaction committed");
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "Rolling back transaction");
                if let Err(rollback) = tx.rollback().await {
                    error!(error = %err, rollback_error = %rollback, "Transaction rollback failed");
                    return Err(DbError::Rollback {
                        source: Box::new(err),
                        rollback,
                    });
                }
                Err(err)
            }
        }
    }

    /// Moves `amount` from one account to another as a single transaction.
    ///
    /// Creates the transfer record, a debit entry on the sender, a credit entry
    /// on the receiver, and then applies both balance changes. The balance rows
    /// are always locked in ascending account id order, whichever side is
    /// sending, so concurrent transfers over the same accounts cannot deadlock.
    ///
    /// Errors are returned unchanged. A `DbError::Conflict` means nothing was
    /// applied and the whole call may be retried.
    pub async fn transfer_tx(&self, params: TransferTxParams) -> Result<TransferTxResult, DbError> {
        params.validate()?;

        let result = self
            .exec_tx(|q| {
                Box::pin(async move {
                    let transfer = q.create_transfer(params.transfer()).await?;
                    let from_entry = q.create_entry(params.entry(EntrySide::Debit)).await?;
                    let to_entry = q.create_entry(params.entry(EntrySide::Credit)).await?;

                    let [first, second] = params.balance_deltas();
                    let first_account = q.add_account_balance(first.into()).await?;
                    let second_account = q.add_account_balance(second.into()).await?;
                    let (from_account, to_account) = match first.side {
                        EntrySide::Debit => (first_account, second_account),
                        EntrySide::Credit => (second_account, first_account),
                    };

                    Ok(TransferTxResult {
                        transfer,
                        from_entry,
                        to_entry,
                        from_account,
                        to_account,
                    })
                })
            })
            .await?;

        info!(
            transfer_id = result.transfer.id,
            from_account_id = params.from_account_id,
            to_account_id = params.to_account_id,
            amount = params.amount,
            "Transfer committed"
        );
        Ok(result)
    }

    /// Same as `transfer_tx`, but gives up once `timeout` has elapsed.
    ///
    /// On expiry the in-flight transaction is dropped and `DbError::Cancelled`
    /// is returned. A transaction dropped before `COMMIT` was sent rolls back;
    /// if the deadline hit while the commit was in flight, the transfer may
    /// have been applied and the caller must check before retrying.
    pub async fn transfer_tx_with_timeout(
        &self,
        params: TransferTxParams,
        timeout: Duration,
    ) -> Result<TransferTxResult, DbError> {
        match tokio::time::timeout(timeout, self.transfer_tx(params)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    from_account_id = params.from_account_id,
                    to_account_id = params.to_account_id,
                    ?timeout,
                    "Transfer cancelled before commit"
                );
                Err(DbError::Cancelled(timeout))
            }
        }
    }

    // ==========================================================================
    // Standalone queries, each on its own pooled connection
    // ==========================================================================

    pub async fn create_account(&self, arg: &CreateAccountParams) -> Result<Account, DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).create_account(arg).await
    }

    pub async fn get_account(&self, id: i64) -> Result<Account, DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).get_account(id).await
    }

    pub async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).list_accounts(arg).await
    }

    pub async fn update_account(&self, arg: UpdateAccountParams) -> Result<Account, DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).update_account(arg).await
    }

    pub async fn delete_account(&self, id: i64) -> Result<(), DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).delete_account(id).await
    }

    pub async fn add_account_balance(
        &self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).add_account_balance(arg).await
    }

    pub async fn create_entry(&self, arg: CreateEntryParams) -> Result<Entry, DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).create_entry(arg).await
    }

    pub async fn get_entry(&self, id: i64) -> Result<Entry, DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).get_entry(id).await
    }

    pub async fn list_entries(&self, arg: ListEntriesParams) -> Result<Vec<Entry>, DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).list_entries(arg).await
    }

    pub async fn create_transfer(&self, arg: CreateTransferParams) -> Result<Transfer, DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).create_transfer(arg).await
    }

    pub async fn get_transfer(&self, id: i64) -> Result<Transfer, DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).get_transfer(id).await
    }

    pub async fn list_transfers(&self, arg: ListTransfersParams) -> Result<Vec<Transfer>, DbError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut *conn).list_transfers(arg).await
    }
}
