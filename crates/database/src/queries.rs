use crate::error::DbError;
use core_types::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams,
    Transfer, UpdateAccountParams,
};
use sqlx::PgConnection;

/// Single-statement CRUD over accounts, entries and transfers.
///
/// `Queries` borrows one connection. Built on a pooled connection every call
/// autocommits; built on a transaction (see `Store::exec_tx`) every call joins
/// that transaction, so the same code serves both cases.
pub struct Queries<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> Queries<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    // ==========================================================================
    // Accounts
    // ==========================================================================

    pub async fn create_account(&mut self, arg: &CreateAccountParams) -> Result<Account, DbError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (owner, balance, currency)
            VALUES ($1, $2, $3)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(&arg.owner)
        .bind(arg.balance)
        .bind(&arg.currency)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(account)
    }

    pub async fn get_account(&mut self, id: i64) -> Result<Account, DbError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, owner, balance, currency, created_at FROM accounts WHERE id = $1 LIMIT 1",
        )
        .bind(id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(account)
    }

    /// Reads an account and holds its row lock until the transaction ends.
    ///
    /// `FOR NO KEY UPDATE` does not conflict with the key-share locks taken by
    /// foreign-key checks when entries and transfers referencing the account are
    /// inserted concurrently.
    pub async fn get_account_for_update(&mut self, id: i64) -> Result<Account, DbError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at FROM accounts
            WHERE id = $1 LIMIT 1
            FOR NO KEY UPDATE
            "#,
        )
        .bind(id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(account)
    }

    pub async fn list_accounts(&mut self, arg: ListAccountsParams) -> Result<Vec<Account>, DbError> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at FROM accounts
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(arg.limit)
        .bind(arg.offset)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(accounts)
    }

    /// Overwrites an account balance. Administrative only; transfers go through
    /// `add_account_balance`.
    pub async fn update_account(&mut self, arg: UpdateAccountParams) -> Result<Account, DbError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts SET balance = $2
            WHERE id = $1
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(arg.id)
        .bind(arg.balance)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(account)
    }

    pub async fn delete_account(&mut self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Adds a signed delta to the stored balance and returns the updated row.
    ///
    /// The UPDATE takes the row lock, so a second transaction adding to the
    /// same account blocks here until the first one commits or rolls back and
    /// then sees the committed balance.
    pub async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, DbError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts SET balance = balance + $1
            WHERE id = $2
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(arg.amount)
        .bind(arg.account_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(account)
    }

    // ==========================================================================
    // Entries
    // ==========================================================================

    pub async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, DbError> {
        let entry = sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(arg.account_id)
        .bind(arg.amount)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).missing_reference())?;
        Ok(entry)
    }

    pub async fn get_entry(&mut self, id: i64) -> Result<Entry, DbError> {
        let entry = sqlx::query_as::<_, Entry>(
            "SELECT id, account_id, amount, created_at FROM entries WHERE id = $1 LIMIT 1",
        )
        .bind(id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(entry)
    }

    pub async fn list_entries(&mut self, arg: ListEntriesParams) -> Result<Vec<Entry>, DbError> {
        let entries = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at FROM entries
            WHERE account_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(arg.account_id)
        .bind(arg.limit)
        .bind(arg.offset)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(entries)
    }

    // ==========================================================================
    // Transfers
    // ==========================================================================

    pub async fn create_transfer(&mut self, arg: CreateTransferParams) -> Result<Transfer, DbError> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(arg.from_account_id)
        .bind(arg.to_account_id)
        .bind(arg.amount)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).missing_reference())?;
        Ok(transfer)
    }

    pub async fn get_transfer(&mut self, id: i64) -> Result<Transfer, DbError> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at FROM transfers
            WHERE id = $1 LIMIT 1
            "#,
        )
        .bind(id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(transfer)
    }

    pub async fn list_transfers(
        &mut self,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, DbError> {
        let transfers = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at FROM transfers
            WHERE from_account_id = $1 OR to_account_id = $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(arg.from_account_id)
        .bind(arg.to_account_id)
        .bind(arg.limit)
        .bind(arg.offset)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(transfers)
    }
}
