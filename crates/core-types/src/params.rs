use crate::enums::EntrySide;
use crate::error::CoreError;
use crate::structs::{Account, Entry, Transfer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAccountParams {
    pub id: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAccountsParams {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAccountBalanceParams {
    pub account_id: i64,
    /// Signed delta added to the stored balance.
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntriesParams {
    pub account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Lists transfers leaving `from_account_id` or arriving at `to_account_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTransfersParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

/// A balance change to apply to one account inside a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
    pub account_id: i64,
    pub side: EntrySide,
    pub amount: i64,
}

impl From<BalanceDelta> for AddAccountBalanceParams {
    fn from(delta: BalanceDelta) -> Self {
        Self {
            account_id: delta.account_id,
            amount: delta.amount,
        }
    }
}

/// The input of a funds transfer between two accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

impl TransferTxParams {
    /// Rejects transfers that can never be valid regardless of database state.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.amount <= 0 {
            return Err(CoreError::InvalidInput(
                "amount".to_string(),
                format!("must be positive, got {}", self.amount),
            ));
        }
        if self.from_account_id == self.to_account_id {
            return Err(CoreError::InvalidInput(
                "to_account_id".to_string(),
                format!("cannot transfer from account {} to itself", self.from_account_id),
            ));
        }
        Ok(())
    }

    pub fn transfer(&self) -> CreateTransferParams {
        CreateTransferParams {
            from_account_id: self.from_account_id,
            to_account_id: self.to_account_id,
            amount: self.amount,
        }
    }

    pub fn entry(&self, side: EntrySide) -> CreateEntryParams {
        let account_id = match side {
            EntrySide::Debit => self.from_account_id,
            EntrySide::Credit => self.to_account_id,
        };
        CreateEntryParams {
            account_id,
            amount: side.signed(self.amount),
        }
    }

    /// Both balance changes of the transfer, sorted by ascending account id.
    ///
    /// Row locks must be taken in this order whatever the direction of the
    /// transfer, otherwise two opposite transfers between the same accounts
    /// can each hold the lock the other is waiting for.
    pub fn balance_deltas(&self) -> [BalanceDelta; 2] {
        let debit = BalanceDelta {
            account_id: self.from_account_id,
            side: EntrySide::Debit,
            amount: EntrySide::Debit.signed(self.amount),
        };
        let credit = BalanceDelta {
            account_id: self.to_account_id,
            side: EntrySide::Credit,
            amount: EntrySide::Credit.signed(self.amount),
        };
        let mut deltas = [debit, credit];
        deltas.sort_by_key(|delta| delta.account_id);
        deltas
    }
}

/// Everything written by one successful transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_entry: Entry,
    pub to_entry: Entry,
    pub from_account: Account,
    pub to_account: Account,
}
