use serde::{Deserialize, Serialize};

/// Which side of a transfer an entry is posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntrySide {
    Debit,
    Credit,
}

impl EntrySide {
    /// Returns the signed amount posted to the ledger for a transfer of `amount`.
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            EntrySide::Debit => -amount,
            EntrySide::Credit => amount,
        }
    }
}
