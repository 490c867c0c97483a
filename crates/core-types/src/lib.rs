pub mod enums;
pub mod error;
pub mod params;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::EntrySide;
pub use error::CoreError;
pub use params::{
    AddAccountBalanceParams, BalanceDelta, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, ListAccountsParams, ListEntriesParams, ListTransfersParams,
    TransferTxParams, TransferTxResult, UpdateAccountParams,
};
pub use structs::{Account, Entry, Transfer};
