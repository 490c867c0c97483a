//! Shared setup for the database integration tests.
//!
//! The tests need a running PostgreSQL reachable through `DB_URL` (a `.env`
//! file at the workspace root works). They are ignored by default:
//!
//! cargo test -p database -- --ignored

#![allow(dead_code)]

use core_types::{Account, CreateAccountParams};
use database::Store;
use rand::Rng;
use rand::seq::SliceRandom;

const CURRENCIES: [&str; 3] = ["USD", "EUR", "CAD"];
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Connects with the application settings and brings the schema up to date.
///
/// `load_config` finds a `.env` file in any parent directory, so the one at
/// the workspace root is picked up from the crate directory.
pub async fn setup_store() -> Store {
    let settings = configuration::load_config().expect("Failed to load settings");
    let pool = database::connect(&settings)
        .await
        .expect("Failed to connect to test database");
    database::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    Store::new(pool)
}

pub fn random_owner() -> String {
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn random_money() -> i64 {
    rand::thread_rng().gen_range(0..=1000)
}

pub fn random_currency() -> String {
    CURRENCIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("USD")
        .to_string()
}

pub async fn create_account_with_balance(store: &Store, balance: i64) -> Account {
    let arg = CreateAccountParams {
        owner: random_owner(),
        balance,
        currency: random_currency(),
    };

    let account = store.create_account(&arg).await.unwrap();
    assert_eq!(account.owner, arg.owner);
    assert_eq!(account.balance, arg.balance);
    assert_eq!(account.currency, arg.currency);
    assert!(account.id > 0);
    account
}

pub async fn create_random_account(store: &Store) -> Account {
    create_account_with_balance(store, random_money()).await
}
