pub mod api;
pub mod audit;
pub mod compliance;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod ledger;

pub use error::LedgerError;
pub use ledger::LedgerService;
