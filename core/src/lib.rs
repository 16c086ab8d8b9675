pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod lookup;
pub mod merge;
pub mod output;
pub mod snapshot;
pub mod status;
pub mod store;
pub mod types;
pub mod verdict;
