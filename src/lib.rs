pub mod collector;
pub mod decoder;
pub mod fetch;
pub mod ledger;
pub mod output;
pub mod provider;
pub mod stats;
