pub mod config;
pub mod filter;
pub mod stats;
pub mod transaction;
