pub mod export;
pub mod filter;
pub mod manager;
pub mod parser;
pub mod store;
