//! HTTP transaction log with a multi-predicate filter engine,
//! deduplication and text export, served over a REST API.

pub mod api;
pub mod capture;
pub mod models;
pub mod utils;
