pub mod config;
pub mod db;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod models;
pub mod reindex;
pub mod search;
pub mod store;
pub mod task;
