//! Bazaar: a nickname-login marketplace with a transactional buy/sell engine
//! and a caching HTTP client.

pub mod account;
pub mod api;
pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod metrics;
pub mod rate_limit;
pub mod server;
pub mod session;
pub mod trading;
