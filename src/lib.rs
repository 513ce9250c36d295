pub mod app_state;
pub mod cache;
pub mod channel;
pub mod config;
pub mod dom;
pub mod fetcher;
pub mod highlight;
pub mod query;
pub mod routes;
