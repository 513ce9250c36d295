pub mod client;
pub mod errors;

pub use client::{fetch_page, forwardable_headers};
pub use errors::FetchError;
