//! Remote resource client for the table and storage services

pub mod client;
pub mod errors;
pub mod store;
pub mod types;

pub use client::RestClient;
pub use errors::RemoteError;
pub use store::RemoteStore;
pub use types::*;
