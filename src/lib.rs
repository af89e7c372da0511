//! cabinsync - cached, paginated reads and transactional writes against a
//! hosted table + asset storage backend

pub mod cache;
pub mod config;
pub mod query;
pub mod remote;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use remote::{RemoteError, RemoteStore, RestClient};
pub use sync::{SyncClient, SyncError};
