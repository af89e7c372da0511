//! Server-state synchronization
//!
//! Reads go through the query cache, writes invalidate it. [`SyncClient`]
//! wires every component to one shared store and cache.

pub mod asset_writer;
pub mod cabins;
pub mod errors;
pub mod list;
pub mod mutation;

use std::sync::Arc;
use std::time::Duration;

pub use asset_writer::{generate_asset_name, TransactionalAssetWriter};
pub use cabins::CabinDirectory;
pub use errors::SyncError;
pub use list::{ListState, ListSynchronizer};
pub use mutation::MutationDispatcher;

use crate::cache::QueryCache;
use crate::remote::RemoteStore;

/// All sync components sharing one store and one cache
pub struct SyncClient {
    pub cache: Arc<QueryCache>,
    pub bookings: ListSynchronizer,
    pub cabins: CabinDirectory,
    pub mutations: MutationDispatcher,
    pub writer: TransactionalAssetWriter,
}

impl SyncClient {
    pub fn new(store: Arc<dyn RemoteStore>, cache_ttl: Duration) -> Self {
        let cache = Arc::new(QueryCache::new(cache_ttl));
        Self {
            bookings: ListSynchronizer::new(Arc::clone(&store), &cache),
            cabins: CabinDirectory::new(Arc::clone(&store), &cache),
            mutations: MutationDispatcher::new(Arc::clone(&store), Arc::clone(&cache)),
            writer: TransactionalAssetWriter::new(store, Arc::clone(&cache)),
            cache,
        }
    }
}
