//! Mutation Dispatcher
//!
//! Issues single writes and evicts every cached query of the touched
//! resource once the remote store confirms them. Cached rows are never
//! patched locally; views re-read after invalidation.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use super::errors::SyncError;
use crate::cache::QueryCache;
use crate::query::ResourceTag;
use crate::remote::{RemoteError, RemoteStore, ResourceId};

pub struct MutationDispatcher {
    store: Arc<dyn RemoteStore>,
    cache: Arc<QueryCache>,
}

impl MutationDispatcher {
    pub fn new(store: Arc<dyn RemoteStore>, cache: Arc<QueryCache>) -> Self {
        Self { store, cache }
    }

    /// Await `write`; invalidate `tag` only if it succeeded
    pub async fn execute<T, Fut>(&self, tag: ResourceTag, write: Fut) -> Result<T, SyncError>
    where
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        match write.await {
            Ok(value) => {
                self.cache.invalidate(tag);
                Ok(value)
            }
            Err(e) => {
                warn!(resource = %tag, error = %e, "Write rejected, cache untouched");
                Err(SyncError::write(tag)(e))
            }
        }
    }

    pub async fn delete_booking(&self, id: ResourceId) -> Result<(), SyncError> {
        self.execute(ResourceTag::Bookings, self.store.delete_booking(id))
            .await?;
        info!(booking_id = id, "Deleted booking");
        Ok(())
    }

    pub async fn delete_cabin(&self, id: ResourceId) -> Result<(), SyncError> {
        self.execute(ResourceTag::Cabins, self.store.delete_cabin_row(id))
            .await?;
        info!(cabin_id = id, "Deleted cabin");
        Ok(())
    }
}
