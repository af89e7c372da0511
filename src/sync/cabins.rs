//! Cached cabin collection

use std::sync::Arc;

use super::errors::SyncError;
use crate::cache::{CacheCoordinator, QueryCache};
use crate::query::ResourceTag;
use crate::remote::{Cabin, RemoteStore};

/// Reads the whole cabin collection, one cache entry for all of it
pub struct CabinDirectory {
    store: Arc<dyn RemoteStore>,
    cabins: Arc<CacheCoordinator<ResourceTag, Vec<Cabin>>>,
}

impl CabinDirectory {
    pub fn new(store: Arc<dyn RemoteStore>, cache: &QueryCache) -> Self {
        Self {
            store,
            cabins: Arc::clone(&cache.cabins),
        }
    }

    pub async fn cabins(&self) -> Result<Arc<Vec<Cabin>>, SyncError> {
        let store = Arc::clone(&self.store);
        self.cabins
            .get_or_fetch(ResourceTag::Cabins, ResourceTag::Cabins, || async move {
                store
                    .list_cabins()
                    .await
                    .map_err(SyncError::read(ResourceTag::Cabins))
            })
            .await
    }
}
