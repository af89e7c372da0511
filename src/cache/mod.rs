//! Query caching layer
//!
//! One `CacheCoordinator` per cached shape, grouped in a `QueryCache` that
//! fans tag invalidation out to all of them.

pub mod coordinator;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

pub use coordinator::{CacheCoordinator, CacheStats};

use crate::query::{QueryFingerprint, ResourceTag};
use crate::remote::{Booking, Cabin, Page};

/// Process-wide set of query caches
pub struct QueryCache {
    /// Booking list pages by fingerprint
    pub booking_pages: Arc<CacheCoordinator<QueryFingerprint, Page<Booking>>>,
    /// Whole cabin collection
    pub cabins: Arc<CacheCoordinator<ResourceTag, Vec<Cabin>>>,
}

impl QueryCache {
    /// Entries expire `ttl` after they were fetched
    pub fn new(ttl: Duration) -> Self {
        Self {
            booking_pages: Arc::new(CacheCoordinator::new("booking_pages", ttl)),
            cabins: Arc::new(CacheCoordinator::new("cabins", ttl)),
        }
    }

    /// Evict every cached query tagged `tag`, whatever its filter, sort or page
    pub fn invalidate(&self, tag: ResourceTag) {
        self.booking_pages.invalidate(tag);
        self.cabins.invalidate(tag);
        info!(tag = %tag, "Invalidated cached queries");
    }

    pub fn clear(&self) {
        self.booking_pages.clear();
        self.cabins.clear();
    }

    pub fn log_metrics(&self) {
        self.booking_pages.log_metrics();
        self.cabins.log_metrics();
    }
}
