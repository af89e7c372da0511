//! List Synchronizer
//!
//! Serves one page of the filtered, sorted bookings collection through the
//! query cache and prefetches the neighboring pages so next/previous
//! navigation is instant.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::errors::SyncError;
use crate::cache::{CacheCoordinator, QueryCache};
use crate::query::{page_count, FingerprintBuilder, Pagination, QueryFingerprint, RawQuery};
use crate::remote::{Booking, Page, RemoteStore};

/// What a list view renders
#[derive(Debug, Clone, Default)]
pub struct ListState {
    /// Query the state belongs to, None before the first request
    pub fingerprint: Option<QueryFingerprint>,
    /// Last page loaded for `fingerprint`
    pub page: Option<Arc<Page<Booking>>>,
    /// A foreground load is in progress; prefetches never set this
    pub is_loading: bool,
    pub error: Option<SyncError>,
}

impl ListState {
    pub fn rows(&self) -> &[Booking] {
        self.page.as_ref().map(|p| p.rows.as_slice()).unwrap_or(&[])
    }

    /// Unknown until the page has loaded
    pub fn total_count(&self) -> Option<u64> {
        self.page.as_ref().map(|p| p.total_count)
    }

    pub fn pagination(&self) -> Option<Pagination> {
        let fingerprint = self.fingerprint.as_ref()?;
        let total = self.total_count()?;
        Some(Pagination::new(fingerprint.page(), total))
    }
}

pub struct ListSynchronizer {
    store: Arc<dyn RemoteStore>,
    pages: Arc<CacheCoordinator<QueryFingerprint, Page<Booking>>>,
    builder: FingerprintBuilder,
    state: watch::Sender<ListState>,
    prefetches: Mutex<JoinSet<()>>,
}

impl ListSynchronizer {
    pub fn new(store: Arc<dyn RemoteStore>, cache: &QueryCache) -> Self {
        let (state, _) = watch::channel(ListState::default());
        Self {
            store,
            pages: Arc::clone(&cache.booking_pages),
            builder: FingerprintBuilder::bookings(),
            state,
            prefetches: Mutex::new(JoinSet::new()),
        }
    }

    /// Observe the view state, including loading transitions
    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.state.subscribe()
    }

    /// Load the page described by `raw` and prefetch its neighbors
    pub async fn sync(&self, raw: &RawQuery) -> ListState {
        let fingerprint = match self.builder.build(raw) {
            Ok(fp) => fp,
            Err(e) => {
                warn!(error = %e, "Rejected list parameters");
                return self.publish(ListState {
                    error: Some(SyncError::from(e)),
                    ..ListState::default()
                });
            }
        };

        self.begin_load(&fingerprint);

        let result = self
            .pages
            .get_or_fetch(
                fingerprint.clone(),
                fingerprint.tag(),
                page_loader(Arc::clone(&self.store), fingerprint.clone()),
            )
            .await;

        match result {
            Ok(page) => {
                self.prefetch_neighbors(&fingerprint, page.total_count).await;
                self.publish(ListState {
                    fingerprint: Some(fingerprint),
                    page: Some(page),
                    is_loading: false,
                    error: None,
                })
            }
            Err(e) => self.publish(ListState {
                fingerprint: Some(fingerprint),
                page: None,
                is_loading: false,
                error: Some(e),
            }),
        }
    }

    /// Wait for every prefetch issued so far
    pub async fn settle_prefetches(&self) {
        let mut prefetches = std::mem::take(&mut *self.prefetches.lock().await);
        while let Some(result) = prefetches.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Prefetch task aborted");
            }
        }
    }

    /// Flag a foreground load unless the page is already cached; returns
    /// whether the flag was raised
    fn begin_load(&self, fingerprint: &QueryFingerprint) -> bool {
        if self.pages.contains(fingerprint) {
            return false;
        }
        self.state.send_modify(|state| {
            state.fingerprint = Some(fingerprint.clone());
            state.is_loading = true;
            state.error = None;
        });
        true
    }

    async fn prefetch_neighbors(&self, fingerprint: &QueryFingerprint, total_count: u64) {
        let pages = page_count(total_count);
        let mut neighbors = Vec::with_capacity(2);

        if fingerprint.page() < pages {
            neighbors.extend(fingerprint.next_page());
        }
        neighbors.extend(fingerprint.previous_page());

        let mut prefetches = self.prefetches.lock().await;
        // Drop finished prefetches so the set only holds in-flight ones
        while let Some(result) = prefetches.try_join_next() {
            if let Err(e) = result {
                warn!(error = %e, "Prefetch task aborted");
            }
        }
        for neighbor in neighbors {
            debug!(page = neighbor.page(), page_count = pages, "Prefetching neighbor page");
            let loader = page_loader(Arc::clone(&self.store), neighbor.clone());
            prefetches.spawn(self.pages.prefetch(neighbor.clone(), neighbor.tag(), loader));
        }
    }

    fn publish(&self, state: ListState) -> ListState {
        self.state.send_replace(state.clone());
        state
    }
}

type PageFuture = Pin<Box<dyn Future<Output = Result<Page<Booking>, SyncError>> + Send>>;

fn page_loader(
    store: Arc<dyn RemoteStore>,
    fingerprint: QueryFingerprint,
) -> impl FnOnce() -> PageFuture + Send + 'static {
    move || {
        Box::pin(async move {
            store
                .list_bookings(fingerprint.filter(), fingerprint.sort(), fingerprint.page())
                .await
                .map_err(SyncError::read(fingerprint.tag()))
        })
    }
}
