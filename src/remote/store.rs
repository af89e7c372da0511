//! Remote store interface
//!
//! The only seam through which the sync layer performs network I/O.

use async_trait::async_trait;

use super::errors::RemoteError;
use super::types::{AssetPayload, BlobNamespace, Booking, Cabin, CabinRow, Page, ResourceId};
use crate::query::{Filter, Sort};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Namespace uploaded assets are published under
    fn namespace(&self) -> &BlobNamespace;

    /// One page of bookings plus the filtered total
    async fn list_bookings(
        &self,
        filter: Option<&Filter>,
        sort: &Sort,
        page: u32,
    ) -> Result<Page<Booking>, RemoteError>;

    async fn delete_booking(&self, id: ResourceId) -> Result<(), RemoteError>;

    async fn list_cabins(&self) -> Result<Vec<Cabin>, RemoteError>;

    /// Insert when `id` is None, update otherwise; returns the stored row
    async fn persist_cabin_row(
        &self,
        row: &CabinRow,
        id: Option<ResourceId>,
    ) -> Result<Cabin, RemoteError>;

    async fn delete_cabin_row(&self, id: ResourceId) -> Result<(), RemoteError>;

    /// Store `payload` under `name` in the asset bucket
    async fn upload_asset(&self, name: &str, payload: &AssetPayload) -> Result<(), RemoteError>;
}
