//! Sync layer error taxonomy

use crate::query::{MalformedQueryError, ResourceTag};
use crate::remote::{AssetLocator, RemoteError, ResourceId};

/// Errors returned to the view that invoked a read or write
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// Bad view parameters, caught before any remote call
    #[error(transparent)]
    MalformedQuery(#[from] MalformedQueryError),

    #[error("{resource} could not be loaded: {source}")]
    RemoteRead {
        resource: ResourceTag,
        #[source]
        source: RemoteError,
    },

    #[error("{resource} could not be saved: {source}")]
    RemoteWrite {
        resource: ResourceTag,
        #[source]
        source: RemoteError,
    },

    /// Upload failed and the row written before it was removed again
    #[error("Cabin image could not be uploaded and the cabin was not saved: {source}")]
    AssetUpload {
        #[source]
        source: RemoteError,
    },

    /// Upload failed and removing the row failed too: the row now points at
    /// an asset that does not exist
    #[error(
        "Cabin image could not be uploaded and cabin {cabin_id} could not be removed; \
         it references missing asset {locator}: {compensation}"
    )]
    CompensationFailure {
        cabin_id: ResourceId,
        locator: AssetLocator,
        upload: RemoteError,
        #[source]
        compensation: RemoteError,
    },

    /// Cabin fields rejected locally, nothing was sent
    #[error("Invalid cabin: {0}")]
    InvalidCabin(String),
}

impl SyncError {
    pub fn read(resource: ResourceTag) -> impl FnOnce(RemoteError) -> SyncError {
        move |source| SyncError::RemoteRead { resource, source }
    }

    pub fn write(resource: ResourceTag) -> impl FnOnce(RemoteError) -> SyncError {
        move |source| SyncError::RemoteWrite { resource, source }
    }

    /// Remote state is inconsistent and needs an operator, not just a retry
    pub fn is_integrity_event(&self) -> bool {
        matches!(self, SyncError::CompensationFailure { .. })
    }

    /// Whether re-invoking the same action may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::RemoteRead { source, .. }
            | SyncError::RemoteWrite { source, .. }
            | SyncError::AssetUpload { source } => source.is_transient(),
            SyncError::MalformedQuery(_)
            | SyncError::CompensationFailure { .. }
            | SyncError::InvalidCabin(_) => false,
        }
    }
}
