//! Transactional Asset Writer
//!
//! Creates or edits a cabin whose row may reference an image in the asset
//! bucket. The table and the bucket share no transaction, so the write runs
//! as a fixed sequence:
//!
//! 1. persist the row, already pointing at the image's final locator
//! 2. upload the image, only if it is not stored yet
//! 3. if the upload failed, delete the row again
//!
//! A failed step 3 leaves a row referencing a missing image. That outcome is
//! reported as [`SyncError::CompensationFailure`] and logged as an integrity
//! event, never folded into an ordinary upload failure.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::errors::SyncError;
use crate::cache::QueryCache;
use crate::query::ResourceTag;
use crate::remote::{AssetLocator, AssetPayload, Cabin, CabinDraft, ImageSource, RemoteStore, WriteIntent};

/// Used when the original file name sanitizes to nothing
const FALLBACK_ASSET_NAME: &str = "asset";

/// How the image of a write is handled
#[derive(Debug)]
enum AssetMode {
    /// No image at all
    Absent,
    /// Image already in the bucket, keep its locator
    Resident(AssetLocator),
    /// New image, uploaded under `name` after the row is written
    Foreign {
        name: String,
        locator: AssetLocator,
        payload: AssetPayload,
    },
}

impl AssetMode {
    fn locator(&self) -> Option<AssetLocator> {
        match self {
            AssetMode::Absent => None,
            AssetMode::Resident(locator) => Some(locator.clone()),
            AssetMode::Foreign { locator, .. } => Some(locator.clone()),
        }
    }
}

pub struct TransactionalAssetWriter {
    store: Arc<dyn RemoteStore>,
    cache: Arc<QueryCache>,
}

impl TransactionalAssetWriter {
    pub fn new(store: Arc<dyn RemoteStore>, cache: Arc<QueryCache>) -> Self {
        Self { store, cache }
    }

    /// Create (`intent.id` None) or update a cabin and its image
    pub async fn write(&self, intent: WriteIntent) -> Result<Cabin, SyncError> {
        validate(&intent.fields)?;
        let mode = self.asset_mode(intent.fields.image.clone())?;
        let row = intent.fields.to_row(mode.locator());

        debug!(cabin_id = ?intent.id, asset_mode = mode_name(&mode), "Persisting cabin row");
        let cabin = self
            .store
            .persist_cabin_row(&row, intent.id)
            .await
            .map_err(|e| {
                warn!(cabin_id = ?intent.id, error = %e, "Cabin row write failed");
                SyncError::write(ResourceTag::Cabins)(e)
            })?;

        // The row exists from here on, whatever happens to the upload
        let result = match mode {
            AssetMode::Absent | AssetMode::Resident(_) => Ok(cabin),
            AssetMode::Foreign {
                name,
                locator,
                payload,
            } => self.upload_or_compensate(cabin, &name, locator, &payload).await,
        };

        self.cache.invalidate(ResourceTag::Cabins);
        if let Ok(cabin) = &result {
            info!(cabin_id = cabin.id, created = intent.id.is_none(), "Saved cabin");
        }
        result
    }

    async fn upload_or_compensate(
        &self,
        cabin: Cabin,
        name: &str,
        locator: AssetLocator,
        payload: &AssetPayload,
    ) -> Result<Cabin, SyncError> {
        let upload = match self.store.upload_asset(name, payload).await {
            Ok(()) => {
                debug!(cabin_id = cabin.id, asset = name, size = payload.bytes.len(), "Uploaded cabin image");
                return Ok(cabin);
            }
            Err(e) => e,
        };

        match self.store.delete_cabin_row(cabin.id).await {
            Ok(()) => {
                warn!(
                    cabin_id = cabin.id,
                    asset = name,
                    error = %upload,
                    "Image upload failed, cabin row removed"
                );
                Err(SyncError::AssetUpload { source: upload })
            }
            Err(compensation) => {
                error!(
                    integrity_event = true,
                    cabin_id = cabin.id,
                    locator = %locator,
                    upload_error = %upload,
                    compensation_error = %compensation,
                    "Image upload failed and cabin row could not be removed; row references a missing asset"
                );
                Err(SyncError::CompensationFailure {
                    cabin_id: cabin.id,
                    locator,
                    upload,
                    compensation,
                })
            }
        }
    }

    fn asset_mode(&self, image: Option<ImageSource>) -> Result<AssetMode, SyncError> {
        let namespace = self.store.namespace();
        match image {
            None => Ok(AssetMode::Absent),
            Some(ImageSource::Resident(locator)) => {
                if namespace.is_resident(&locator) {
                    Ok(AssetMode::Resident(locator))
                } else {
                    Err(SyncError::InvalidCabin(format!(
                        "image {} is not stored in bucket '{}'",
                        locator,
                        namespace.bucket()
                    )))
                }
            }
            Some(ImageSource::Foreign(payload)) => {
                let name = generate_asset_name(&payload.file_name);
                let locator = namespace.locator_for(&name);
                Ok(AssetMode::Foreign {
                    name,
                    locator,
                    payload,
                })
            }
        }
    }
}

/// Collision-free object name: random token plus the file name without path
/// separators
pub fn generate_asset_name(file_name: &str) -> String {
    let sanitized: String = file_name.chars().filter(|c| !matches!(c, '/' | '\\')).collect();
    let sanitized = sanitized.trim();
    let sanitized = if sanitized.is_empty() {
        FALLBACK_ASSET_NAME
    } else {
        sanitized
    };
    format!("{}-{}", Uuid::new_v4().simple(), sanitized)
}

/// Field rules of the cabin form
fn validate(draft: &CabinDraft) -> Result<(), SyncError> {
    let invalid = |msg: &str| Err(SyncError::InvalidCabin(msg.to_string()));

    if draft.name.trim().is_empty() {
        return invalid("name is required");
    }
    if draft.max_capacity < 1 {
        return invalid("capacity should be at least 1");
    }
    if draft.regular_price < 1.0 {
        return invalid("regular price should be at least 1");
    }
    if draft.discount < 0.0 {
        return invalid("discount must not be negative");
    }
    if draft.discount > draft.regular_price {
        return invalid("discount should be less than the regular price");
    }
    if draft.description.trim().is_empty() {
        return invalid("description is required");
    }
    Ok(())
}

fn mode_name(mode: &AssetMode) -> &'static str {
    match mode {
        AssetMode::Absent => "absent",
        AssetMode::Resident(_) => "resident",
        AssetMode::Foreign { .. } => "foreign",
    }
}
