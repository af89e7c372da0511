//! Remote store types
//!
//! Rows exchanged with the table service, asset payloads and locators for the
//! storage service.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize an amount that might be encoded as a number, a string or null.
/// Numeric columns can come back as strings (e.g. "250.00") depending on the
/// column type, and optional amounts come back as null.
fn deserialize_flexible_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    struct FlexibleAmountVisitor;

    impl<'de> de::Visitor<'de> for FlexibleAmountVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a number, a string containing a number, or null")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
            Ok(value)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
            value.trim().parse::<f64>().map_err(de::Error::custom)
        }

        fn visit_none<E: de::Error>(self) -> Result<f64, E> {
            Ok(0.0)
        }

        fn visit_unit<E: de::Error>(self) -> Result<f64, E> {
            Ok(0.0)
        }
    }

    deserializer.deserialize_any(FlexibleAmountVisitor)
}

/// Identifier of a row in the table service
pub type ResourceId = i64;

/// One page of a collection plus the size of the whole (filtered) collection
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Unconfirmed,
    CheckedIn,
    CheckedOut,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Unconfirmed => "unconfirmed",
            BookingStatus::CheckedIn => "checked-in",
            BookingStatus::CheckedOut => "checked-out",
        }
    }
}

/// Cabin columns embedded in a booking row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CabinRef {
    pub name: String,
}

/// Guest columns embedded in a booking row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRef {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Booking row as listed by the bookings view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: ResourceId,
    #[serde(default, rename = "created_at")]
    pub created_at: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub num_nights: u32,
    #[serde(default)]
    pub num_guests: Option<u32>,
    pub status: BookingStatus,
    #[serde(deserialize_with = "deserialize_flexible_amount")]
    pub total_price: f64,
    #[serde(default, rename = "cabins")]
    pub cabin: Option<CabinRef>,
    #[serde(default, rename = "guests")]
    pub guest: Option<GuestRef>,
}

/// Where assets live: base address plus bucket
///
/// A locator is resident when it already points into this namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobNamespace {
    base_url: String,
    bucket: String,
}

impl BlobNamespace {
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Public prefix every asset of the bucket shares, with trailing slash
    fn public_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/{}/", self.base_url, self.bucket)
    }

    /// Public locator an asset stored under `name` will have
    pub fn locator_for(&self, name: &str) -> AssetLocator {
        AssetLocator(format!("{}{}", self.public_prefix(), urlencoding::encode(name)))
    }

    /// Whether `locator` names an object inside this bucket
    pub fn is_resident(&self, locator: &AssetLocator) -> bool {
        locator
            .0
            .strip_prefix(&self.public_prefix())
            .is_some_and(|name| !name.is_empty())
    }
}

/// Opaque reference to an asset in the storage service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetLocator(String);

impl AssetLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local file contents waiting to be uploaded
#[derive(Clone, PartialEq, Eq)]
pub struct AssetPayload {
    /// Original file name as picked by the user
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for AssetPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetPayload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl AssetPayload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a payload from disk, guessing the content type from the extension
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = content_type_for(path);
        Ok(Self::new(file_name, content_type, bytes))
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

/// Image of a cabin being written
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Already stored, keep the existing locator
    Resident(AssetLocator),
    /// New file, must be uploaded
    Foreign(AssetPayload),
}

/// Cabin as stored in the table service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cabin {
    pub id: ResourceId,
    pub name: String,
    pub max_capacity: u32,
    #[serde(deserialize_with = "deserialize_flexible_amount")]
    pub regular_price: f64,
    #[serde(default, deserialize_with = "deserialize_flexible_amount")]
    pub discount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<AssetLocator>,
}

/// Editable cabin fields, as filled in by the create/edit form
#[derive(Debug, Clone, PartialEq)]
pub struct CabinDraft {
    pub name: String,
    pub max_capacity: u32,
    pub regular_price: f64,
    pub discount: f64,
    pub description: String,
    pub image: Option<ImageSource>,
}

impl CabinDraft {
    /// Draft pre-filled from an existing cabin, keeping its stored image
    pub fn from_cabin(cabin: &Cabin) -> Self {
        Self {
            name: cabin.name.clone(),
            max_capacity: cabin.max_capacity,
            regular_price: cabin.regular_price,
            discount: cabin.discount,
            description: cabin.description.clone(),
            image: cabin.image.clone().map(ImageSource::Resident),
        }
    }

    /// Row to persist, with the image resolved to its final locator
    pub fn to_row(&self, image: Option<AssetLocator>) -> CabinRow {
        CabinRow {
            name: self.name.clone(),
            max_capacity: self.max_capacity,
            regular_price: self.regular_price,
            discount: self.discount,
            description: self.description.clone(),
            image,
        }
    }
}

/// Cabin columns written to the table service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CabinRow {
    pub name: String,
    pub max_capacity: u32,
    pub regular_price: f64,
    pub discount: f64,
    pub description: String,
    pub image: Option<AssetLocator>,
}

/// Create (no id) or update (id) of a cabin
#[derive(Debug, Clone, PartialEq)]
pub struct WriteIntent {
    pub fields: CabinDraft,
    pub id: Option<ResourceId>,
}

impl WriteIntent {
    pub fn create(fields: CabinDraft) -> Self {
        Self { fields, id: None }
    }

    pub fn update(id: ResourceId, fields: CabinDraft) -> Self {
        Self {
            fields,
            id: Some(id),
        }
    }
}

/// Total row count from a `Content-Range` header (`0-9/17`, `*/0`)
///
/// Returns None when the header carries no total (`0-9/*`) or is malformed.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;
    total.parse::<u64>().ok()
}
