//! REST table + object storage client
//!
//! Talks to a PostgREST-style table service and the object storage service
//! that sits next to it. Stateless apart from connection settings.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info};

use super::errors::RemoteError;
use super::store::RemoteStore;
use super::types::{
    parse_content_range_total, AssetPayload, BlobNamespace, Booking, Cabin, CabinRow, Page,
    ResourceId,
};
use crate::config::Config;
use crate::query::{row_range, Filter, Sort, ResourceTag};

/// Columns selected for the bookings list, with cabin and guest embedded
const BOOKING_SELECT: &str =
    "id,created_at,startDate,endDate,numNights,numGuests,status,totalPrice,cabins(name),guests(fullName,email)";

/// Ask for a single JSON object instead of an array
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Client for the table and storage services
#[derive(Clone)]
pub struct RestClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Project base URL, without trailing slash
    api_url: String,
    /// Key sent with every request
    api_key: String,
    /// Where uploaded assets are published
    namespace: BlobNamespace,
}

impl RestClient {
    /// Create a client for the given project
    ///
    /// # Arguments
    /// * `api_url` - Project base URL
    /// * `api_key` - API key used for both services
    /// * `bucket` - Storage bucket holding cabin images
    /// * `timeout` - Per-request timeout
    pub fn new(
        api_url: &str,
        api_key: &str,
        bucket: &str,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Request(format!("Failed to create HTTP client: {}", e)))?;

        let namespace = BlobNamespace::new(api_url, bucket);
        info!(api_url = namespace.base_url(), bucket = bucket, "Remote client ready");

        Ok(Self {
            http_client,
            api_url: namespace.base_url().to_string(),
            api_key: api_key.to_string(),
            namespace,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        Self::new(
            &config.api_url,
            &config.api_key,
            &config.asset_bucket,
            config.request_timeout(),
        )
    }

    fn table_url(&self, tag: ResourceTag) -> String {
        format!("{}/rest/v1/{}", self.api_url, tag.as_str())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Turn a non-success response into a RemoteError
    async fn check(response: Response) -> Result<Response, RemoteError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::from_status(status, &body))
    }

    async fn delete_row(&self, tag: ResourceTag, id: ResourceId) -> Result<(), RemoteError> {
        info!(table = %tag, id = id, "Deleting row");

        let response = self
            .authorized(self.http_client.delete(self.table_url(tag)))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;
        Self::check(response).await?;

        info!(table = %tag, id = id, "Row deleted");
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for RestClient {
    fn namespace(&self) -> &BlobNamespace {
        &self.namespace
    }

    async fn list_bookings(
        &self,
        filter: Option<&Filter>,
        sort: &Sort,
        page: u32,
    ) -> Result<Page<Booking>, RemoteError> {
        let (from, to) = row_range(page);
        let mut params = vec![
            ("select".to_string(), BOOKING_SELECT.to_string()),
            (
                "order".to_string(),
                format!("{}.{}", sort.field, sort.direction.as_str()),
            ),
        ];
        if let Some(filter) = filter {
            params.push((filter.field.clone(), format!("eq.{}", filter.value)));
        }

        debug!(filter = ?filter, sort = ?sort, page = page, "Listing bookings");

        let response = self
            .authorized(self.http_client.get(self.table_url(ResourceTag::Bookings)))
            .query(&params)
            .header("Range-Unit", "items")
            .header("Range", format!("{}-{}", from, to))
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = Self::check(response).await?;

        let total_count = response
            .headers()
            .get("Content-Range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| RemoteError::Decode("missing total in Content-Range".to_string()))?;

        let rows: Vec<Booking> = response.json().await?;

        debug!(count = rows.len(), total = total_count, "Listed bookings");
        Ok(Page { rows, total_count })
    }

    async fn delete_booking(&self, id: ResourceId) -> Result<(), RemoteError> {
        self.delete_row(ResourceTag::Bookings, id).await
    }

    async fn list_cabins(&self) -> Result<Vec<Cabin>, RemoteError> {
        let response = self
            .authorized(self.http_client.get(self.table_url(ResourceTag::Cabins)))
            .query(&[("select", "*")])
            .send()
            .await?;
        let cabins: Vec<Cabin> = Self::check(response).await?.json().await?;

        debug!(count = cabins.len(), "Listed cabins");
        Ok(cabins)
    }

    async fn persist_cabin_row(
        &self,
        row: &CabinRow,
        id: Option<ResourceId>,
    ) -> Result<Cabin, RemoteError> {
        let url = self.table_url(ResourceTag::Cabins);
        let request = match id {
            None => self.http_client.post(&url).json(&[row]),
            Some(id) => self
                .http_client
                .patch(&url)
                .query(&[("id", format!("eq.{}", id))])
                .json(row),
        };

        let response = self
            .authorized(request)
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .send()
            .await?;
        let cabin: Cabin = Self::check(response).await?.json().await?;

        info!(id = cabin.id, name = %cabin.name, created = id.is_none(), "Cabin row persisted");
        Ok(cabin)
    }

    async fn delete_cabin_row(&self, id: ResourceId) -> Result<(), RemoteError> {
        self.delete_row(ResourceTag::Cabins, id).await
    }

    async fn upload_asset(&self, name: &str, payload: &AssetPayload) -> Result<(), RemoteError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.api_url,
            self.namespace.bucket(),
            urlencoding::encode(name)
        );

        info!(
            name = name,
            size = payload.bytes.len(),
            content_type = %payload.content_type,
            "Uploading asset"
        );

        let response = self
            .authorized(self.http_client.post(&url))
            .header("Content-Type", &payload.content_type)
            .header("x-upsert", "false")
            .body(payload.bytes.clone())
            .send()
            .await?;
        Self::check(response).await?;

        info!(name = name, "Asset uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortDirection;
    use crate::test_support::http::{spawn_stub, StubServer};
    use axum::extract::{Path, Query, RawQuery};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    fn client_for(server: &StubServer) -> RestClient {
        RestClient::new(&server.base_url(), "test-key", "cabin-images", Duration::from_secs(2))
            .unwrap()
    }

    async fn bookings_handler(
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> (StatusCode, HeaderMap, Json<serde_json::Value>) {
        assert_eq!(headers.get("apikey").unwrap(), "test-key");
        assert_eq!(headers.get("range").unwrap(), "10-19");
        assert_eq!(params.get("order").map(String::as_str), Some("totalPrice.desc"));
        assert_eq!(params.get("status").map(String::as_str), Some("eq.unconfirmed"));

        let mut out = HeaderMap::new();
        out.insert("content-range", "10-10/11".parse().unwrap());
        let body = serde_json::json!([{
            "id": 11,
            "startDate": "2024-05-01",
            "endDate": "2024-05-03",
            "numNights": 2,
            "status": "unconfirmed",
            "totalPrice": 500,
            "cabins": {"name": "003"},
            "guests": {"fullName": "Grace Hopper"}
        }]);
        (StatusCode::PARTIAL_CONTENT, out, Json(body))
    }

    #[tokio::test]
    async fn test_list_bookings_sends_range_and_reads_total() {
        let server = spawn_stub(Router::new().route("/rest/v1/bookings", get(bookings_handler)))
            .await
            .unwrap();
        let client = client_for(&server);

        let filter = Filter {
            field: "status".into(),
            value: "unconfirmed".into(),
        };
        let sort = Sort::new("totalPrice", SortDirection::Desc);
        let page = client.list_bookings(Some(&filter), &sort, 2).await.unwrap();

        assert_eq!(page.total_count, 11);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].id, 11);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_content_range_is_decode_error() {
        let router = Router::new().route(
            "/rest/v1/bookings",
            get(|| async { Json(serde_json::json!([])) }),
        );
        let server = spawn_stub(router).await.unwrap();
        let client = client_for(&server);

        let err = client
            .list_bookings(None, &Sort::new("startDate", SortDirection::Asc), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_persist_insert_and_update() {
        let router = Router::new().route(
            "/rest/v1/cabins",
            post(|Json(body): Json<serde_json::Value>| async move {
                let row = &body[0];
                Json(serde_json::json!({
                    "id": 99,
                    "name": row["name"],
                    "maxCapacity": row["maxCapacity"],
                    "regularPrice": row["regularPrice"],
                    "discount": row["discount"],
                    "description": row["description"],
                    "image": row["image"],
                }))
            })
            .patch(|RawQuery(query): RawQuery, Json(row): Json<serde_json::Value>| async move {
                assert_eq!(query.as_deref(), Some("id=eq.5"));
                Json(serde_json::json!({
                    "id": 5,
                    "name": row["name"],
                    "maxCapacity": row["maxCapacity"],
                    "regularPrice": row["regularPrice"],
                    "discount": row["discount"],
                    "description": row["description"],
                    "image": row["image"],
                }))
            }),
        );
        let server = spawn_stub(router).await.unwrap();
        let client = client_for(&server);

        let row = CabinRow {
            name: "010".into(),
            max_capacity: 6,
            regular_price: 800.0,
            discount: 50.0,
            description: "Lakeside".into(),
            image: None,
        };
        let created = client.persist_cabin_row(&row, None).await.unwrap();
        assert_eq!(created.id, 99);
        assert_eq!(created.name, "010");

        let updated = client.persist_cabin_row(&row, Some(5)).await.unwrap();
        assert_eq!(updated.id, 5);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_upload_failure_maps_status() {
        let router = Router::new().route(
            "/storage/v1/object/cabin-images/:name",
            post(|Path(name): Path<String>| async move {
                assert_eq!(name, "abc-cabin.jpg");
                (StatusCode::CONFLICT, "Duplicate")
            }),
        );
        let server = spawn_stub(router).await.unwrap();
        let client = client_for(&server);

        let payload = AssetPayload::new("cabin.jpg", "image/jpeg", vec![1, 2, 3]);
        let err = client.upload_asset("abc-cabin.jpg", &payload).await.unwrap_err();
        assert_eq!(err, RemoteError::Conflict("Duplicate".to_string()));
        server.shutdown().await;
    }

    async fn delete_handler(RawQuery(query): RawQuery, headers: HeaderMap) -> StatusCode {
        assert_eq!(query.as_deref(), Some("id=eq.7"));
        assert_eq!(headers.get("authorization").unwrap(), "Bearer test-key");
        StatusCode::NO_CONTENT
    }

    #[tokio::test]
    async fn test_delete_rows_by_id() {
        let router = Router::new()
            .route("/rest/v1/bookings", delete(delete_handler))
            .route("/rest/v1/cabins", delete(delete_handler));
        let server = spawn_stub(router).await.unwrap();
        let client = client_for(&server);

        client.delete_booking(7).await.unwrap();
        client.delete_cabin_row(7).await.unwrap();
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_list_cabins_selects_all_columns() {
        let router = Router::new().route(
            "/rest/v1/cabins",
            get(|Query(params): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                assert_eq!(params.get("select").map(String::as_str), Some("*"));
                assert_eq!(headers.get("apikey").unwrap(), "test-key");
                Json(serde_json::json!([
                    {
                        "id": 1,
                        "name": "001",
                        "maxCapacity": 2,
                        "regularPrice": "250.00",
                        "discount": 0,
                        "description": "Small",
                        "image": "https://p/storage/v1/object/public/cabin-images/a.jpg"
                    },
                    {
                        "id": 2,
                        "name": "002",
                        "maxCapacity": 4,
                        "regularPrice": 400,
                        "discount": null,
                        "description": "Medium",
                        "image": null
                    }
                ]))
            }),
        );
        let server = spawn_stub(router).await.unwrap();
        let client = client_for(&server);

        let cabins = client.list_cabins().await.unwrap();
        assert_eq!(cabins.len(), 2);
        assert_eq!(cabins[0].regular_price, 250.0);
        assert!(cabins[0].image.is_some());
        assert_eq!(cabins[1].discount, 0.0);
        assert_eq!(cabins[1].image, None);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_upload_sends_bytes_and_content_type() {
        let router = Router::new().route(
            "/storage/v1/object/cabin-images/:name",
            post(
                |Path(name): Path<String>, headers: HeaderMap, body: axum::body::Bytes| async move {
                    assert_eq!(name, "abc-cabin 1.png");
                    assert_eq!(headers.get("content-type").unwrap(), "image/png");
                    assert_eq!(headers.get("x-upsert").unwrap(), "false");
                    assert_eq!(headers.get("apikey").unwrap(), "test-key");
                    assert_eq!(&body[..], &[9, 8, 7]);
                    Json(serde_json::json!({"Key": format!("cabin-images/{}", name)}))
                },
            ),
        );
        let server = spawn_stub(router).await.unwrap();
        let client = client_for(&server);

        let payload = AssetPayload::new("cabin 1.png", "image/png", vec![9, 8, 7]);
        client.upload_asset("abc-cabin 1.png", &payload).await.unwrap();
        server.shutdown().await;
    }
}
