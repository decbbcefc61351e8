//! Remote gateway: HTTP client for the inventory/sales backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{HttpMethod, InventoryChange, Product, QueuedWrite, Sale, SaleId, SalePayload};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const HEALTH_PATH: &str = "/healthz";

/// CRUD operations against the backend.
///
/// Every method is a single network round trip; none of them touch the
/// local store.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// `GET /api/products?query=<q>`
    async fn list_products(&self, query: Option<&str>) -> Result<Vec<Product>>;

    /// `GET /api/products/{barcode}`
    async fn get_product(&self, barcode: &str) -> Result<Product>;

    /// `POST /api/products/upsert`
    async fn upsert_product(&self, product: &Product) -> Result<Product>;

    /// `GET /api/inventory_changes?limit=<n>`
    async fn inventory_changes(&self, limit: usize) -> Result<Vec<InventoryChange>>;

    /// `GET /api/sales?limit=<n>`
    async fn list_sales(&self, limit: usize) -> Result<Vec<Sale>>;

    /// `POST /api/sale/paid`
    async fn record_sale(&self, payload: &SalePayload) -> Result<Sale>;

    /// Re-issue a queued request verbatim, returning the response body.
    async fn replay(&self, write: &QueuedWrite) -> Result<Value>;

    /// Succeeds when the backend answers at all, whatever the status.
    async fn probe(&self) -> Result<()>;
}

/// reqwest implementation of `RemoteGateway`
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::with_timeout(config.api_url.clone(), config.http_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, method: HttpMethod, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self
            .client
            .request(method.into(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!(%method, %path, status = status.as_u16(), "Backend rejected request");
            return Err(Error::Remote {
                status: status.as_u16(),
                message: parse_api_error(status, &text),
            });
        }

        Ok(parse_body(&text))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.send(HttpMethod::Get, path, None).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list_products(&self, query: Option<&str>) -> Result<Vec<Product>> {
        let page: Items<Product> = self.get_json(&products_path(query)).await?;
        Ok(page.items)
    }

    async fn get_product(&self, barcode: &str) -> Result<Product> {
        self.get_json(&format!("/api/products/{}", urlencoding::encode(barcode)))
            .await
    }

    async fn upsert_product(&self, product: &Product) -> Result<Product> {
        let body = serde_json::to_value(product)?;
        let reply = self
            .send(HttpMethod::Post, "/api/products/upsert", Some(&body))
            .await?;
        Ok(upserted_product(reply, product))
    }

    async fn inventory_changes(&self, limit: usize) -> Result<Vec<InventoryChange>> {
        let page: ListOrItems<InventoryChange> = self
            .get_json(&format!("/api/inventory_changes?limit={limit}"))
            .await?;
        Ok(page.into_vec())
    }

    async fn list_sales(&self, limit: usize) -> Result<Vec<Sale>> {
        let page: ListOrItems<Sale> = self.get_json(&format!("/api/sales?limit={limit}")).await?;
        Ok(page.into_vec())
    }

    async fn record_sale(&self, payload: &SalePayload) -> Result<Sale> {
        let body = serde_json::to_value(payload)?;
        let reply = self
            .send(HttpMethod::Post, "/api/sale/paid", Some(&body))
            .await?;
        recorded_sale(reply, payload)
    }

    async fn replay(&self, write: &QueuedWrite) -> Result<Value> {
        self.send(write.method, &write.path, write.body.as_ref())
            .await
    }

    async fn probe(&self) -> Result<()> {
        self.client
            .get(format!("{}{HEALTH_PATH}", self.base_url))
            .send()
            .await?;
        Ok(())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Items<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListOrItems<T> {
    List(Vec<T>),
    Wrapped(Items<T>),
}

impl<T> ListOrItems<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::List(items) | Self::Wrapped(Items { items }) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SaleReply {
    Sale(Sale),
    Ack { sale_id: SaleId },
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    detail: Option<String>,
    message: Option<String>,
}

fn products_path(query: Option<&str>) -> String {
    match normalize_text_option(query.map(str::to_string)) {
        Some(query) => format!("/api/products?query={}", urlencoding::encode(&query)),
        None => "/api/products".to_string(),
    }
}

/// Backends that only acknowledge an upsert leave the caller's product as
/// the persisted representation.
fn upserted_product(reply: Value, sent: &Product) -> Product {
    serde_json::from_value(reply).unwrap_or_else(|_| sent.clone())
}

pub(crate) fn recorded_sale(reply: Value, payload: &SalePayload) -> Result<Sale> {
    match serde_json::from_value::<SaleReply>(reply)? {
        SaleReply::Sale(sale) => Ok(sale),
        SaleReply::Ack { sale_id } => Ok(Sale::from_payload(sale_id, payload)),
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.detail).or(payload.message) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
    } else {
        trimmed
    }
}

pub(crate) fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("API base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SaleItem;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(HttpGateway::new("  ").is_err());
        assert!(HttpGateway::new("api.example.com").is_err());
    }

    #[test]
    fn normalize_base_url_trims_trailing_slash() {
        let gateway = HttpGateway::new("https://shop.example.com/").unwrap();
        assert_eq!(gateway.base_url(), "https://shop.example.com");
    }

    #[test]
    fn products_path_encodes_query() {
        assert_eq!(products_path(None), "/api/products");
        assert_eq!(products_path(Some("  ")), "/api/products");
        assert_eq!(
            products_path(Some("oat milk")),
            "/api/products?query=oat%20milk"
        );
    }

    #[test]
    fn api_error_prefers_json_message() {
        assert_eq!(
            parse_api_error(StatusCode::NOT_FOUND, r#"{"detail":"Product not found"}"#),
            "Product not found"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, r#"{"error":"No items provided"}"#),
            "No items provided"
        );
    }

    #[test]
    fn api_error_falls_back_to_text_then_status() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "upstream down"
        );
        assert_eq!(
            parse_api_error(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }

    #[test]
    fn upsert_ack_keeps_sent_product() {
        let sent = Product::new("400", "Milk", 1.5, 3);
        assert_eq!(upserted_product(json!({"ok": true}), &sent), sent);

        let echoed = json!({"barcode": "400", "name": "Milk 1L", "price": 1.5, "stock": 3});
        assert_eq!(upserted_product(echoed, &sent).name, "Milk 1L");
    }

    #[test]
    fn sale_ack_builds_sale_from_payload() {
        let payload = SalePayload {
            items: vec![SaleItem::new("400", 2)],
            total: 3.0,
        };

        let sale = recorded_sale(json!({"ok": true, "sale_id": 12}), &payload).unwrap();
        assert_eq!(sale.id.as_str(), "12");
        assert_eq!(sale.items, payload.items);

        let full = json!({
            "id": 13,
            "items": [{"barcode": "400", "qty": 2}],
            "total": 3.0,
            "timestamp": "2025-03-01T12:00:00Z"
        });
        assert_eq!(recorded_sale(full, &payload).unwrap().id.as_str(), "13");

        assert!(recorded_sale(json!({"ok": true}), &payload).is_err());
    }

    #[test]
    fn sale_lists_accept_both_shapes() {
        let row = json!({"id": 1, "total": 2.0, "created_at": "2025-03-01T12:00:00Z"});
        let bare: ListOrItems<Sale> = serde_json::from_value(json!([row.clone()])).unwrap();
        let wrapped: ListOrItems<Sale> = serde_json::from_value(json!({"items": [row]})).unwrap();

        assert_eq!(bare.into_vec().len(), 1);
        assert_eq!(wrapped.into_vec().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn truncated_success_body_is_an_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0_u8; 4096];
            let _ = socket.read(&mut request).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 64\r\n\r\n{\"ok\"")
                .await
                .unwrap();
        });

        let gateway = HttpGateway::new(format!("http://{addr}")).unwrap();
        let write = QueuedWrite {
            key: "00000000000000000001".into(),
            path: "/api/products/upsert".into(),
            method: HttpMethod::Post,
            body: Some(json!({"barcode": "1", "name": "Tea", "price": 1.0, "stock": 1})),
            provisional_sale_id: None,
        };
        assert!(gateway.replay(&write).await.is_err());
        server.await.unwrap();
    }

    #[test]
    fn parse_body_handles_empty_and_plain_text() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"ok\":true}"), json!({"ok": true}));
        assert_eq!(parse_body("done"), json!("done"));
    }
}
