use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use till_core::{InventoryChange, Product, Sale, SalePayload};

use crate::catalog::{Catalog, MAX_LIST_LIMIT};
use crate::config::AppConfig;
use crate::error::AppError;

const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    catalog: Arc<Catalog>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, catalog: Catalog) -> Self {
        Self {
            config,
            catalog: Arc::new(catalog),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/products", get(list_products))
        .route("/products/upsert", post(upsert_product))
        .route("/products/{barcode}", get(get_product))
        .route("/sales", get(list_sales))
        .route("/sale/paid", post(sale_paid))
        .route("/inventory_changes", get(inventory_changes));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

#[derive(Debug, Serialize)]
struct Items<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ProductsQuery {
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn resolve(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<Items<Product>>, AppError> {
    let items = state.catalog.list_products(query.query.as_deref()).await?;
    Ok(Json(Items { items }))
}

async fn get_product(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> Result<Json<Product>, AppError> {
    state
        .catalog
        .product(&barcode)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Product not found"))
}

async fn upsert_product(
    State(state): State<AppState>,
    Json(product): Json<Product>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.catalog.upsert_product(&product).await?))
}

async fn list_sales(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Items<Sale>>, AppError> {
    let items = state.catalog.list_sales(query.resolve()).await?;
    Ok(Json(Items { items }))
}

async fn sale_paid(
    State(state): State<AppState>,
    Json(payload): Json<SalePayload>,
) -> Result<Json<Sale>, AppError> {
    Ok(Json(state.catalog.record_sale(&payload).await?))
}

async fn inventory_changes(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Items<InventoryChange>>, AppError> {
    let items = state.catalog.inventory_changes(query.resolve()).await?;
    Ok(Json(Items { items }))
}
