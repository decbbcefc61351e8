//! Sync-aware repository.
//!
//! Reads go to the backend while online and mirror what they fetch into the
//! local cache; offline they are served from the cache. Writes go to the
//! backend while online and fail loudly; offline they are applied locally,
//! queued for replay, and reported as successful.

use std::sync::Arc;

use crate::connectivity::Connectivity;
use crate::error::{Error, Result};
use crate::gateway::RemoteGateway;
use crate::models::{InventoryChange, Product, QueuedWrite, Sale, SalePayload};
use crate::store::LocalCache;

/// Products and sales regardless of connectivity
#[derive(Clone)]
pub struct SyncRepository {
    cache: LocalCache,
    gateway: Arc<dyn RemoteGateway>,
    connectivity: Arc<dyn Connectivity>,
}

impl SyncRepository {
    pub fn new(
        cache: LocalCache,
        gateway: Arc<dyn RemoteGateway>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            cache,
            gateway,
            connectivity,
        }
    }

    pub const fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// List products, optionally filtered by name.
    ///
    /// Offline results come back in store order.
    pub async fn list_products(&self, query: Option<&str>) -> Result<Vec<Product>> {
        if self.is_online() {
            let products = self.gateway.list_products(query).await?;
            for product in &products {
                self.cache.put_product(product).await?;
            }
            tracing::debug!(count = products.len(), "Mirrored product list");
            return Ok(products);
        }

        let query = query.unwrap_or_default();
        let products = self
            .cache
            .products()
            .await?
            .into_iter()
            .filter(|product| product.matches_query(query))
            .collect();
        Ok(products)
    }

    /// Look up a product by barcode. Remote failures other than 404 propagate.
    pub async fn get_product(&self, barcode: &str) -> Result<Option<Product>> {
        if !self.is_online() {
            return self.cache.product(barcode).await;
        }

        match self.gateway.get_product(barcode).await {
            Ok(product) => {
                self.cache.put_product(&product).await?;
                Ok(Some(product))
            }
            Err(error) if error.is_remote_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Create or update a product, returning it as persisted.
    pub async fn upsert_product(&self, product: Product) -> Result<Product> {
        product.validate()?;

        if self.is_online() {
            let persisted = self.gateway.upsert_product(&product).await?;
            self.cache.put_product(&persisted).await?;
            return Ok(persisted);
        }

        self.cache.put_product(&product).await?;
        let write = QueuedWrite::upsert_product(self.cache.next_queue_key(), &product)?;
        self.cache.enqueue(&write).await?;
        tracing::info!(barcode = %product.barcode, key = %write.key, "Saved product offline");
        Ok(product)
    }

    /// The most recent `limit` sales.
    ///
    /// Offline this is the last `limit` entries in store order, which is not
    /// necessarily chronological.
    pub async fn list_sales(&self, limit: usize) -> Result<Vec<Sale>> {
        if self.is_online() {
            let sales = self.gateway.list_sales(limit).await?;
            for sale in &sales {
                self.cache.put_sale(sale).await?;
            }
            return Ok(sales);
        }

        let mut sales = self.cache.sales().await?;
        let skip = sales.len().saturating_sub(limit);
        Ok(sales.split_off(skip))
    }

    /// Record a paid checkout.
    ///
    /// Offline the sale gets a client-side id and completes immediately; the
    /// payload is replayed later.
    pub async fn record_sale(&self, payload: SalePayload) -> Result<Sale> {
        payload.validate()?;

        if self.is_online() {
            let sale = self.gateway.record_sale(&payload).await?;
            self.cache.put_sale(&sale).await?;
            tracing::info!(sale_id = %sale.id, total = sale.total, "Recorded sale");
            return Ok(sale);
        }

        let sale = Sale::provisional(&payload);
        self.cache.put_sale(&sale).await?;
        let write = QueuedWrite::sale_paid(self.cache.next_queue_key(), &payload, sale.id.clone())?;
        self.cache.enqueue(&write).await?;
        tracing::info!(sale_id = %sale.id, key = %write.key, "Recorded sale offline");
        Ok(sale)
    }

    /// Recent stock/price changes. Not cached, so offline is an error.
    pub async fn inventory_changes(&self, limit: usize) -> Result<Vec<InventoryChange>> {
        if !self.is_online() {
            return Err(Error::Offline(
                "the inventory change log is only available online".to_string(),
            ));
        }
        self.gateway.inventory_changes(limit).await
    }

    /// Writes waiting for replay, oldest first
    pub async fn pending_writes(&self) -> Result<Vec<QueuedWrite>> {
        self.cache.queued_writes().await
    }
}
