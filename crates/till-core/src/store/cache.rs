//! Typed view over the local store

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{LocalStore, Namespace};
use crate::error::Result;
use crate::models::{Product, QueuedWrite, Sale, SaleId};
use crate::util::unix_micros_now;

/// Width of queue keys; fixed so lexical order equals numeric order.
const QUEUE_KEY_WIDTH: usize = 20;

/// Products, sales and pending writes over a [`LocalStore`].
///
/// Carries no online/offline policy; it only knows how entities map to keys.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn LocalStore>,
    queue_keys: Arc<QueueKeys>,
}

impl LocalCache {
    /// Wrap a store, seeding the queue key sequence from the newest pending
    /// write so keys keep increasing across restarts.
    pub async fn new(store: Arc<dyn LocalStore>) -> Result<Self> {
        let newest = store
            .keys(Namespace::Queue)
            .await?
            .iter()
            .filter_map(|key| key.parse::<u64>().ok())
            .max()
            .unwrap_or(0);

        Ok(Self {
            store,
            queue_keys: Arc::new(QueueKeys::starting_after(newest)),
        })
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    pub async fn product(&self, barcode: &str) -> Result<Option<Product>> {
        self.load(Namespace::Products, barcode).await
    }

    pub async fn put_product(&self, product: &Product) -> Result<()> {
        self.save(Namespace::Products, &product.barcode, product).await
    }

    /// All cached products in store order
    pub async fn products(&self) -> Result<Vec<Product>> {
        self.load_all(Namespace::Products).await
    }

    pub async fn sale(&self, id: &SaleId) -> Result<Option<Sale>> {
        self.load(Namespace::Sales, id.as_str()).await
    }

    pub async fn put_sale(&self, sale: &Sale) -> Result<()> {
        self.save(Namespace::Sales, sale.id.as_str(), sale).await
    }

    pub async fn remove_sale(&self, id: &SaleId) -> Result<()> {
        self.store.remove(Namespace::Sales, id.as_str()).await
    }

    /// All cached sales in store order
    pub async fn sales(&self) -> Result<Vec<Sale>> {
        self.load_all(Namespace::Sales).await
    }

    /// Allocate the key for the next pending write
    pub fn next_queue_key(&self) -> String {
        format!("{:0width$}", self.queue_keys.next(), width = QUEUE_KEY_WIDTH)
    }

    pub async fn enqueue(&self, write: &QueuedWrite) -> Result<()> {
        self.save(Namespace::Queue, &write.key, write).await?;
        tracing::debug!(key = %write.key, path = %write.path, "Enqueued pending write");
        Ok(())
    }

    /// Keys of pending writes, oldest first
    pub async fn queued_keys(&self) -> Result<Vec<String>> {
        self.store.keys(Namespace::Queue).await
    }

    pub async fn queued(&self, key: &str) -> Result<Option<QueuedWrite>> {
        self.load(Namespace::Queue, key).await
    }

    /// Pending writes, oldest first
    pub async fn queued_writes(&self) -> Result<Vec<QueuedWrite>> {
        self.load_all(Namespace::Queue).await
    }

    pub async fn dequeue(&self, key: &str) -> Result<()> {
        self.store.remove(Namespace::Queue, key).await
    }

    async fn load<T: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Result<Option<T>> {
        match self.store.get(namespace, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn save<T: Serialize>(&self, namespace: Namespace, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.store.set(namespace, key, &value).await
    }

    async fn load_all<T: DeserializeOwned>(&self, namespace: Namespace) -> Result<Vec<T>> {
        let entries = self.store.entries(namespace).await?;
        let mut values = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::from_value(value) {
                Ok(value) => values.push(value),
                Err(error) => {
                    tracing::warn!(%namespace, %key, %error, "Skipping unreadable cache entry");
                }
            }
        }
        Ok(values)
    }
}

/// Strictly increasing microsecond timestamps.
struct QueueKeys {
    last: AtomicU64,
}

impl QueueKeys {
    const fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    fn next(&self) -> u64 {
        let now = unix_micros_now();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HttpMethod, SaleItem, SalePayload};
    use crate::store::LibSqlStore;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    async fn setup() -> LocalCache {
        let store = LibSqlStore::open_in_memory().await.unwrap();
        LocalCache::new(Arc::new(store)).await.unwrap()
    }

    fn write(cache: &LocalCache, barcode: &str) -> QueuedWrite {
        QueuedWrite::upsert_product(cache.next_queue_key(), &Product::new(barcode, "x", 1.0, 1))
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_product_round_trip() {
        let cache = setup().await;
        let product = Product::new("400", "Milk", 1.25, 10);

        cache.put_product(&product).await.unwrap();

        assert_eq!(cache.product("400").await.unwrap(), Some(product.clone()));
        assert_eq!(cache.products().await.unwrap(), vec![product]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sale_round_trip_and_remove() {
        let cache = setup().await;
        let sale = Sale::provisional(&SalePayload {
            items: vec![SaleItem::new("400", 2)],
            total: 2.5,
        });

        cache.put_sale(&sale).await.unwrap();
        assert_eq!(cache.sale(&sale.id).await.unwrap(), Some(sale.clone()));

        cache.remove_sale(&sale.id).await.unwrap();
        assert!(cache.sales().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queue_keys_increase_and_sort() {
        let cache = setup().await;
        let keys: Vec<String> = (0..50).map(|_| cache.next_queue_key()).collect();

        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(keys, sorted);
        assert!(keys.iter().all(|key| key.len() == QUEUE_KEY_WIDTH));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enqueue_and_dequeue_in_order() {
        let cache = setup().await;
        let first = write(&cache, "1");
        let second = write(&cache, "2");

        // Insert out of order; the queue still lists by key
        cache.enqueue(&second).await.unwrap();
        cache.enqueue(&first).await.unwrap();

        assert_eq!(
            cache.queued_keys().await.unwrap(),
            vec![first.key.clone(), second.key.clone()]
        );
        assert_eq!(cache.queued(&first.key).await.unwrap().unwrap().method, HttpMethod::Post);

        cache.dequeue(&first.key).await.unwrap();
        assert_eq!(cache.queued_writes().await.unwrap(), vec![second]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreadable_entries_are_skipped() {
        let cache = setup().await;
        cache
            .store()
            .set(Namespace::Products, "bad", &serde_json::json!({"nope": true}))
            .await
            .unwrap();
        cache.put_product(&Product::new("ok", "Bread", 2.0, 1)).await.unwrap();

        let products = cache.products().await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].barcode, "ok");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queue_keys_continue_after_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("till.db");

        let far_future = format!("{:020}", u64::MAX / 2);
        {
            let store = LibSqlStore::open(&path).await.unwrap();
            let cache = LocalCache::new(Arc::new(store)).await.unwrap();
            let mut pending = write(&cache, "1");
            pending.key.clone_from(&far_future);
            cache.enqueue(&pending).await.unwrap();
        }

        let store = LibSqlStore::open(&path).await.unwrap();
        let cache = LocalCache::new(Arc::new(store)).await.unwrap();
        assert!(cache.next_queue_key() > far_future);
        assert_eq!(cache.queued_keys().await.unwrap(), vec![far_future]);
    }
}
