//! Server-side product catalog, sales ledger and inventory change log

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Row};
use tokio::sync::Mutex;

use till_core::store::{Database, Migration};
use till_core::util::round_to_cents;
use till_core::{Error, InventoryChange, Product, Result, Sale, SaleId, SaleItem, SalePayload};

/// Most rows a single list request returns
pub const MAX_LIST_LIMIT: usize = 500;
/// Page size of the product list
const PRODUCT_PAGE: i64 = 100;

pub const CATALOG_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "products, sales and inventory change log",
    statements: &[
        "CREATE TABLE IF NOT EXISTS products (
            barcode TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            price REAL NOT NULL,
            stock INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS sales (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            total REAL NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS sale_items (
            sale_id INTEGER NOT NULL REFERENCES sales(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            barcode TEXT NOT NULL,
            qty INTEGER NOT NULL,
            price REAL NOT NULL,
            PRIMARY KEY (sale_id, position)
        )",
        "CREATE TABLE IF NOT EXISTS inventory_changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            barcode TEXT NOT NULL,
            details TEXT NOT NULL DEFAULT '',
            delta_stock INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_sales_created ON sales(created_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_changes_timestamp ON inventory_changes(timestamp DESC)",
    ],
}];

/// The backend's system of record
pub struct Catalog {
    db: Mutex<Database>,
}

impl Catalog {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(path, CATALOG_MIGRATIONS).await?;
        Ok(Self { db: Mutex::new(db) })
    }

    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory(CATALOG_MIGRATIONS).await?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Products ordered by name, optionally filtered by a case-insensitive
    /// substring of the name.
    pub async fn list_products(&self, query: Option<&str>) -> Result<Vec<Product>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut rows = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => {
                conn.query(
                    "SELECT barcode, name, price, stock FROM products
                     WHERE lower(name) LIKE lower(?)
                     ORDER BY name LIMIT ?",
                    libsql::params![format!("%{query}%"), PRODUCT_PAGE],
                )
                .await?
            }
            None => {
                conn.query(
                    "SELECT barcode, name, price, stock FROM products ORDER BY name LIMIT ?",
                    libsql::params![PRODUCT_PAGE],
                )
                .await?
            }
        };

        let mut products = Vec::new();
        while let Some(row) = rows.next().await? {
            products.push(parse_product(&row)?);
        }
        Ok(products)
    }

    pub async fn product(&self, barcode: &str) -> Result<Option<Product>> {
        let db = self.db.lock().await;
        find_product(db.connection(), barcode).await
    }

    /// Insert or replace a product by barcode and log the change.
    pub async fn upsert_product(&self, product: &Product) -> Result<Product> {
        product.validate()?;
        let now = now_rfc3339();
        let details = format!(
            "Upsert {} → {} price {:.2} stock {}",
            product.barcode, product.name, product.price, product.stock
        );

        let db = self.db.lock().await;
        let conn = db.connection();
        in_transaction(conn, async {
            conn.execute(
                "INSERT INTO products (barcode, name, price, stock, updated_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT (barcode) DO UPDATE SET
                   name = excluded.name,
                   price = excluded.price,
                   stock = excluded.stock,
                   updated_at = excluded.updated_at",
                libsql::params![
                    product.barcode.as_str(),
                    product.name.as_str(),
                    product.price,
                    i64::from(product.stock),
                    now.as_str()
                ],
            )
            .await?;
            conn.execute(
                "INSERT INTO inventory_changes (timestamp, barcode, details, delta_stock)
                 VALUES (?, ?, ?, NULL)",
                libsql::params![now.as_str(), product.barcode.as_str(), details],
            )
            .await?;
            Ok(())
        })
        .await?;

        let stored = find_product(conn, &product.barcode)
            .await?
            .ok_or_else(|| {
                Error::Database(format!("upserted product {} vanished", product.barcode))
            })?;
        tracing::info!(barcode = %stored.barcode, stock = stored.stock, "Product upserted");
        Ok(stored)
    }

    /// Most recent sales first, with their items.
    pub async fn list_sales(&self, limit: usize) -> Result<Vec<Sale>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let mut rows = conn
            .query(
                "SELECT id, created_at, total FROM sales
                 ORDER BY created_at DESC, id DESC LIMIT ?",
                libsql::params![sql_int(limit)],
            )
            .await?;

        let mut headers = Vec::new();
        while let Some(row) = rows.next().await? {
            headers.push((
                row.get::<i64>(0)?,
                parse_timestamp(&row.get::<String>(1)?)?,
                row.get::<f64>(2)?,
            ));
        }

        let mut sales = Vec::with_capacity(headers.len());
        for (id, timestamp, total) in headers {
            sales.push(Sale {
                id: SaleId::from(id),
                items: sale_items(conn, id).await?,
                total,
                timestamp,
            });
        }
        Ok(sales)
    }

    /// Record a paid sale: every barcode must be known; stock is decremented
    /// (never below zero) and each line is logged as a negative delta.
    pub async fn record_sale(&self, payload: &SalePayload) -> Result<Sale> {
        payload.validate()?;

        let db = self.db.lock().await;
        let conn = db.connection();

        let mut prices = Vec::with_capacity(payload.items.len());
        for item in &payload.items {
            let product = find_product(conn, &item.barcode)
                .await?
                .ok_or_else(|| Error::InvalidInput(format!("Unknown barcode {}", item.barcode)))?;
            prices.push(product.price);
        }

        let created_at = now_rfc3339();
        let timestamp = parse_timestamp(&created_at)?;
        let total = round_to_cents(payload.total);

        let id = in_transaction(conn, async {
            conn.execute(
                "INSERT INTO sales (created_at, total) VALUES (?, ?)",
                libsql::params![created_at.as_str(), total],
            )
            .await?;
            let id = conn.last_insert_rowid();

            for (position, (item, price)) in payload.items.iter().zip(&prices).enumerate() {
                let qty = i64::from(item.qty);
                conn.execute(
                    "INSERT INTO sale_items (sale_id, position, barcode, qty, price)
                     VALUES (?, ?, ?, ?, ?)",
                    libsql::params![id, sql_int(position), item.barcode.as_str(), qty, *price],
                )
                .await?;
                conn.execute(
                    "UPDATE products SET stock = MAX(0, stock - ?), updated_at = ?
                     WHERE barcode = ?",
                    libsql::params![qty, created_at.as_str(), item.barcode.as_str()],
                )
                .await?;
                conn.execute(
                    "INSERT INTO inventory_changes (timestamp, barcode, details, delta_stock)
                     VALUES (?, ?, ?, ?)",
                    libsql::params![
                        created_at.as_str(),
                        item.barcode.as_str(),
                        format!("Sale {id}: -{}", item.qty),
                        -qty
                    ],
                )
                .await?;
            }
            Ok(id)
        })
        .await?;

        tracing::info!(sale_id = id, lines = payload.items.len(), total, "Sale recorded");
        Ok(Sale {
            id: SaleId::from(id),
            items: payload.items.clone(),
            total,
            timestamp,
        })
    }

    /// Most recent change log entries first.
    pub async fn inventory_changes(&self, limit: usize) -> Result<Vec<InventoryChange>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT id, timestamp, barcode, details, delta_stock FROM inventory_changes
                 ORDER BY timestamp DESC, id DESC LIMIT ?",
                libsql::params![sql_int(limit)],
            )
            .await?;

        let mut changes = Vec::new();
        while let Some(row) = rows.next().await? {
            changes.push(InventoryChange {
                id: row.get::<i64>(0)?,
                timestamp: parse_timestamp(&row.get::<String>(1)?)?,
                barcode: row.get::<String>(2)?,
                details: row.get::<String>(3)?,
                delta_stock: row.get::<Option<i64>>(4)?,
            });
        }
        Ok(changes)
    }
}

async fn find_product(conn: &Connection, barcode: &str) -> Result<Option<Product>> {
    let mut rows = conn
        .query(
            "SELECT barcode, name, price, stock FROM products WHERE barcode = ? LIMIT 1",
            [barcode],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(parse_product(&row)?)),
        None => Ok(None),
    }
}

async fn sale_items(conn: &Connection, sale_id: i64) -> Result<Vec<SaleItem>> {
    let mut rows = conn
        .query(
            "SELECT barcode, qty FROM sale_items WHERE sale_id = ? ORDER BY position",
            libsql::params![sale_id],
        )
        .await?;
    let mut items = Vec::new();
    while let Some(row) = rows.next().await? {
        items.push(SaleItem::new(
            row.get::<String>(0)?,
            clamp_u32(row.get::<i64>(1)?),
        ));
    }
    Ok(items)
}

/// Run `body` between BEGIN and COMMIT, rolling back on any error.
async fn in_transaction<T>(
    conn: &Connection,
    body: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    conn.execute("BEGIN TRANSACTION", ()).await?;
    match body.await {
        Ok(value) => {
            if let Err(e) = conn.execute("COMMIT", ()).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
            Ok(value)
        }
        Err(e) => {
            conn.execute("ROLLBACK", ()).await.ok();
            Err(e)
        }
    }
}

fn parse_product(row: &Row) -> Result<Product> {
    Ok(Product {
        barcode: row.get::<String>(0)?,
        name: row.get::<String>(1)?,
        price: row.get::<f64>(2)?,
        stock: clamp_u32(row.get::<i64>(3)?),
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("bad timestamp {raw:?}: {e}")))
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn clamp_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
