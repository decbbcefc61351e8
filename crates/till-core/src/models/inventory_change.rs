//! Inventory change log entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the backend's stock/price change log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryChange {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub barcode: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub details: String,
    /// Stock delta; absent for price/name edits
    #[serde(default)]
    pub delta_stock: Option<i64>,
}
