//! Sale model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Identifier of a sale.
///
/// The backend assigns integer ids; sales recorded offline get a UUID v7
/// (time-sortable) until the server confirms them. Both are held as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SaleId(String);

impl SaleId {
    /// Create a new client-side id using UUID v7
    #[must_use]
    pub fn provisional() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SaleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SaleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for SaleId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for SaleId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(value) => Self::from(value),
            RawId::Text(value) => Self(value),
        })
    }
}

/// One scanned line of a sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub barcode: String,
    pub qty: u32,
}

impl SaleItem {
    pub fn new(barcode: impl Into<String>, qty: u32) -> Self {
        Self {
            barcode: barcode.into(),
            qty,
        }
    }
}

/// Body of a "sale paid" request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalePayload {
    pub items: Vec<SaleItem>,
    pub total: f64,
}

impl SalePayload {
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::InvalidInput("No items provided".into()));
        }
        if let Some(item) = self.items.iter().find(|item| item.barcode.trim().is_empty()) {
            return Err(Error::InvalidInput(format!(
                "sale item with qty {} has an empty barcode",
                item.qty
            )));
        }
        if let Some(item) = self.items.iter().find(|item| item.qty == 0) {
            return Err(Error::InvalidInput(format!(
                "quantity for {} must be positive",
                item.barcode
            )));
        }
        if !self.total.is_finite() || self.total < 0.0 {
            return Err(Error::InvalidInput(format!(
                "total must be a non-negative number, got {}",
                self.total
            )));
        }
        Ok(())
    }
}

/// A completed checkout. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub items: Vec<SaleItem>,
    pub total: f64,
    #[serde(alias = "created_at")]
    pub timestamp: DateTime<Utc>,
}

impl Sale {
    /// Build a locally originated sale standing in for one the server has not
    /// confirmed yet.
    #[must_use]
    pub fn provisional(payload: &SalePayload) -> Self {
        Self::from_payload(SaleId::provisional(), payload)
    }

    #[must_use]
    pub fn from_payload(id: SaleId, payload: &SalePayload) -> Self {
        Self {
            id,
            items: payload.items.clone(),
            total: payload.total,
            timestamp: Utc::now(),
        }
    }

    /// Total number of units across all lines
    #[must_use]
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.qty)).sum()
    }
}
