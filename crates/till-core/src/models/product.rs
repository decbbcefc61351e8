//! Product model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A product in the inventory, identified by its barcode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Barcode; immutable identity of the product
    pub barcode: String,
    /// Display name
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub name: String,
    /// Unit price
    pub price: f64,
    /// Units on hand
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub stock: u32,
}

impl Product {
    /// Create a product with the given fields
    #[must_use]
    pub fn new(barcode: impl Into<String>, name: impl Into<String>, price: f64, stock: u32) -> Self {
        Self {
            barcode: barcode.into(),
            name: name.into(),
            price,
            stock,
        }
    }

    /// Reject products that could never be persisted remotely.
    pub fn validate(&self) -> Result<()> {
        if self.barcode.trim().is_empty() {
            return Err(Error::InvalidInput("barcode must not be empty".into()));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(Error::InvalidInput(format!(
                "price must be a non-negative number, got {}",
                self.price
            )));
        }
        Ok(())
    }

    /// Case-insensitive substring match on the product name.
    ///
    /// An empty (or whitespace-only) query matches everything.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim();
        query.is_empty() || self.name.to_lowercase().contains(&query.to_lowercase())
    }
}
