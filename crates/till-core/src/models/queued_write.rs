//! Pending write recorded while offline

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Product, SaleId, SalePayload};
use crate::error::Result;

pub(crate) const UPSERT_PRODUCT_PATH: &str = "/api/products/upsert";
pub(crate) const SALE_PAID_PATH: &str = "/api/sale/paid";

/// HTTP verb of a queued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// A request that could not reach the backend and waits for replay.
///
/// `key` doubles as the replay order: keys are fixed-width timestamps, so
/// lexical order is enqueue order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedWrite {
    pub key: String,
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// Locally synthesized sale this write stands in for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisional_sale_id: Option<SaleId>,
}

impl QueuedWrite {
    pub(crate) fn upsert_product(key: String, product: &Product) -> Result<Self> {
        Ok(Self {
            key,
            path: UPSERT_PRODUCT_PATH.to_string(),
            method: HttpMethod::Post,
            body: Some(serde_json::to_value(product)?),
            provisional_sale_id: None,
        })
    }

    pub(crate) fn sale_paid(key: String, payload: &SalePayload, local_id: SaleId) -> Result<Self> {
        Ok(Self {
            key,
            path: SALE_PAID_PATH.to_string(),
            method: HttpMethod::Post,
            body: Some(serde_json::to_value(payload)?),
            provisional_sale_id: Some(local_id),
        })
    }
}
