//! Data models for Till

mod inventory_change;
mod product;
mod queued_write;
mod sale;

pub use inventory_change::InventoryChange;
pub use product::Product;
pub use queued_write::{HttpMethod, QueuedWrite};
pub use sale::{Sale, SaleId, SaleItem, SalePayload};

use serde::{Deserialize, Deserializer};

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
