//! Checkout cart: scanned products on their way to becoming a sale.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{Product, SaleItem, SalePayload};
use crate::repository::SyncRepository;
use crate::util::round_to_cents;

/// One cart line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub qty: u32,
}

impl CartLine {
    pub fn subtotal(&self) -> f64 {
        self.product.price * f64::from(self.qty)
    }
}

/// Lines in scan order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add one unit; scanning the same barcode again bumps its quantity.
    pub fn add(&mut self, product: Product) {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product.barcode == product.barcode)
        {
            line.qty = line.qty.saturating_add(1);
        } else {
            self.lines.push(CartLine { product, qty: 1 });
        }
    }

    /// Resolve a scanned barcode and add it.
    pub async fn scan(&mut self, repo: &SyncRepository, barcode: &str) -> Result<&CartLine> {
        let barcode = barcode.trim();
        let product = repo
            .get_product(barcode)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no product with barcode {barcode}")))?;
        self.add(product);
        self.lines
            .iter()
            .find(|line| line.product.barcode == barcode)
            .ok_or_else(|| Error::NotFound(barcode.to_string()))
    }

    /// Set a line's quantity; zero removes the line.
    pub fn set_qty(&mut self, barcode: &str, qty: u32) -> Result<()> {
        if qty == 0 {
            return self.remove(barcode);
        }
        let line = self
            .lines
            .iter_mut()
            .find(|line| line.product.barcode == barcode)
            .ok_or_else(|| Error::NotFound(barcode.to_string()))?;
        line.qty = qty;
        Ok(())
    }

    pub fn remove(&mut self, barcode: &str) -> Result<()> {
        let before = self.lines.len();
        self.lines.retain(|line| line.product.barcode != barcode);
        if self.lines.len() == before {
            return Err(Error::NotFound(barcode.to_string()));
        }
        Ok(())
    }

    /// Sum of price × qty, rounded to cents
    pub fn total(&self) -> f64 {
        round_to_cents(self.lines.iter().map(CartLine::subtotal).sum())
    }

    pub fn to_payload(&self) -> Result<SalePayload> {
        if self.is_empty() {
            return Err(Error::InvalidInput("No items provided".into()));
        }
        Ok(SalePayload {
            items: self
                .lines
                .iter()
                .map(|line| SaleItem::new(line.product.barcode.clone(), line.qty))
                .collect(),
            total: self.total(),
        })
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::tests::setup;
    use pretty_assertions::assert_eq;

    fn milk() -> Product {
        Product::new("400", "Milk", 1.15, 10)
    }

    fn bread() -> Product {
        Product::new("500", "Bread", 2.3, 5)
    }

    #[test]
    fn test_rescanning_bumps_quantity() {
        let mut cart = Cart::new();
        cart.add(milk());
        cart.add(bread());
        cart.add(milk());

        let quantities: Vec<_> = cart
            .lines()
            .iter()
            .map(|l| (l.product.barcode.as_str(), l.qty))
            .collect();
        assert_eq!(quantities, vec![("400", 2), ("500", 1)]);
    }

    #[test]
    fn test_rescanning_saturates_quantity() {
        let mut cart = Cart::new();
        cart.add(milk());
        cart.set_qty("400", u32::MAX).unwrap();
        cart.add(milk());
        assert_eq!(cart.lines()[0].qty, u32::MAX);
    }

    #[test]
    fn test_total_rounds_to_cents() {
        let mut cart = Cart::new();
        cart.add(milk());
        cart.add(milk());
        cart.add(bread());
        assert!((cart.total() - 4.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_set_qty_and_remove() {
        let mut cart = Cart::new();
        cart.add(milk());
        cart.set_qty("400", 5).unwrap();
        assert_eq!(cart.lines()[0].qty, 5);

        cart.set_qty("400", 0).unwrap();
        assert!(cart.is_empty());
        assert!(cart.remove("400").is_err());
        assert!(cart.set_qty("nope", 1).is_err());
    }

    #[test]
    fn test_payload_requires_items() {
        let mut cart = Cart::new();
        assert!(matches!(cart.to_payload(), Err(Error::InvalidInput(_))));

        cart.add(bread());
        let payload = cart.to_payload().unwrap();
        assert_eq!(payload.items, vec![SaleItem::new("500", 1)]);
        assert!((payload.total - 2.3).abs() < f64::EPSILON);

        cart.clear();
        assert!(cart.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_scan_resolves_through_repository() {
        let (repo, _gateway, _signal) = setup(false).await;
        repo.upsert_product(milk()).await.unwrap();

        let mut cart = Cart::new();
        assert_eq!(cart.scan(&repo, " 400 ").await.unwrap().qty, 1);
        assert_eq!(cart.scan(&repo, "400").await.unwrap().qty, 2);
        assert!(matches!(
            cart.scan(&repo, "999").await,
            Err(Error::NotFound(_))
        ));
    }
}
