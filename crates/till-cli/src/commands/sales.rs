use chrono::Utc;
use till_core::{Cart, SalePayload};

use crate::commands::common::{
    format_money, format_sale_lines, parse_item, print_lines, Session,
};
use crate::error::CliError;

pub async fn run_list(session: &Session, limit: usize, as_json: bool) -> Result<(), CliError> {
    let sales = session.repo.list_sales(limit).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&sales)?);
    } else {
        print_lines(&format_sale_lines(&sales, Utc::now()), "No sales recorded.");
    }
    Ok(())
}

pub async fn run_record(session: &Session, raw_items: &[String]) -> Result<(), CliError> {
    let payload = build_payload(session, raw_items).await?;
    let sale = session.repo.record_sale(payload).await?;

    let suffix = if session.is_online() {
        ""
    } else {
        " offline; queued for sync"
    };
    println!(
        "Sale {} recorded: {} item(s), total {}{suffix}",
        sale.id,
        sale.unit_count(),
        format_money(sale.total)
    );
    Ok(())
}

/// Resolve every item through the repository so totals use known prices.
pub(crate) async fn build_payload(session: &Session, raw_items: &[String]) -> Result<SalePayload, CliError> {
    let mut cart = Cart::new();
    for raw in raw_items {
        let item = parse_item(raw)?;
        let previous = cart
            .lines()
            .iter()
            .find(|line| line.product.barcode == item.barcode)
            .map_or(0, |line| line.qty);
        let qty = previous
            .checked_add(item.qty)
            .ok_or_else(|| CliError::InvalidItem(raw.clone()))?;
        cart.scan(&session.repo, &item.barcode).await?;
        cart.set_qty(&item.barcode, qty)?;
    }
    Ok(cart.to_payload()?)
}
