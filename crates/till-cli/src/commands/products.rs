use till_core::Product;

use crate::commands::common::{format_product_lines, print_lines, Session};
use crate::error::CliError;

pub async fn run_list(session: &Session, query: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let products = session.repo.list_products(query).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&products)?);
    } else {
        print_lines(&format_product_lines(&products), "No products found.");
    }
    Ok(())
}

pub async fn run_get(session: &Session, barcode: &str, as_json: bool) -> Result<(), CliError> {
    let product = session
        .repo
        .get_product(barcode.trim())
        .await?
        .ok_or_else(|| CliError::ProductNotFound(barcode.trim().to_string()))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&product)?);
    } else {
        print_lines(&format_product_lines(std::slice::from_ref(&product)), "");
    }
    Ok(())
}

pub async fn run_upsert(session: &Session, product: Product) -> Result<(), CliError> {
    let saved = session.repo.upsert_product(product).await?;
    if session.is_online() {
        println!("Saved {} ({})", saved.barcode, saved.name);
    } else {
        println!("Saved {} ({}) offline; queued for sync", saved.barcode, saved.name);
    }
    Ok(())
}
