use chrono::Utc;

use crate::commands::common::{format_change_lines, print_lines, Session};
use crate::error::CliError;

pub async fn run_changes(session: &Session, limit: usize, as_json: bool) -> Result<(), CliError> {
    let changes = session.repo.inventory_changes(limit).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
    } else {
        print_lines(
            &format_change_lines(&changes, Utc::now()),
            "No inventory changes recorded.",
        );
    }
    Ok(())
}
