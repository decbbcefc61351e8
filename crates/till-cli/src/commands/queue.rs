use crate::commands::common::{format_queue_lines, print_lines, Session};
use crate::error::CliError;

pub async fn run_queue(session: &Session, as_json: bool) -> Result<(), CliError> {
    let writes = session.repo.pending_writes().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&writes)?);
    } else {
        print_lines(&format_queue_lines(&writes), "Nothing queued.");
    }
    Ok(())
}
