use crate::commands::common::Session;
use crate::error::CliError;

pub async fn run_sync(session: &Session) -> Result<(), CliError> {
    if !session.is_online() {
        let pending = session.repo.pending_writes().await?.len();
        println!(
            "Backend unreachable at {}; {pending} write(s) still queued",
            session.config.api_url
        );
        return Ok(());
    }

    match session.replay_pending().await {
        Some(report) if report.is_drained() => {
            println!("Sync completed: {} write(s) replayed", report.replayed);
        }
        Some(report) => {
            println!(
                "Sync stopped at {}: {} replayed, {} still queued",
                report.stopped_at.as_deref().unwrap_or("?"),
                report.replayed,
                report.remaining
            );
        }
        None => println!("Sync already in progress"),
    }
    Ok(())
}
