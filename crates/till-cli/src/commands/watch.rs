use std::future::Future;

use crate::commands::common::Session;
use crate::error::CliError;

pub async fn run_watch(session: &Session) -> Result<(), CliError> {
    println!(
        "Watching {} every {}s; press Ctrl-C to stop",
        session.config.api_url,
        session.config.probe_interval.as_secs()
    );
    let pending = watch_until(session, async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "Could not listen for Ctrl-C");
        }
    })
    .await?;
    println!("Stopped; {pending} write(s) still queued");
    Ok(())
}

/// Keep the background sync running until `shutdown` resolves, then report
/// how many writes are still queued.
pub(crate) async fn watch_until(
    session: &Session,
    shutdown: impl Future<Output = ()>,
) -> Result<usize, CliError> {
    let (monitor, replays) = session.spawn_background_sync();
    shutdown.await;
    monitor.abort();
    replays.abort();
    Ok(session.repo.pending_writes().await?.len())
}
