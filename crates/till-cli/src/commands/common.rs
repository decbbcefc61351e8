use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use till_core::{
    ClientConfig, ConnectivityMonitor, ConnectivitySignal, HttpGateway, InventoryChange,
    LibSqlStore, LocalCache, Product, QueueReplayer, QueuedWrite, RemoteGateway, ReplayOutcome,
    ReplayReport, Sale, SaleItem, SyncRepository,
};

use crate::cli::GlobalOptions;
use crate::error::CliError;

/// Everything one command invocation needs
pub struct Session {
    pub config: ClientConfig,
    pub repo: SyncRepository,
    gateway: Arc<dyn RemoteGateway>,
    signal: ConnectivitySignal,
    replayer: Arc<QueueReplayer>,
}

impl Session {
    /// Open the local store and decide connectivity with one probe, unless
    /// `--offline` was given.
    pub async fn open(options: &GlobalOptions) -> Result<Self, CliError> {
        let config = resolve_config(options, ClientConfig::from_env()?);
        Self::open_with(config, options.offline).await
    }

    pub async fn open_with(config: ClientConfig, offline: bool) -> Result<Self, CliError> {
        let gateway: Arc<dyn RemoteGateway> = Arc::new(HttpGateway::from_config(&config)?);
        let store = Arc::new(LibSqlStore::open(&config.db_path).await?);
        let cache = LocalCache::new(store).await?;
        let signal = ConnectivitySignal::new(false);

        if offline {
            tracing::debug!("Offline mode forced; backend will not be contacted");
        } else if !ConnectivityMonitor::new(Arc::clone(&gateway), signal.clone())
            .check()
            .await
        {
            tracing::warn!(api_url = %config.api_url, "Backend unreachable; working offline");
        }

        Ok(Self {
            repo: SyncRepository::new(
                cache.clone(),
                Arc::clone(&gateway),
                Arc::new(signal.clone()),
            ),
            replayer: Arc::new(QueueReplayer::new(cache, Arc::clone(&gateway))),
            gateway,
            signal,
            config,
        })
    }

    pub fn is_online(&self) -> bool {
        self.repo.is_online()
    }

    /// Drain the queue, logging rather than failing.
    pub async fn replay_pending(&self) -> Option<ReplayReport> {
        match self.replayer.trigger().await {
            ReplayOutcome::Drained(report) => {
                if report.replayed > 0 {
                    tracing::info!(replayed = report.replayed, "Replayed queued writes");
                }
                if let Some(key) = &report.stopped_at {
                    tracing::warn!(%key, remaining = report.remaining, "Replay stopped early");
                }
                Some(report)
            }
            ReplayOutcome::Coalesced => None,
        }
    }

    /// Probe the backend every `probe_interval` and replay the queue each
    /// time it comes back. Both tasks run until aborted.
    pub fn spawn_background_sync(&self) -> (JoinHandle<()>, JoinHandle<()>) {
        let replays = Arc::clone(&self.replayer).spawn_on_reconnect(Arc::new(self.signal.clone()));
        let monitor = ConnectivityMonitor::new(Arc::clone(&self.gateway), self.signal.clone())
            .spawn(self.config.probe_interval);
        (monitor, replays)
    }
}

/// Command-line flags win over the environment.
pub fn resolve_config(options: &GlobalOptions, mut config: ClientConfig) -> ClientConfig {
    if let Some(path) = &options.db_path {
        config.db_path.clone_from(path);
    }
    if let Some(url) = &options.api_url {
        config.api_url.clone_from(url);
    }
    config
}

/// Parse `BARCODE` or `BARCODE:QTY`.
pub fn parse_item(raw: &str) -> Result<SaleItem, CliError> {
    let invalid = || CliError::InvalidItem(raw.to_string());
    let (barcode, qty) = match raw.rsplit_once(':') {
        Some((barcode, qty)) => (barcode, qty.trim().parse::<u32>().map_err(|_| invalid())?),
        None => (raw, 1),
    };
    let barcode = barcode.trim();
    if barcode.is_empty() || qty == 0 {
        return Err(invalid());
    }
    Ok(SaleItem::new(barcode, qty))
}

pub fn format_money(amount: f64) -> String {
    format!("{amount:.2}")
}

pub fn format_product_lines(products: &[Product]) -> Vec<String> {
    let width = products
        .iter()
        .map(|product| product.barcode.len())
        .max()
        .unwrap_or(0);
    products
        .iter()
        .map(|product| {
            format!(
                "{:<width$}  {:>8}  {:>5}  {}",
                product.barcode,
                format_money(product.price),
                product.stock,
                product.name
            )
        })
        .collect()
}

pub fn format_sale_lines(sales: &[Sale], now: DateTime<Utc>) -> Vec<String> {
    sales
        .iter()
        .map(|sale| {
            format!(
                "{}  {:>9}  {} item(s)  {}",
                sale.id,
                format_money(sale.total),
                sale.unit_count(),
                format_relative_time(sale.timestamp, now)
            )
        })
        .collect()
}

pub fn format_change_lines(changes: &[InventoryChange], now: DateTime<Utc>) -> Vec<String> {
    changes
        .iter()
        .map(|change| {
            let delta = change
                .delta_stock
                .map_or_else(|| "-".to_string(), |delta| format!("{delta:+}"));
            format!(
                "{:<8}  {:>5}  {}  ({})",
                change.barcode,
                delta,
                change.details,
                format_relative_time(change.timestamp, now)
            )
        })
        .collect()
}

pub fn format_queue_lines(writes: &[QueuedWrite]) -> Vec<String> {
    writes
        .iter()
        .map(|write| {
            let mut line = format!("{}  {} {}", write.key, write.method, write.path);
            if let Some(sale_id) = &write.provisional_sale_id {
                line.push_str(&format!("  (sale {sale_id})"));
            }
            line
        })
        .collect()
}

pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - at).num_seconds().max(0);
    let minute = 60;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn print_lines(lines: &[String], empty_message: &str) {
    if lines.is_empty() {
        println!("{empty_message}");
    }
    for line in lines {
        println!("{line}");
    }
}
