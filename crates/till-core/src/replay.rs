//! Queue replayer: drains pending writes once the backend is reachable.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::gateway::{recorded_sale, RemoteGateway};
use crate::models::{QueuedWrite, Sale, SalePayload};
use crate::store::LocalCache;

/// Result of one drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Writes accepted by the backend and removed from the queue
    pub replayed: usize,
    /// Writes still queued after the drain
    pub remaining: usize,
    /// Key of the write that stopped the drain
    pub stopped_at: Option<String>,
}

impl ReplayReport {
    pub const fn is_drained(&self) -> bool {
        self.remaining == 0
    }
}

/// What a trigger did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// This caller ran the drain (plus any re-runs requested meanwhile)
    Drained(ReplayReport),
    /// A drain was already running; it will run once more when it finishes
    Coalesced,
}

#[derive(Debug, Default)]
struct Flight {
    running: bool,
    rerun: bool,
}

fn lock_flight(flight: &Mutex<Flight>) -> MutexGuard<'_, Flight> {
    flight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the single-flight slot however the drain ends, including when
/// the trigger future is dropped mid-replay.
struct FlightRelease<'a>(&'a Mutex<Flight>);

impl Drop for FlightRelease<'_> {
    fn drop(&mut self) {
        let mut flight = lock_flight(self.0);
        flight.running = false;
        flight.rerun = false;
    }
}

/// Replays queued writes in enqueue order, one drain at a time.
pub struct QueueReplayer {
    cache: LocalCache,
    gateway: Arc<dyn RemoteGateway>,
    flight: Mutex<Flight>,
}

impl QueueReplayer {
    pub fn new(cache: LocalCache, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            cache,
            gateway,
            flight: Mutex::new(Flight::default()),
        }
    }

    /// Drain the queue unless a drain is already in progress.
    ///
    /// Failures never escape: they are logged and the affected writes stay
    /// queued for the next trigger.
    pub async fn trigger(&self) -> ReplayOutcome {
        {
            let mut flight = lock_flight(&self.flight);
            if flight.running {
                flight.rerun = true;
                tracing::debug!("Replay already running; coalescing trigger");
                return ReplayOutcome::Coalesced;
            }
            flight.running = true;
        }
        let _release = FlightRelease(&self.flight);

        let mut report = ReplayReport::default();
        loop {
            let pass = self.drain_logged().await;
            report.replayed += pass.replayed;
            report.remaining = pass.remaining;
            report.stopped_at = pass.stopped_at;

            let rerun = std::mem::take(&mut lock_flight(&self.flight).rerun);
            if !rerun {
                break;
            }
        }

        ReplayOutcome::Drained(report)
    }

    /// Trigger a drain on every offline-to-online transition, and once right
    /// away if already online. Runs until the task is aborted or the signal
    /// is dropped.
    pub fn spawn_on_reconnect(self: Arc<Self>, connectivity: Arc<dyn Connectivity>) -> JoinHandle<()> {
        let mut receiver = connectivity.subscribe();
        tokio::spawn(async move {
            let mut was_online = *receiver.borrow_and_update();
            if was_online {
                self.trigger().await;
            }

            while receiver.changed().await.is_ok() {
                let online = *receiver.borrow_and_update();
                if online && !was_online {
                    let replayer = Arc::clone(&self);
                    // Overlapping reconnects are coalesced by `trigger`
                    tokio::spawn(async move {
                        replayer.trigger().await;
                    });
                }
                was_online = online;
            }
        })
    }

    async fn drain_logged(&self) -> ReplayReport {
        match self.drain().await {
            Ok(report) => {
                if report.replayed > 0 || report.stopped_at.is_some() {
                    tracing::info!(
                        replayed = report.replayed,
                        remaining = report.remaining,
                        "Replayed pending writes"
                    );
                }
                report
            }
            Err(error) => {
                tracing::warn!(%error, "Replay aborted by local store error");
                let remaining = self.cache.queued_keys().await.map_or(0, |keys| keys.len());
                ReplayReport {
                    replayed: 0,
                    remaining,
                    stopped_at: None,
                }
            }
        }
    }

    async fn drain(&self) -> Result<ReplayReport> {
        let keys = self.cache.queued_keys().await?;
        let mut report = ReplayReport {
            remaining: keys.len(),
            ..ReplayReport::default()
        };

        for key in keys {
            let Some(write) = self.cache.queued(&key).await? else {
                report.remaining -= 1;
                continue;
            };

            match self.gateway.replay(&write).await {
                Ok(reply) => {
                    self.cache.dequeue(&key).await?;
                    report.replayed += 1;
                    report.remaining -= 1;
                    self.reconcile(&write, reply).await;
                }
                Err(error) => {
                    tracing::warn!(
                        %key,
                        path = %write.path,
                        %error,
                        "Replay failed; leaving this and later writes queued"
                    );
                    report.stopped_at = Some(key);
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Swap a confirmed provisional sale for the server's copy. The
    /// provisional copy stays when the reply does not describe a sale.
    async fn reconcile(&self, write: &QueuedWrite, reply: Value) {
        let Some(local_id) = &write.provisional_sale_id else {
            return;
        };

        let confirmed = match write
            .body
            .clone()
            .map(serde_json::from_value::<SalePayload>)
        {
            Some(Ok(payload)) => recorded_sale(reply, &payload),
            _ => serde_json::from_value::<Sale>(reply).map_err(Into::into),
        };
        let sale = match confirmed {
            Ok(sale) => sale,
            Err(error) => {
                tracing::debug!(
                    local = %local_id,
                    %error,
                    "Sale confirmed without a usable reply; keeping provisional copy"
                );
                return;
            }
        };

        if let Err(error) = self.cache.put_sale(&sale).await {
            tracing::warn!(sale_id = %sale.id, %error, "Could not mirror confirmed sale");
            return;
        }
        if sale.id != *local_id {
            if let Err(error) = self.cache.remove_sale(local_id).await {
                tracing::warn!(sale_id = %local_id, %error, "Could not drop provisional sale");
                return;
            }
        }
        tracing::debug!(local = %local_id, confirmed = %sale.id, "Provisional sale confirmed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivitySignal;
    use crate::models::{Product, SaleItem, SalePayload};
    use crate::repository::tests::{setup, StubGateway};
    use crate::repository::SyncRepository;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    async fn queue_products(repo: &SyncRepository, count: usize) -> Vec<String> {
        for index in 0..count {
            repo.upsert_product(Product::new(format!("P{index}"), "Item", 1.0, 1))
                .await
                .unwrap();
        }
        repo.cache().queued_keys().await.unwrap()
    }

    fn replayer(repo: &SyncRepository, gateway: &Arc<StubGateway>) -> QueueReplayer {
        QueueReplayer::new(repo.cache().clone(), gateway.clone())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_drain_removes_all_successful_writes() {
        let (repo, gateway, _signal) = setup(false).await;
        let keys = queue_products(&repo, 5).await;

        let outcome = replayer(&repo, &gateway).trigger().await;

        assert_eq!(
            outcome,
            ReplayOutcome::Drained(ReplayReport {
                replayed: 5,
                remaining: 0,
                stopped_at: None,
            })
        );
        assert!(repo.pending_writes().await.unwrap().is_empty());
        assert_eq!(*gateway.replayed.lock().await, keys);
        assert_eq!(gateway.products.lock().await.len(), 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_stops_and_preserves_order() {
        let (repo, gateway, _signal) = setup(false).await;
        let keys = queue_products(&repo, 2).await;
        gateway.fail_replay_keys.lock().await.push(keys[0].clone());

        let outcome = replayer(&repo, &gateway).trigger().await;

        assert_eq!(
            outcome,
            ReplayOutcome::Drained(ReplayReport {
                replayed: 0,
                remaining: 2,
                stopped_at: Some(keys[0].clone()),
            })
        );
        // The second write was never attempted
        assert!(gateway.replayed.lock().await.is_empty());
        assert_eq!(repo.cache().queued_keys().await.unwrap(), keys);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resumes_after_partial_failure() {
        let (repo, gateway, _signal) = setup(false).await;
        let keys = queue_products(&repo, 5).await;
        gateway.fail_replay_keys.lock().await.push(keys[2].clone());
        let replayer = replayer(&repo, &gateway);

        let ReplayOutcome::Drained(first) = replayer.trigger().await else {
            panic!("expected a drain");
        };
        assert_eq!(first.replayed, 2);
        assert_eq!(first.remaining, 3);
        assert_eq!(repo.cache().queued_keys().await.unwrap(), keys[2..].to_vec());

        gateway.fail_replay_keys.lock().await.clear();

        let ReplayOutcome::Drained(second) = replayer.trigger().await else {
            panic!("expected a drain");
        };
        assert_eq!(second.replayed, 3);
        assert!(second.is_drained());
        assert_eq!(*gateway.replayed.lock().await, keys);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreachable_backend_keeps_everything() {
        let (repo, gateway, _signal) = setup(false).await;
        queue_products(&repo, 3).await;
        gateway.failing.store(true, Ordering::SeqCst);

        let ReplayOutcome::Drained(report) = replayer(&repo, &gateway).trigger().await else {
            panic!("expected a drain");
        };
        assert_eq!(report.replayed, 0);
        assert_eq!(report.remaining, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_queue_is_a_no_op() {
        let (repo, gateway, _signal) = setup(true).await;
        let outcome = replayer(&repo, &gateway).trigger().await;
        assert_eq!(outcome, ReplayOutcome::Drained(ReplayReport::default()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_confirmed_sale_replaces_provisional_copy() {
        let (repo, gateway, signal) = setup(false).await;
        let local = repo
            .record_sale(SalePayload {
                items: vec![SaleItem::new("400", 3)],
                total: 4.5,
            })
            .await
            .unwrap();

        replayer(&repo, &gateway).trigger().await;

        assert_eq!(repo.cache().sale(&local.id).await.unwrap(), None);
        let sales = repo.cache().sales().await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].id.as_str(), "1");
        assert_eq!(sales[0].items, local.items);

        signal.set_online(true);
        assert_eq!(repo.list_sales(5).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_acknowledged_sale_keeps_a_local_copy() {
        let (repo, gateway, signal) = setup(false).await;
        let local = repo
            .record_sale(SalePayload {
                items: vec![SaleItem::new("400", 2)],
                total: 3.0,
            })
            .await
            .unwrap();
        gateway.ack_sales.store(true, Ordering::SeqCst);

        let ReplayOutcome::Drained(report) = replayer(&repo, &gateway).trigger().await else {
            panic!("expected a drain");
        };
        assert_eq!(report.replayed, 1);

        let sales = repo.cache().sales().await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].id.as_str(), "1");
        assert_eq!(sales[0].items, local.items);
        assert!((sales[0].total - 3.0).abs() < f64::EPSILON);
        assert_eq!(repo.cache().sale(&local.id).await.unwrap(), None);

        signal.set_online(false);
        assert_eq!(repo.list_sales(5).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreadable_sale_reply_keeps_provisional_copy() {
        let (repo, gateway, _signal) = setup(false).await;
        let local = repo
            .record_sale(SalePayload {
                items: vec![SaleItem::new("400", 1)],
                total: 1.5,
            })
            .await
            .unwrap();
        gateway.empty_replies.store(true, Ordering::SeqCst);

        replayer(&repo, &gateway).trigger().await;

        assert!(repo.pending_writes().await.unwrap().is_empty());
        assert_eq!(repo.cache().sale(&local.id).await.unwrap(), Some(local));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_drain_does_not_block_later_triggers() {
        let (repo, gateway, _signal) = setup(false).await;
        queue_products(&repo, 1).await;
        let replayer = replayer(&repo, &gateway);

        gateway.stall_replay.store(true, Ordering::SeqCst);
        let cancelled = tokio::time::timeout(Duration::from_millis(50), replayer.trigger()).await;
        assert!(cancelled.is_err());
        assert_eq!(repo.pending_writes().await.unwrap().len(), 1);

        gateway.stall_replay.store(false, Ordering::SeqCst);
        let ReplayOutcome::Drained(report) = replayer.trigger().await else {
            panic!("cancelled drain left the replayer busy");
        };
        assert_eq!(report.replayed, 1);
        assert!(report.is_drained());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_overlapping_triggers_are_coalesced() {
        let (repo, gateway, _signal) = setup(false).await;
        queue_products(&repo, 3).await;
        let replayer = replayer(&repo, &gateway);

        // Pretend a drain is in flight
        lock_flight(&replayer.flight).running = true;
        assert_eq!(replayer.trigger().await, ReplayOutcome::Coalesced);
        assert!(lock_flight(&replayer.flight).rerun);
        assert!(gateway.replayed.lock().await.is_empty());

        lock_flight(&replayer.flight).running = false;
        let ReplayOutcome::Drained(report) = replayer.trigger().await else {
            panic!("expected a drain");
        };
        assert_eq!(report.replayed, 3);
        // The coalesced request was consumed by the extra pass
        assert!(!lock_flight(&replayer.flight).rerun);
        assert!(!lock_flight(&replayer.flight).running);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_triggers_replay_each_write_once() {
        let (repo, gateway, _signal) = setup(false).await;
        let keys = queue_products(&repo, 10).await;
        let replayer = Arc::new(replayer(&repo, &gateway));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let replayer = Arc::clone(&replayer);
                tokio::spawn(async move { replayer.trigger().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*gateway.replayed.lock().await, keys);
        assert!(repo.pending_writes().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reconnect_triggers_replay() {
        let (repo, gateway, signal) = setup(false).await;
        queue_products(&repo, 2).await;
        let replayer = Arc::new(replayer(&repo, &gateway));
        let connectivity: Arc<dyn Connectivity> = Arc::new(signal.clone());

        let handle = replayer.spawn_on_reconnect(connectivity);
        signal.set_online(true);

        let mut drained = false;
        for _ in 0..100 {
            if repo.pending_writes().await.unwrap().is_empty() {
                drained = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(drained);
        assert_eq!(gateway.replayed.lock().await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_going_offline_does_not_trigger() {
        let signal = ConnectivitySignal::new(true);
        let (repo, gateway, _unused) = setup(true).await;
        let replayer = Arc::new(replayer(&repo, &gateway));

        let handle = replayer.spawn_on_reconnect(Arc::new(signal.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;

        signal.set_online(false);
        repo.cache()
            .enqueue(
                &QueuedWrite::upsert_product(
                    repo.cache().next_queue_key(),
                    &Product::new("late", "Late", 1.0, 1),
                )
                .unwrap(),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(repo.pending_writes().await.unwrap().len(), 1);
    }
}
