//! Background task that keeps a shared `ProgressStore` moving: it fires
//! auto-advance and debounced flush timers, applies changes made by other
//! contexts, and forces a final flush on shutdown.

use std::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use storage::{ChangeSubscription, StorageChange};

use super::state::ExternalOutcome;
use super::store::ProgressStore;

pub type SharedStore = Arc<Mutex<ProgressStore>>;

enum DriverEvent {
    Deadline,
    External(StorageChange),
    ChangesClosed,
    Revision,
    Shutdown,
}

/// Drive `store` until `shutdown` flips to `true` (or its sender is dropped).
///
/// Deadlines are read from the store's clock, so this is meant for a system
/// clock; tests with a manual clock call `tick` directly.
pub async fn run_driver(
    store: SharedStore,
    mut changes: Option<ChangeSubscription>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut revisions = store.lock().await.subscribe();
    debug!(cross_context = changes.is_some(), "progress driver started");

    loop {
        let wait = {
            let guard = store.lock().await;
            guard.next_deadline().map(|deadline| {
                (deadline - guard.clock().now())
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            })
        };

        let event = tokio::select! {
            () = sleep_for(wait) => DriverEvent::Deadline,
            change = next_change(&mut changes) => match change {
                Some(change) => DriverEvent::External(change),
                None => DriverEvent::ChangesClosed,
            },
            res = revisions.changed() => match res {
                Ok(()) => DriverEvent::Revision,
                Err(_) => DriverEvent::Shutdown,
            },
            res = shutdown.changed() => match res {
                Ok(()) if !*shutdown.borrow() => DriverEvent::Revision,
                _ => DriverEvent::Shutdown,
            },
        };

        match event {
            DriverEvent::Deadline => {
                let report = store.lock().await.tick().await;
                if let Some(Err(err)) = &report.submitted {
                    warn!(error = %err, "auto-submit did not complete");
                }
                if report.flushed == Some(false) {
                    warn!("debounced flush was not persisted");
                }
            }
            DriverEvent::External(change) => {
                let outcome = store.lock().await.apply_external_change(&change);
                if outcome != ExternalOutcome::Ignored {
                    debug!(?outcome, key = %change.key, "applied change from another context");
                }
            }
            DriverEvent::ChangesClosed => {
                debug!("cross-context change feed closed");
                changes = None;
            }
            DriverEvent::Revision => {}
            DriverEvent::Shutdown => break,
        }
    }

    let flushed = store.lock().await.flush_now().await;
    info!(?flushed, "progress driver stopped");
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => future::pending().await,
    }
}

async fn next_change(changes: &mut Option<ChangeSubscription>) -> Option<StorageChange> {
    match changes {
        Some(subscription) => subscription.recv().await,
        None => future::pending().await,
    }
}
