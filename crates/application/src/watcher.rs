//! Hot-reload loop over the policy directory.
//!
//! Each wake is an independent apply attempt: parse the directory, compile,
//! apply. Failures are logged and the loop continues; the in-flight apply is
//! never interrupted, cancellation is honoured between iterations.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::policy_service::PolicyService;

/// Run the reload loop until `cancel` fires.
///
/// The first attempt happens immediately, then once per configured reload
/// interval. Spawn on the runtime and await the handle during shutdown so a
/// mutation in progress completes before the process exits.
pub async fn watch_and_reload(service: Arc<PolicyService>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(service.reload_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        interval_secs = service.reload_interval().as_secs(),
        "policy watcher started"
    );

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("policy watcher shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = service.apply_directory().await {
                    tracing::warn!(error = %e, "hot-reload failed");
                }
            }
        }
    }
}
