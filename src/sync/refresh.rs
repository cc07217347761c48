//! Background refresh of the library view.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::SyncEngine;
use crate::config::RefreshConfig;

/// Keep the library listing and download stats fresh until `cancel` fires.
///
/// Polls on two intervals and also refetches the listing as soon as the
/// store's library revision moves (after an ingest, a retry or a filter
/// change). Failures are logged and the next tick tries again. Only the
/// library fields of the store are written.
pub fn spawn_refresher(
    engine: Arc<SyncEngine>,
    config: &RefreshConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let library_every = Duration::from_secs(config.library_interval_secs.max(1));
    let stats_every = Duration::from_secs(config.download_stats_interval_secs.max(1));

    tokio::spawn(async move {
        let mut library_tick = tokio::time::interval(library_every);
        library_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats_tick = tokio::time::interval(stats_every);
        stats_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut changes = engine.store().subscribe();
        let mut seen_revision = engine.store().read(|s| s.library_revision());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Library refresher stopped");
                    break;
                }
                _ = library_tick.tick() => {
                    seen_revision = engine.store().read(|s| s.library_revision());
                    refresh_library(&engine).await;
                }
                _ = stats_tick.tick() => {
                    if let Err(e) = engine.refresh_download_stats().await {
                        tracing::warn!("Download stats refresh failed: {}", e);
                    }
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let revision = engine.store().read(|s| s.library_revision());
                    if revision != seen_revision {
                        seen_revision = revision;
                        tracing::debug!("Library invalidated (revision {})", revision);
                        refresh_library(&engine).await;
                    }
                }
            }
        }
    })
}

async fn refresh_library(engine: &SyncEngine) {
    match engine.refresh_library().await {
        Ok(total) => tracing::trace!("Library has {} entries", total),
        Err(e) => tracing::warn!("Library refresh failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockLibraryApi;
    use crate::config::Config;

    #[tokio::test(start_paused = true)]
    async fn test_refresher_polls_and_reacts_to_invalidation() {
        let api = Arc::new(MockLibraryApi::new());
        let engine = Arc::new(SyncEngine::new(api.clone(), &Config::default()));
        let cancel = CancellationToken::new();

        let handle = spawn_refresher(engine.clone(), &Config::default().refresh, cancel.clone());

        // Both intervals fire immediately on the first tick.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.library_calls().len(), 1);
        assert!(engine.store().read(|s| s.download_stats().is_some()));

        engine.store().update(|s| s.invalidate_library());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.library_calls().len(), 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(api.library_calls().len(), 3);

        cancel.cancel();
        handle.await.unwrap();
    }
}
