//! Session sweeper — TTL eviction for the in-memory store
//!
//! Sessions are never deleted by the dialogue itself, so without a sweep
//! the map grows for the life of the process. This loop drops sessions
//! that have been idle past the configured TTL.

use tokio::sync::broadcast;

use mishwar_core::config::SessionConfig;
use mishwar_core::SessionStore;

/// Called from main.rs to start the background eviction loop.
pub async fn run_sweeper_loop(
    store: SessionStore,
    config: SessionConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let interval = tokio::time::Duration::from_secs(config.sweep_interval_minutes * 60);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let ttl = chrono::Duration::minutes(config.idle_ttl_minutes as i64);

    tracing::info!(
        "Session sweeper started (interval: {}min, ttl: {}min)",
        config.sweep_interval_minutes,
        config.idle_ttl_minutes
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = store.evict_idle(ttl).await;
                if evicted > 0 {
                    tracing::info!("Session sweep complete: {} idle sessions evicted", evicted);
                } else {
                    tracing::debug!("Session sweep complete: nothing to evict");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Session sweeper shutting down");
                break;
            }
        }
    }
}
