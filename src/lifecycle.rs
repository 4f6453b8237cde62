//! Session lifecycle management
//!
//! Two independent mechanisms: an inactivity timer that forces a full
//! cleanup and sign-out after the idle threshold, and the explicit
//! logout cleanup routine. Cleanup is fail-safe toward more deletion:
//! the local wipe happens first and is never rolled back, whatever the
//! external revocation or sign-out calls do afterwards.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::cache::TieredCache;
use crate::entry::CacheEntry;
use crate::policy::is_sensitive_key;
use crate::store::Tier;

// ============================================================================
// External hooks
// ============================================================================

/// Seam to the authentication/push collaborators
pub trait SessionHooks: Send + Sync {
    /// Revoke/close any open external real-time subscriptions
    fn revoke_push_subscriptions(&self) -> anyhow::Result<()>;

    /// Invoke the external sign-out call
    fn sign_out(&self) -> anyhow::Result<()>;
}

/// Hooks for hosts with no external session machinery
pub struct NoopHooks;

impl SessionHooks for NoopHooks {
    fn revoke_push_subscriptions(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn sign_out(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Inactivity timer
// ============================================================================

/// Single re-armable timer driving the idle threshold
///
/// Every qualifying user-activity signal (pointer, keyboard, scroll,
/// touch) funnels into `record_activity`, pushing the deadline out. If
/// the deadline is reached uninterrupted, the timeout action runs once
/// and the timer stops.
pub struct IdleTimer {
    threshold: Duration,
    deadline_tx: watch::Sender<Option<Instant>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IdleTimer {
    pub fn new(threshold: Duration) -> Self {
        let (deadline_tx, _) = watch::channel(None);
        Self {
            threshold,
            deadline_tx,
            handle: Mutex::new(None),
        }
    }

    /// Arm the timer and spawn its watch task
    pub fn start(&self, on_timeout: Arc<dyn Fn() + Send + Sync>) {
        self.stop();

        let mut rx = self.deadline_tx.subscribe();
        let _ = self
            .deadline_tx
            .send(Some(Instant::now() + self.threshold));

        let task = tokio::spawn(async move {
            loop {
                let deadline = *rx.borrow_and_update();
                match deadline {
                    None => {
                        if rx.changed().await.is_err() {
                            return;
                        }
                    }
                    Some(deadline) => {
                        tokio::select! {
                            _ = tokio::time::sleep_until(deadline) => {
                                on_timeout();
                                return;
                            }
                            changed = rx.changed() => {
                                if changed.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        });

        *self.handle.lock().expect("idle timer lock poisoned") = Some(task);
    }

    /// Re-arm the deadline after a user-activity signal
    pub fn record_activity(&self) {
        let _ = self
            .deadline_tx
            .send(Some(Instant::now() + self.threshold));
    }

    /// Cancel the timer
    pub fn stop(&self) {
        let _ = self.deadline_tx.send(None);
        if let Some(task) = self.handle.lock().expect("idle timer lock poisoned").take() {
            task.abort();
        }
    }
}

// ============================================================================
// Lifecycle manager
// ============================================================================

/// Governs idle-timeout detection and full session/cache teardown
pub struct SessionLifecycle {
    cache: Arc<TieredCache>,
    hooks: Arc<dyn SessionHooks>,
    timer: IdleTimer,
}

impl SessionLifecycle {
    pub fn new(cache: Arc<TieredCache>, hooks: Arc<dyn SessionHooks>) -> Arc<Self> {
        let threshold = cache.config().idle_threshold;
        Arc::new(Self {
            cache,
            hooks,
            timer: IdleTimer::new(threshold),
        })
    }

    /// Begin watching for inactivity
    pub fn start_idle_watch(self: &Arc<Self>) {
        let this = self.clone();
        self.timer.start(Arc::new(move || {
            warn!("Idle threshold reached, forcing session cleanup");
            this.on_idle_timeout();
        }));
    }

    /// Funnel for every qualifying user-activity signal
    pub fn record_activity(&self) {
        self.timer.record_activity();
    }

    /// Login hook; the cache itself does nothing, callers conventionally
    /// warm reference data afterwards
    pub fn on_login(&self) {
        info!("Session login");
    }

    /// Explicit logout requested by the user
    pub fn on_logout(&self) {
        info!("Session logout");
        self.timer.stop();
        self.logout_cleanup();
    }

    /// Idle threshold fired; same cleanup as an explicit logout
    pub fn on_idle_timeout(&self) {
        self.logout_cleanup();
    }

    /// Deterministic teardown sequence
    ///
    /// 1. read the allow-listed preference entries, 2. wipe every tier,
    /// 3. write the preserved entries back verbatim, 4. close the sync
    /// channel, 5. revoke external subscriptions, 6. external sign-out.
    /// Steps 5 and 6 are independently guarded; the wipe is never rolled
    /// back.
    fn logout_cleanup(&self) {
        let mut preserved: Vec<(Tier, String, CacheEntry)> = Vec::new();
        for tier in [Tier::DurableProfile, Tier::DurableSession] {
            for key in &self.cache.config().preserved_keys {
                // The allow-list is non-sensitive by definition; a
                // sensitive key smuggled into it is still wiped
                if is_sensitive_key(key) {
                    continue;
                }
                if let Some(entry) = self.cache.peek(tier, key) {
                    preserved.push((tier, key.clone(), entry));
                }
            }
        }

        self.cache.clear();

        for (tier, key, entry) in preserved {
            self.cache.restore_entry(tier, &key, entry);
        }

        self.cache.close_sync();

        if let Err(e) = self.hooks.revoke_push_subscriptions() {
            warn!(error = %e, "Push subscription revocation failed after wipe");
        }
        if let Err(e) = self.hooks.sign_out() {
            warn!(error = %e, "External sign-out failed after wipe");
        }

        info!("Session cleanup completed");
    }
}
