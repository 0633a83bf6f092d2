//! Exponential-backoff retry scheduling
//!
//! A [`BackoffScheduler`] owns one fixed action and schedules it after a
//! delay that doubles on every reported failure, saturating at a ceiling.
//! Two independent instances exist per registry:
//!
//! - change-listener registration retry (1s initial, 60s ceiling)
//! - account-authority readiness polling (250ms initial, 4s ceiling)
//!
//! ## No double-fire
//!
//! Every (re)schedule bumps a generation counter under the scheduler's lock.
//! A delayed task re-checks the generation under the same lock immediately
//! before firing, so a fire that lost the race against a reschedule or a
//! `stop()` observes a stale generation and returns without running the
//! action.

use crate::config::BackoffConfig;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// The scheduled action: a factory for one attempt's future
pub type BackoffAction =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct Inner {
    /// Delay the next schedule will use
    delay: Duration,
    /// Bumped on every schedule/stop; stale tasks must not fire
    generation: u64,
    /// Currently pending delayed task, if any
    pending: Option<JoinHandle<()>>,
}

/// Generic exponential-backoff retry primitive
pub struct BackoffScheduler {
    config: BackoffConfig,
    action: BackoffAction,
    inner: Mutex<Inner>,
}

impl BackoffScheduler {
    /// Create a scheduler for a fixed action
    ///
    /// Nothing is scheduled until [`BackoffScheduler::start`] is called.
    pub fn new(config: BackoffConfig, action: BackoffAction) -> Arc<Self> {
        let delay = config.initial_delay();
        Arc::new(Self {
            config,
            action,
            inner: Mutex::new(Inner {
                delay,
                generation: 0,
                pending: None,
            }),
        })
    }

    /// Schedule the action after the initial delay
    ///
    /// Cancels any pending schedule and resets the delay sequence.
    pub fn start(self: &Arc<Self>) {
        let mut inner = self.inner.lock().expect("backoff lock poisoned");
        inner.delay = self.config.initial_delay();
        let delay = inner.delay;
        self.schedule_locked(&mut inner, delay);
    }

    /// Report a failed attempt: reschedule after double the delay, capped
    pub fn notify_failed(self: &Arc<Self>) {
        let mut inner = self.inner.lock().expect("backoff lock poisoned");
        inner.delay = (inner.delay * self.config.multiplier).min(self.config.ceiling());
        let delay = inner.delay;
        debug!(delay_ms = delay.as_millis() as u64, "backoff rescheduled");
        self.schedule_locked(&mut inner, delay);
    }

    /// Cancel any pending schedule and reset the delay to initial
    pub fn stop(&self) {
        let mut inner = self.inner.lock().expect("backoff lock poisoned");
        inner.generation += 1;
        if let Some(handle) = inner.pending.take() {
            handle.abort();
        }
        inner.delay = self.config.initial_delay();
    }

    fn schedule_locked(self: &Arc<Self>, inner: &mut Inner, delay: Duration) {
        inner.generation += 1;
        let generation = inner.generation;
        if let Some(handle) = inner.pending.take() {
            handle.abort();
        }

        let scheduler = Arc::clone(self);
        inner.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Re-check under the lock: a reschedule or stop that raced this
            // wakeup owns the next fire.
            let action = {
                let mut inner = scheduler.inner.lock().expect("backoff lock poisoned");
                if inner.generation != generation {
                    return;
                }
                inner.pending = None;
                Arc::clone(&scheduler.action)
            };
            (action)().await;
        }));
    }
}

impl Drop for BackoffScheduler {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(handle) = inner.pending.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_scheduler(
        initial_ms: u64,
        ceiling_ms: u64,
    ) -> (Arc<BackoffScheduler>, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_action = Arc::clone(&fired);
        let scheduler = BackoffScheduler::new(
            BackoffConfig {
                initial_delay_ms: initial_ms,
                ceiling_ms,
                multiplier: 2,
            },
            Arc::new(move || {
                let fired = Arc::clone(&fired_in_action);
                Box::pin(async move {
                    fired.fetch_add(1, Ordering::SeqCst);
                })
            }),
        );
        (scheduler, fired)
    }

    #[tokio::test]
    async fn fires_once_after_initial_delay() {
        let (scheduler, fired) = counting_scheduler(10, 80);

        scheduler.start();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1, "no repeat without notify_failed");
    }

    #[tokio::test]
    async fn notify_failed_doubles_up_to_ceiling() {
        let (scheduler, fired) = counting_scheduler(10, 40);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // 20ms
        scheduler.notify_failed();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        // 40ms (ceiling), then saturate
        scheduler.notify_failed();
        scheduler.notify_failed();
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3, "reschedule replaces, never stacks");
    }

    #[tokio::test]
    async fn stop_cancels_pending_fire_and_resets() {
        let (scheduler, fired) = counting_scheduler(20, 160);

        scheduler.start();
        scheduler.notify_failed();
        scheduler.stop();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // After stop the sequence restarts at the initial delay
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reschedule_supersedes_pending_schedule() {
        let (scheduler, fired) = counting_scheduler(30, 240);

        scheduler.start();
        // Before the 30ms fire lands, push it out to 60ms
        tokio::time::sleep(Duration::from_millis(5)).await;
        scheduler.notify_failed();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0, "superseded schedule must not fire");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
