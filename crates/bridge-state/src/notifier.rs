use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// A single-use completion notifier (§4.10, design notes §9).
///
/// Armed at admission time, *before* the task is dispatched to the executor,
/// so a subscriber that registers immediately after arming can never miss a
/// very-fast completion. `fire()` is idempotent; only the first call has an
/// effect, matching "signaled exactly once" (§5 ordering guarantees).
#[derive(Debug, Default)]
pub struct Notifier {
    notify: Notify,
    fired: AtomicBool,
}

impl Notifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            notify: Notify::new(),
            fired: AtomicBool::new(false),
        })
    }

    /// Signal completion to the single waiter this notifier is armed for.
    /// `notify_one` stores a permit even if nothing is waiting yet, so a
    /// `wait()` call that starts after `fire()` still sees it immediately;
    /// `notify_waiters` would not, since it only reaches waiters already
    /// registered at the moment it's called.
    pub fn fire(&self) {
        if self
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.notify.notify_one();
        }
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Wait for `fire()` or `timeout`, whichever comes first. Returns `true`
    /// if the fire happened (or had already happened) before the deadline.
    pub async fn wait(&self, timeout: Duration) -> bool {
        if self.is_fired() {
            return true;
        }
        let notified = self.notify.notified();
        tokio::select! {
            _ = notified => true,
            _ = tokio::time::sleep(timeout) => self.is_fired(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fires_before_wait_is_seen() {
        let n = Notifier::new();
        n.fire();
        assert!(n.wait(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn wait_times_out_without_fire() {
        let n = Notifier::new();
        assert!(!n.wait(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn concurrent_waiter_is_woken() {
        let n = Notifier::new();
        let n2 = n.clone();
        let handle = tokio::spawn(async move { n2.wait(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        n.fire();
        assert!(handle.await.unwrap());
    }
}
