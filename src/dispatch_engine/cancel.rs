//! Cooperative cancellation for dispatched operations

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Flag checked by the dispatcher before every retry, wait and poll step
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every waiter
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once the flag is raised
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before re-checking so a concurrent cancel is not missed
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep until `deadline`. Returns `false` if cancelled first.
    pub async fn sleep_until(&self, deadline: Instant) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => !self.is_cancelled(),
            () = self.cancelled() => false,
        }
    }
}

/// Raises the flag when dropped unless disarmed.
///
/// Held by the caller side of a dispatch so that dropping the caller's
/// future stops the spawned operation at its next step.
#[derive(Debug)]
pub struct CancelOnDrop {
    flag: Arc<CancelFlag>,
    armed: bool,
}

impl CancelOnDrop {
    pub fn new(flag: Arc<CancelFlag>) -> Self {
        Self { flag, armed: true }
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.flag.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn sleep_wakes_early_on_cancel() {
        let flag = Arc::new(CancelFlag::new());
        let waiter = {
            let flag = Arc::clone(&flag);
            tokio::spawn(async move {
                flag.sleep_until(Instant::now() + Duration::from_secs(3600)).await
            })
        };
        tokio::task::yield_now().await;
        flag.cancel();
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_when_not_cancelled() {
        let flag = CancelFlag::new();
        assert!(flag.sleep_until(Instant::now() + Duration::from_millis(10)).await);
    }

    #[test]
    fn guard_cancels_on_drop() {
        let flag = Arc::new(CancelFlag::new());
        drop(CancelOnDrop::new(Arc::clone(&flag)));
        assert!(flag.is_cancelled());

        let flag = Arc::new(CancelFlag::new());
        CancelOnDrop::new(Arc::clone(&flag)).disarm();
        assert!(!flag.is_cancelled());
    }
}
