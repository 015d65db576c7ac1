//! Per-lifecycle cancellation: a deadline plus a run-wide shutdown signal.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::CancelReason;

/// Run-wide shutdown switch shared by every lifecycle.
#[derive(Debug)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Ask every lifecycle to stop waiting and tear down.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Cancellation for a lifecycle that must finish within `timeout`.
    pub fn token(&self, timeout: Duration) -> Cancellation {
        Cancellation {
            timeout,
            deadline: Instant::now() + timeout,
            shutdown: self.tx.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation state carried by one lifecycle.
#[derive(Debug, Clone)]
pub struct Cancellation {
    timeout: Duration,
    deadline: Instant,
    shutdown: watch::Receiver<bool>,
}

impl Cancellation {
    /// `Some` once the lifecycle should give up.
    pub fn reason(&self) -> Option<CancelReason> {
        if *self.shutdown.borrow() {
            Some(CancelReason::Shutdown)
        } else if Instant::now() >= self.deadline {
            Some(CancelReason::DeadlineExceeded(self.timeout))
        } else {
            None
        }
    }

    /// Fail with the reason if cancellation has already fired.
    pub fn check(&self) -> Result<(), CancelReason> {
        match self.reason() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Resolves when the deadline passes or shutdown is triggered.
    pub async fn cancelled(&mut self) -> CancelReason {
        let timeout = self.timeout;
        let deadline = self.deadline;
        let shutdown = &mut self.shutdown;

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded(timeout),
            _ = async {
                // A dropped sender means shutdown can never fire; wait on the deadline.
                let closed = shutdown.wait_for(|triggered| *triggered).await.is_err();
                if closed {
                    std::future::pending::<()>().await;
                }
            } => CancelReason::Shutdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires() {
        let signal = ShutdownSignal::new();
        let mut token = signal.token(Duration::from_secs(30));
        assert!(token.check().is_ok());

        let start = Instant::now();
        let reason = token.cancelled().await;

        assert_eq!(
            reason,
            CancelReason::DeadlineExceeded(Duration::from_secs(30))
        );
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert!(token.check().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_fires_before_deadline() {
        let signal = ShutdownSignal::new();
        let mut token = signal.token(Duration::from_secs(600));

        let waiter = tokio::spawn(async move { token.cancelled().await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        signal.trigger();

        assert_eq!(waiter.await.unwrap(), CancelReason::Shutdown);
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_token_after_trigger_is_cancelled() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        let token = signal.token(Duration::from_secs(600));
        assert_eq!(token.reason(), Some(CancelReason::Shutdown));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_signal_still_honours_deadline() {
        let signal = ShutdownSignal::new();
        let mut token = signal.token(Duration::from_secs(5));
        drop(signal);

        assert_eq!(
            token.cancelled().await,
            CancelReason::DeadlineExceeded(Duration::from_secs(5))
        );
    }
}
