//! Run cancellation

use std::future::Future;
use tokio::sync::watch;

/// Observes an operator interrupt.
///
/// The default token is never cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// Create a token and the sender that trips it with `true`
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx: Some(rx) })
    }

    /// Whether the interrupt has been delivered
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once the interrupt is delivered
    pub async fn cancelled(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };

        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without cancelling
                return std::future::pending().await;
            }
        }
    }

    /// Drive `future` unless the interrupt arrives first.
    ///
    /// `None` means interrupted. A token that is already cancelled wins over
    /// a future that is already ready.
    pub async fn run_until_cancelled<F: Future>(&mut self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = future => Some(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_default_never_cancels() {
        let mut token = CancelToken::default();
        assert!(!token.is_cancelled());
        let waited = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_channel_cancels() {
        let (tx, mut token) = CancelToken::channel();
        assert!(!token.is_cancelled());

        tx.send_replace(true);
        assert!(token.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("token should resolve");
    }

    #[tokio::test]
    async fn test_run_until_cancelled_completes() {
        let (_tx, mut token) = CancelToken::channel();
        assert_eq!(token.run_until_cancelled(async { 7 }).await, Some(7));
        assert_eq!(CancelToken::default().run_until_cancelled(async { 8 }).await, Some(8));
    }

    #[tokio::test]
    async fn test_run_until_cancelled_after_interrupt() {
        let (tx, mut token) = CancelToken::channel();
        tx.send_replace(true);
        assert_eq!(token.run_until_cancelled(async { 7 }).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_cancelled_abandons_pending_work() {
        let (tx, mut token) = CancelToken::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send_replace(true);
        });

        let work = tokio::time::sleep(Duration::from_secs(3600));
        assert_eq!(token.run_until_cancelled(work).await, None);
    }

    #[tokio::test]
    async fn test_dropped_sender_does_not_cancel() {
        let (tx, mut token) = CancelToken::channel();
        drop(tx);
        let waited = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(waited.is_err());
    }
}
