//! Single-assignment result cell for a synthesis invocation

use tokio::sync::oneshot;

/// Resolves its receiver at most once; later calls are no-ops
#[derive(Debug)]
pub struct Settlement<T> {
    tx: Option<oneshot::Sender<T>>,
}

impl<T> Settlement<T> {
    /// Create a settlement cell and the receiver the caller awaits
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Deliver `value` if nothing was delivered yet.
    ///
    /// Returns `true` only for the call that actually settled. A dropped
    /// receiver still counts as settled.
    pub fn settle(&mut self, value: T) -> bool {
        match self.tx.take() {
            Some(tx) => {
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.tx.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settles_exactly_once() {
        let (mut cell, rx) = Settlement::new();
        assert!(!cell.is_settled());
        assert!(cell.settle("completed"));
        assert!(!cell.settle("closed"));
        assert!(!cell.settle("timeout"));
        assert!(cell.is_settled());
        assert_eq!(rx.await.unwrap(), "completed");
    }

    #[test]
    fn test_settle_with_dropped_receiver() {
        let (mut cell, rx) = Settlement::new();
        drop(rx);
        assert!(cell.settle(1u8));
        assert!(!cell.settle(2u8));
    }
}
