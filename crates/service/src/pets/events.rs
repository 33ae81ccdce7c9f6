use std::sync::Arc;

use models::{AdoptionStatus, PetRecord};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::debug;

/// What a successful mutation changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added { id: String },
    Updated { id: String },
    StatusChanged { id: String, status: AdoptionStatus },
    Deleted { id: String },
}

/// Change notification: the change plus the collection as it stands right after it.
#[derive(Clone, Debug)]
pub struct StoreEvent {
    pub change: ChangeKind,
    pub snapshot: Arc<Vec<PetRecord>>,
}

/// Receiving end of store notifications. Dropping it unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<StoreEvent>,
}

impl Subscription {
    pub(crate) fn new(rx: broadcast::Receiver<StoreEvent>) -> Self { Self { rx } }

    /// Next event, or `None` once the store is gone.
    ///
    /// A subscriber that falls behind skips the events it missed; the next
    /// event it gets still carries the full current snapshot.
    pub async fn next(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "subscriber lagged"),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Self::next`].
    pub fn try_next(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => debug!(skipped, "subscriber lagged"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> StoreEvent {
        StoreEvent { change: ChangeKind::Deleted { id: id.into() }, snapshot: Arc::new(Vec::new()) }
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_latest() {
        let (tx, rx) = broadcast::channel(1);
        let mut sub = Subscription::new(rx);

        tx.send(event("a")).unwrap();
        tx.send(event("b")).unwrap();
        tx.send(event("c")).unwrap();
        // only the newest event survives a capacity of one
        assert_eq!(sub.try_next().map(|e| e.change), Some(ChangeKind::Deleted { id: "c".into() }));
        assert!(sub.try_next().is_none());

        tx.send(event("d")).unwrap();
        tx.send(event("e")).unwrap();
        assert_eq!(sub.next().await.map(|e| e.change), Some(ChangeKind::Deleted { id: "e".into() }));

        drop(tx);
        assert!(sub.next().await.is_none());
    }
}
