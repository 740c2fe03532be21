//! Broadcast channel used for wallet and provider notifications.
//!
//! Every subscriber sees every event emitted after it subscribed, in emission
//! order. Nothing is replayed or retried: a subscriber that falls more than
//! the bus capacity behind loses the oldest events and is told how many.

use thiserror::Error;
use tokio::sync::broadcast;

const DEFAULT_EVENT_LIMIT: usize = 1000;

/// Event-related errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Receiver lagged behind by {0} events")]
    Lagged(u64),

    #[error("Event bus closed")]
    Closed,
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub struct EventBus<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    /// Create a bus buffering up to `capacity` events per slow receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
        }
    }

    pub fn subscribe(&self) -> EventReceiver<T> {
        EventReceiver::new(self.sender.subscribe())
    }

    /// Emit events to all current subscribers. Having none is not an error.
    pub fn emit(&self, events: &[T]) {
        for event in events {
            let _ = self.sender.send(event.clone());
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LIMIT)
    }
}

#[derive(Debug)]
pub struct EventReceiver<T: Clone> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> EventReceiver<T> {
    pub fn new(receiver: broadcast::Receiver<T>) -> Self {
        Self {
            receiver,
        }
    }

    pub async fn recv(&mut self) -> Result<T> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(Error::Lagged(n)),
            Err(broadcast::error::RecvError::Closed) => Err(Error::Closed),
        }
    }

    /// Non-blocking receive. `Ok(None)` when nothing is queued.
    pub fn try_recv(&mut self) -> Result<Option<T>> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(Error::Lagged(n)),
            Err(broadcast::error::TryRecvError::Closed) => Err(Error::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_receive_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(&["first", "second"]);

        assert_eq!(rx.recv().await.unwrap(), "first");
        assert_eq!(rx.recv().await.unwrap(), "second");
        assert_eq!(rx.try_recv().unwrap(), None);
    }

    #[test]
    fn test_emit_without_receivers() {
        let bus = EventBus::new(16);
        bus.emit(&["dropped"]);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_lagged_receiver() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        bus.emit(&[1, 2, 3, 4]);
        assert_eq!(rx.recv().await, Err(Error::Lagged(2)));
        assert_eq!(rx.recv().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_closed() {
        let bus = EventBus::<u8>::new(2);
        let mut rx = bus.subscribe();
        drop(bus);
        assert_eq!(rx.recv().await, Err(Error::Closed));
    }
}
