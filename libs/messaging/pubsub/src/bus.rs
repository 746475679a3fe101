//! Publisher handle and subscription sessions

use crate::error::BusError;
use crate::registry::{ChannelRegistry, SubscriptionId};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::trace;
use types::{SeriesCoordinates, SeriesKind};

/// One notification as it travels the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
}

/// Cloneable handle to the bus, passed explicitly to every producer and consumer.
#[derive(Clone)]
pub struct PubSub {
    registry: Arc<ChannelRegistry>,
    capacity: usize,
}

impl PubSub {
    /// `capacity` bounds the messages buffered per subscription.
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(ChannelRegistry::new()),
            capacity: capacity.max(1),
        }
    }

    /// Publish a raw payload. Returns how many subscriptions received it.
    pub fn publish(&self, channel: impl Into<String>, payload: impl Into<String>) -> usize {
        let message = BusMessage {
            channel: channel.into(),
            payload: payload.into(),
        };
        let delivered = self.registry.deliver(&message);
        trace!(channel = %message.channel, delivered, "published");
        delivered
    }

    /// Publish `coords` on the channel of `kind`.
    pub fn notify(&self, kind: SeriesKind, coords: &SeriesCoordinates) -> Result<usize, BusError> {
        let payload = coords.to_payload()?;
        Ok(self.publish(kind.storage_class(), payload))
    }

    /// Open a session listening on every channel in `kinds`.
    pub fn subscribe(&self, kinds: &[SeriesKind]) -> Subscription {
        let channels: Vec<String> = kinds.iter().map(|k| k.storage_class().to_string()).collect();
        self.open(&channels)
    }

    /// Subscribe by channel name. Every name must be a storage class.
    pub fn subscribe_channels(&self, channels: &[String]) -> Result<Subscription, BusError> {
        if let Some(unknown) = channels.iter().find(|c| c.parse::<SeriesKind>().is_err()) {
            return Err(BusError::UnknownChannel(unknown.clone()));
        }
        Ok(self.open(channels))
    }

    fn open(&self, channels: &[String]) -> Subscription {
        let id = self.registry.next_subscription_id();
        let (sender, receiver) = mpsc::channel(self.capacity);
        for channel in channels {
            self.registry.subscribe(id, channel, sender.clone());
        }
        Subscription {
            id,
            receiver,
            registry: Arc::clone(&self.registry),
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }
}

/// A subscriber session. Dropping it unsubscribes from every channel.
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::Receiver<BusMessage>,
    registry: Arc<ChannelRegistry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Take at most one pending message without waiting.
    pub fn try_next(&mut self) -> Option<BusMessage> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe_all(self.id);
    }
}
