//! Channel registry
//!
//! Maps channel names to the live subscriptions listening on them, plus the
//! reverse mapping used to unsubscribe a session from everything at once.

use crate::bus::BusMessage;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Per-channel publish counters
#[derive(Debug, Default)]
pub struct ChannelStats {
    pub published: AtomicU64,
    pub delivered: AtomicU64,
    /// Deliveries skipped because a subscription buffer was full
    pub dropped: AtomicU64,
}

impl ChannelStats {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.published.load(Ordering::Relaxed),
            self.delivered.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
        )
    }
}

#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Vec<(SubscriptionId, mpsc::Sender<BusMessage>)>>,
    subscription_channels: DashMap<SubscriptionId, HashSet<String>>,
    stats: DashMap<String, ChannelStats>,
    next_id: AtomicU64,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_subscription_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn subscribe(&self, id: SubscriptionId, channel: &str, sender: mpsc::Sender<BusMessage>) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push((id, sender));

        self.subscription_channels
            .entry(id)
            .or_default()
            .insert(channel.to_string());

        debug!(subscription = id.0, channel, "subscribed");
    }

    pub fn unsubscribe_all(&self, id: SubscriptionId) {
        if let Some((_, channels)) = self.subscription_channels.remove(&id) {
            for channel in channels {
                if let Some(mut senders) = self.channels.get_mut(&channel) {
                    senders.retain(|(sub, _)| *sub != id);
                }
            }
            debug!(subscription = id.0, "unsubscribed from all channels");
        }
    }

    /// Offer `message` to every subscription on its channel without waiting.
    ///
    /// Returns the number of subscriptions that accepted it.
    pub fn deliver(&self, message: &BusMessage) -> usize {
        let stats = self.stats.entry(message.channel.clone()).or_default();
        stats.published.fetch_add(1, Ordering::Relaxed);

        let Some(senders) = self.channels.get(&message.channel) else {
            return 0;
        };

        let mut delivered = 0;
        for (id, sender) in senders.iter() {
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        subscription = id.0,
                        channel = %message.channel,
                        "subscription buffer full, notification dropped"
                    );
                }
                // receiver gone; unsubscribe_all on drop cleans the entry up
                Err(TrySendError::Closed(_)) => {}
            }
        }
        stats.delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map(|s| s.len()).unwrap_or(0)
    }

    pub fn stats(&self, channel: &str) -> Option<(u64, u64, u64)> {
        self.stats.get(channel).map(|s| s.snapshot())
    }
}
