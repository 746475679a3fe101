//! Subscriber trait and the cooperative dispatch loop

use crate::bus::{BusMessage, PubSub, Subscription};
use crate::error::SubscriberFault;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use types::{BatchReport, SeriesCoordinates, SeriesKind};

/// A consumer of bus notifications.
///
/// The channel set is static: it is read once when the runner subscribes.
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn name(&self) -> &str;

    /// Storage classes whose channels this subscriber listens to
    fn channels(&self) -> &[SeriesKind];

    async fn handle(&self, channel: SeriesKind, coords: &SeriesCoordinates) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was pending
    Idle,
    Dispatched,
    /// Message could not be decoded and was dropped
    Discarded,
}

/// Owns one subscription and feeds its messages to a [`Subscriber`].
pub struct SubscriberRunner {
    subscriber: Arc<dyn Subscriber>,
    subscription: Subscription,
}

impl SubscriberRunner {
    pub fn new(bus: &PubSub, subscriber: Arc<dyn Subscriber>) -> Self {
        let subscription = bus.subscribe(subscriber.channels());
        debug!(
            subscriber = subscriber.name(),
            channels = ?subscriber.channels(),
            "subscriber attached"
        );
        Self {
            subscriber,
            subscription,
        }
    }

    pub fn name(&self) -> &str {
        self.subscriber.name()
    }

    /// Dispatch at most one pending message. Never waits for one to arrive.
    pub async fn poll(&mut self) -> Result<PollOutcome, SubscriberFault> {
        let Some(message) = self.subscription.try_next() else {
            return Ok(PollOutcome::Idle);
        };

        let Some((channel, coords)) = self.decode(&message) else {
            return Ok(PollOutcome::Discarded);
        };

        self.subscriber
            .handle(channel, &coords)
            .await
            .map_err(|source| SubscriberFault {
                subscriber: self.subscriber.name().to_string(),
                channel: message.channel.clone(),
                payload: message.payload.clone(),
                source,
            })?;

        Ok(PollOutcome::Dispatched)
    }

    fn decode(&self, message: &BusMessage) -> Option<(SeriesKind, SeriesCoordinates)> {
        let channel = match message.channel.parse::<SeriesKind>() {
            Ok(kind) if self.subscriber.channels().contains(&kind) => kind,
            _ => {
                warn!(
                    subscriber = self.subscriber.name(),
                    channel = %message.channel,
                    "discarding message from unexpected channel"
                );
                return None;
            }
        };

        match SeriesCoordinates::from_payload(&message.payload) {
            Ok(coords) => Some((channel, coords)),
            Err(e) => {
                warn!(
                    subscriber = self.subscriber.name(),
                    channel = %message.channel,
                    payload = %message.payload,
                    error = %e,
                    "discarding malformed message"
                );
                None
            }
        }
    }

    /// Poll until `shutdown` flips to true, sleeping `idle` whenever nothing is pending.
    ///
    /// Faults are logged with the subscriber's identity and counted; they do
    /// not stop the loop.
    pub async fn run(mut self, idle: Duration, mut shutdown: watch::Receiver<bool>) -> BatchReport {
        let mut report = BatchReport::new();
        info!(subscriber = self.name(), "dispatch loop started");

        while !*shutdown.borrow() {
            match self.poll().await {
                Ok(PollOutcome::Dispatched) => report.record_processed(),
                Ok(PollOutcome::Discarded) => report.record_skipped(),
                Ok(PollOutcome::Idle) => {
                    tokio::select! {
                        _ = tokio::time::sleep(idle) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(fault) => {
                    error!(
                        subscriber = %fault.subscriber,
                        channel = %fault.channel,
                        payload = %fault.payload,
                        error = ?fault.source,
                        "subscriber fault"
                    );
                    report.record_failed();
                }
            }
        }

        info!(subscriber = self.name(), %report, "dispatch loop stopped");
        report
    }
}

/// Drive `subscriber` directly over `coords`, bypassing the bus.
///
/// This is the recovery path for notifications that were never delivered.
pub async fn rescan<I>(subscriber: &dyn Subscriber, channel: SeriesKind, coords: I) -> BatchReport
where
    I: IntoIterator<Item = SeriesCoordinates>,
{
    let mut report = BatchReport::new();
    for coords in coords {
        match subscriber.handle(channel, &coords).await {
            Ok(()) => report.record_processed(),
            Err(e) => {
                error!(
                    subscriber = subscriber.name(),
                    channel = %channel,
                    ticker = %coords.ticker,
                    exchange = %coords.exchange,
                    timestamp = coords.timestamp,
                    error = ?e,
                    "rescan handler failed"
                );
                report.record_failed();
            }
        }
    }
    report
}
