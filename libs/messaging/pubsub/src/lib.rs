//! # Notification Bus
//!
//! Named-channel publish/subscribe between the producers of the pipeline
//! (resampler, indicator stores) and its consumers (indicator subscribers,
//! event detector). One channel exists per producing storage class, named
//! after it, e.g. `PriceStorage`.
//!
//! ## Delivery
//!
//! At-most-once and fire-and-forget:
//! - a subscription only sees messages published while it exists
//! - each subscription buffers a bounded number of messages; when the buffer
//!   is full new messages are dropped for that subscription
//! - nothing is persisted and nothing is replayed
//!
//! Consumers recover from missed notifications through [`rescan`], which
//! drives a [`Subscriber`] directly over a range of coordinates.
//!
//! ## Example
//!
//! ```rust
//! use pubsub::PubSub;
//! use types::{PartitionKey, SeriesCoordinates, SeriesKind};
//!
//! let bus = PubSub::new(16);
//! let mut subscription = bus.subscribe(&[SeriesKind::Price]);
//!
//! let coords = SeriesCoordinates::new(&PartitionKey::new("ETH_BTC", "BITTREX"), 900)
//!     .with_index("close_price");
//! assert_eq!(bus.notify(SeriesKind::Price, &coords).unwrap(), 1);
//!
//! let message = subscription.try_next().unwrap();
//! assert_eq!(message.channel, "PriceStorage");
//! assert!(subscription.try_next().is_none());
//! ```

pub mod bus;
pub mod error;
pub mod registry;
pub mod subscriber;

pub use bus::{BusMessage, PubSub, Subscription};
pub use error::{BusError, SubscriberFault};
pub use registry::{ChannelRegistry, ChannelStats, SubscriptionId};
pub use subscriber::{rescan, PollOutcome, Subscriber, SubscriberRunner};
