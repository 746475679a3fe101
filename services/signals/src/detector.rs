//! Rule evaluation and idempotent persistence
//!
//! Per rule and bucket: `Pending` until every input exists, then `Evaluated`,
//! then `Fired` or `Suppressed`. A rule that already fired for the bucket ends
//! in `AlreadyFired`; a persistence fault ends in `Failed` and the remaining
//! rules still run.
//!
//! The signal row is written before the event row, so the event doubles as
//! the completion marker checked on re-evaluation.

use crate::elementary::{ElementaryEvents, LongEvents};
use crate::error::DetectorError;
use crate::rules::{Evaluation, Firing, Rule};
use crate::snapshot::SnapshotReader;
use anyhow::Context;
use async_trait::async_trait;
use pubsub::{PubSub, Subscriber};
use settings::EventSettings;
use std::sync::Arc;
use storage::{OrderedStore, PersistenceError, SignalRepository, StoreResult};
use tracing::{debug, error, info};
use types::{ensure_aligned, BatchReport, Event, PartitionKey, RuleKey, SeriesCoordinates, SeriesKind, Signal, FIVE_MINUTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleState {
    Pending,
    Evaluated { fires: bool },
    Fired,
    Suppressed,
    AlreadyFired,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleOutcome {
    pub rule: Rule,
    pub state: RuleState,
}

/// Result of evaluating every rule at one bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionPass {
    pub timestamp: i64,
    pub outcomes: Vec<RuleOutcome>,
}

impl DetectionPass {
    pub fn state(&self, rule: Rule) -> Option<RuleState> {
        self.outcomes.iter().find(|o| o.rule == rule).map(|o| o.state)
    }

    pub fn count(&self, state: RuleState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    /// Fired rules are processed, persistence faults failed, the rest skipped
    pub fn report(&self) -> BatchReport {
        let mut report = BatchReport::new();
        for outcome in &self.outcomes {
            match outcome.state {
                RuleState::Fired => report.record_processed(),
                RuleState::Failed => report.record_failed(),
                _ => report.record_skipped(),
            }
        }
        report
    }
}

pub struct Detector {
    reader: SnapshotReader,
    repository: Arc<dyn SignalRepository>,
    rules: Vec<Rule>,
}

impl Detector {
    pub fn new(
        store: Arc<dyn OrderedStore>,
        bus: PubSub,
        repository: Arc<dyn SignalRepository>,
        settings: EventSettings,
    ) -> StoreResult<Self> {
        Ok(Self {
            reader: SnapshotReader::new(store, bus, settings)?,
            repository,
            rules: Rule::ALL.to_vec(),
        })
    }

    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    fn settings(&self) -> &EventSettings {
        self.reader.settings()
    }

    async fn assess(&self, partition: &PartitionKey, timestamp: i64) -> Result<Vec<(Rule, Evaluation)>, DetectorError> {
        ensure_aligned(timestamp, FIVE_MINUTES)?;

        let snapshot = self.reader.read(partition, timestamp).await?;
        let events = ElementaryEvents::detect(&snapshot, self.settings());
        let long = if self.rules.iter().any(Rule::needs_long) {
            self.reader
                .read_long(partition, timestamp)
                .await?
                .map(|long| LongEvents::detect(&long))
        } else {
            None
        };

        Ok(self
            .rules
            .iter()
            .map(|rule| (*rule, rule.evaluate(&events, long.as_ref())))
            .collect())
    }

    /// Evaluate without persisting anything
    pub async fn preview(&self, partition: &PartitionKey, timestamp: i64) -> Result<DetectionPass, DetectorError> {
        let outcomes = self
            .assess(partition, timestamp)
            .await?
            .into_iter()
            .map(|(rule, evaluation)| RuleOutcome {
                rule,
                state: match evaluation {
                    Evaluation::Pending => RuleState::Pending,
                    Evaluation::Suppressed => RuleState::Evaluated { fires: false },
                    Evaluation::Fire(_) => RuleState::Evaluated { fires: true },
                },
            })
            .collect();
        Ok(DetectionPass { timestamp, outcomes })
    }

    /// Evaluate every rule at `timestamp` and persist what fires.
    ///
    /// Only a snapshot read failure is an error; persistence faults are
    /// logged and reported per rule.
    pub async fn detect(&self, partition: &PartitionKey, timestamp: i64) -> Result<DetectionPass, DetectorError> {
        let mut outcomes = Vec::with_capacity(self.rules.len());
        for (rule, evaluation) in self.assess(partition, timestamp).await? {
            let state = match evaluation {
                Evaluation::Pending => RuleState::Pending,
                Evaluation::Suppressed => RuleState::Suppressed,
                Evaluation::Fire(firing) => self.fire(partition, timestamp, rule, firing).await,
            };
            debug!(
                ticker = %partition.ticker,
                exchange = %partition.exchange,
                timestamp,
                rule = %rule,
                ?state,
                "rule evaluated"
            );
            outcomes.push(RuleOutcome { rule, state });
        }
        Ok(DetectionPass { timestamp, outcomes })
    }

    async fn fire(&self, partition: &PartitionKey, timestamp: i64, rule: Rule, firing: Firing) -> RuleState {
        let key = RuleKey {
            partition: partition.clone(),
            timestamp,
            name: rule.name().to_string(),
        };

        match self.repository.has_event(&key).await {
            Ok(true) => return RuleState::AlreadyFired,
            Ok(false) => {}
            Err(e) => return persistence_fault(&key, &e),
        }

        let horizon = self.settings().evaluation_horizon;
        let signal = Signal {
            partition: partition.clone(),
            timestamp,
            horizon,
            signal: firing.signal.to_string(),
            source: rule.name().to_string(),
            trend: firing.trend,
            strength_value: firing.strength_value,
            strength_max: firing.strength_max,
            rsi_value: firing.rsi_value,
            squeeze: None,
        };
        match self.repository.insert_signal(signal).await {
            Ok(()) | Err(PersistenceError::Duplicate(_)) => {}
            Err(e) => return persistence_fault(&key, &e),
        }

        let event = Event {
            partition: partition.clone(),
            timestamp,
            horizon,
            event_name: rule.name().to_string(),
            event_value: firing.event_value,
        };
        match self.repository.insert_event(event).await {
            Ok(()) => {
                info!(
                    ticker = %partition.ticker,
                    exchange = %partition.exchange,
                    timestamp,
                    rule = %rule,
                    signal = firing.signal,
                    trend = firing.trend.as_i8(),
                    strength = firing.strength_value,
                    "rule fired"
                );
                RuleState::Fired
            }
            Err(PersistenceError::Duplicate(_)) => RuleState::AlreadyFired,
            Err(e) => persistence_fault(&key, &e),
        }
    }
}

fn persistence_fault(key: &RuleKey, error: &PersistenceError) -> RuleState {
    error!(
        ticker = %key.partition.ticker,
        exchange = %key.partition.exchange,
        timestamp = key.timestamp,
        rule = %key.name,
        error = %error,
        "failed to persist rule firing"
    );
    RuleState::Failed
}

#[async_trait]
impl Subscriber for Detector {
    fn name(&self) -> &str {
        "event_detector"
    }

    fn channels(&self) -> &[SeriesKind] {
        &SeriesKind::INDICATORS
    }

    async fn handle(&self, _channel: SeriesKind, coords: &SeriesCoordinates) -> anyhow::Result<()> {
        if coords
            .horizon
            .is_some_and(|horizon| horizon != self.settings().evaluation_horizon)
        {
            return Ok(());
        }

        let partition = coords.partition();
        self.detect(&partition, coords.timestamp)
            .await
            .with_context(|| format!("event detection for {} at {}", partition, coords.timestamp))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicators::Vbi;
    use storage::{IndicatorEntry, IndicatorStorage, MemorySignalRepository, MemoryStore, SeriesValue};
    use types::{Horizon, Trend, DAY};

    const T: i64 = DAY * 10 + 3_600;

    fn eth_btc() -> PartitionKey {
        PartitionKey::new("ETH_BTC", "BITTREX")
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        bus: PubSub,
        repository: Arc<MemorySignalRepository>,
        detector: Detector,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let bus = PubSub::new(16);
            let repository = Arc::new(MemorySignalRepository::new());
            let detector =
                Detector::new(store.clone(), bus.clone(), repository.clone(), EventSettings::default()).unwrap();
            Self {
                store,
                bus,
                repository,
                detector,
            }
        }

        async fn put<V: SeriesValue>(&self, kind: SeriesKind, horizon: u32, timestamp: i64, value: V) {
            let storage = IndicatorStorage::new(self.store.clone(), kind, self.bus.clone()).unwrap();
            let entry = IndicatorEntry::new(eth_btc(), timestamp, Horizon(horizon), value).unwrap();
            storage.save(&entry, false).await.unwrap();
        }

        async fn seed_volume_breakout(&self) {
            let before = Vbi {
                price: 1.0,
                price_mean: 1.0,
                volume: 90.0,
                volume_mean: 100.0,
            };
            let after = Vbi {
                price: 1.1,
                price_mean: 1.0,
                volume: 101.0,
                volume_mean: 100.0,
            };
            self.put(SeriesKind::Vbi, 5, T - FIVE_MINUTES, before).await;
            self.put(SeriesKind::Vbi, 5, T, after).await;
        }
    }

    #[tokio::test]
    async fn test_refire_is_not_duplicated() {
        let fx = Fixture::new();
        fx.put(SeriesKind::Rsi, 5, T, 85.0).await;

        let first = fx.detector.detect(&eth_btc(), T).await.unwrap();
        assert_eq!(first.state(Rule::RsiOverboughtOversold), Some(RuleState::Fired));
        let second = fx.detector.detect(&eth_btc(), T).await.unwrap();
        assert_eq!(second.state(Rule::RsiOverboughtOversold), Some(RuleState::AlreadyFired));

        assert_eq!(fx.repository.event_count(), 1);
        let signals = fx.repository.signals(&eth_btc()).await.unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].trend, Trend::Bearish);
        assert_eq!(signals[0].strength_value, 3);
        assert_eq!(signals[0].horizon, Horizon(5));
    }

    #[tokio::test]
    async fn test_missing_inputs_stay_pending() {
        let fx = Fixture::new();
        let pass = fx.detector.detect(&eth_btc(), T).await.unwrap();
        assert_eq!(pass.count(RuleState::Pending), Rule::ALL.len());
        assert_eq!(pass.report().skipped, Rule::ALL.len() as u64);
        assert_eq!(fx.repository.event_count(), 0);
    }

    #[tokio::test]
    async fn test_persistence_fault_does_not_stop_other_rules() {
        let fx = Fixture::new();
        fx.put(SeriesKind::Rsi, 5, T, 85.0).await;
        fx.seed_volume_breakout().await;
        fx.repository.fail_rule("rsi_overbought_oversold");

        let pass = fx.detector.detect(&eth_btc(), T).await.unwrap();
        assert_eq!(pass.state(Rule::RsiOverboughtOversold), Some(RuleState::Failed));
        assert_eq!(pass.state(Rule::BenVolumeBasedBuy), Some(RuleState::Fired));
        let report = pass.report();
        assert_eq!((report.processed, report.failed), (1, 1));
    }

    #[tokio::test]
    async fn test_cross_horizon_rule_waits_for_long_snapshot() {
        let fx = Fixture::new();
        fx.put(SeriesKind::Rsi, 5, T, 22.0).await;

        let pass = fx.detector.detect(&eth_btc(), T).await.unwrap();
        assert_eq!(pass.state(Rule::RsiCumulativeBullish), Some(RuleState::Pending));

        fx.put(SeriesKind::Sma, 25, DAY * 10, 2.0).await;
        fx.put(SeriesKind::Sma, 100, DAY * 10, 1.0).await;
        let pass = fx.detector.detect(&eth_btc(), T).await.unwrap();
        assert_eq!(pass.state(Rule::RsiCumulativeBullish), Some(RuleState::Fired));
        assert_eq!(pass.state(Rule::RsiCumulativeBearish), Some(RuleState::Suppressed));

        let events = fx.repository.events(&eth_btc()).await.unwrap();
        let cumulative = events.iter().find(|e| e.event_name == "RSI_Cumulative_bullish").unwrap();
        assert_eq!(cumulative.event_value, 22.0);
    }

    #[tokio::test]
    async fn test_preview_persists_nothing() {
        let fx = Fixture::new();
        fx.seed_volume_breakout().await;

        let pass = fx.detector.preview(&eth_btc(), T).await.unwrap();
        assert_eq!(pass.state(Rule::BenVolumeBasedBuy), Some(RuleState::Evaluated { fires: true }));
        assert_eq!(fx.repository.signal_count(), 0);
    }

    #[tokio::test]
    async fn test_other_horizons_ignored() {
        let fx = Fixture::new();
        fx.put(SeriesKind::Rsi, 5, T, 85.0).await;

        let coords = SeriesCoordinates::new(&eth_btc(), T).with_horizon(Horizon(25));
        fx.detector.handle(SeriesKind::Rsi, &coords).await.unwrap();
        assert_eq!(fx.repository.event_count(), 0);

        let coords = SeriesCoordinates::new(&eth_btc(), T).with_horizon(Horizon(5));
        fx.detector.handle(SeriesKind::Rsi, &coords).await.unwrap();
        assert_eq!(fx.repository.event_count(), 1);
    }

    #[tokio::test]
    async fn test_unaligned_bucket_rejected() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.detector.detect(&eth_btc(), T + 1).await,
            Err(DetectorError::Alignment(_))
        ));
    }
}
