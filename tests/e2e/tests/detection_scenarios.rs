//! Indicators and event detection driven through the bus

use e2e_tests::{closing_tick, eth_btc, Harness};
use indicators::Bands;
use settings::Settings;
use signals::{Rule, RuleState};
use std::sync::Arc;
use storage::{IndicatorEntry, IndicatorStorage, OrderedStore, SignalRepository};
use types::{Horizon, SeriesKind, Trend, DAY, FIVE_MINUTES};

fn rsi_settings() -> Settings {
    let mut settings = Settings::default();
    settings.indicators.horizons = vec![Horizon(5)];
    settings.indicators.rsi_min_period = 5;
    settings
}

#[tokio::test]
async fn bollinger_bands_only_for_covered_horizons() {
    let mut harness = Harness::new(Settings::default()).unwrap();
    for (score, close) in (1..).zip([10.0, 11.0, 9.0, 12.0, 10.0]) {
        harness.ingest(&closing_tick(score, close, 1.0)).await.unwrap();
    }

    let store: Arc<dyn OrderedStore> = harness.store.clone();
    let storage = IndicatorStorage::new(store, SeriesKind::Bbands, harness.pipeline.bus().clone()).unwrap();
    let bands: Bands = storage.load(&eth_btc(), Horizon(5), 1500).await.unwrap().unwrap();
    assert!((bands.middle - 10.4).abs() < 1e-9);
    assert!((bands.upper - 12.4396).abs() < 1e-3);
    assert!((bands.lower - 8.3604).abs() < 1e-3);

    for horizon in [25, 100] {
        let missing: Option<Bands> = storage.load(&eth_btc(), Horizon(horizon), 1500).await.unwrap();
        assert!(missing.is_none(), "bbands_{} should be empty", horizon);
    }
}

#[tokio::test]
async fn overbought_rsi_fires_once_across_rescans() {
    let mut harness = Harness::new(rsi_settings()).unwrap();
    for score in 1..=6 {
        harness.ingest(&closing_tick(score, score as f64, 1.0)).await.unwrap();
    }

    let rsi_events = |events: &[types::Event]| {
        events
            .iter()
            .filter(|e| e.event_name == Rule::RsiOverboughtOversold.name())
            .count()
    };
    let events = harness.repository.events(&eth_btc()).await.unwrap();
    assert_eq!(rsi_events(&events), 1);
    assert_eq!(events.iter().find(|e| e.event_name == "rsi_overbought_oversold").unwrap().timestamp, 1800);

    let signal = harness
        .repository
        .signals(&eth_btc())
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.signal == "RSI")
        .unwrap();
    assert_eq!(signal.trend, Trend::Bearish);
    assert_eq!(signal.strength_value, 3);

    harness.pipeline.rescan(0, 1800).await.unwrap();
    let total = harness.repository.event_count();
    harness.pipeline.rescan(0, 1800).await.unwrap();
    assert_eq!(harness.repository.event_count(), total);
    let events = harness.repository.events(&eth_btc()).await.unwrap();
    assert_eq!(rsi_events(&events), 1);

    let pass = harness.pipeline.detector().detect(&eth_btc(), 1800).await.unwrap();
    assert_eq!(pass.state(Rule::RsiOverboughtOversold), Some(RuleState::AlreadyFired));
}

#[tokio::test]
async fn cumulative_rsi_needs_the_long_snapshot() {
    let harness = Harness::detached(Settings::default()).unwrap();
    let bus = harness.pipeline.bus().clone();
    let store: Arc<dyn OrderedStore> = harness.store.clone();
    let ts = DAY * 20 + 12 * FIVE_MINUTES;

    let rsi = IndicatorStorage::new(store.clone(), SeriesKind::Rsi, bus.clone()).unwrap();
    rsi.save(&IndicatorEntry::new(eth_btc(), ts, Horizon(5), 78.0).unwrap(), false)
        .await
        .unwrap();

    let detector = harness.pipeline.detector();
    let pass = detector.detect(&eth_btc(), ts).await.unwrap();
    assert_eq!(pass.state(Rule::RsiCumulativeBearish), Some(RuleState::Pending));
    assert_eq!(pass.state(Rule::RsiOverboughtOversold), Some(RuleState::Fired));

    let sma = IndicatorStorage::new(store, SeriesKind::Sma, bus).unwrap();
    sma.save(&IndicatorEntry::new(eth_btc(), DAY * 20, Horizon(25), 1.0).unwrap(), false)
        .await
        .unwrap();
    sma.save(&IndicatorEntry::new(eth_btc(), DAY * 20, Horizon(100), 2.0).unwrap(), false)
        .await
        .unwrap();

    let pass = detector.detect(&eth_btc(), ts).await.unwrap();
    assert_eq!(pass.state(Rule::RsiCumulativeBearish), Some(RuleState::Fired));
    assert_eq!(pass.state(Rule::RsiCumulativeBullish), Some(RuleState::Suppressed));
    assert_eq!(pass.state(Rule::RsiOverboughtOversold), Some(RuleState::AlreadyFired));

    let events = harness.repository.events(&eth_btc()).await.unwrap();
    let cumulative = events.iter().find(|e| e.event_name == "RSI_Cumulative_bearish").unwrap();
    assert_eq!(cumulative.event_value, 78.0);
}
