//! Notification flow across the wired subscribers

use e2e_tests::{closing_tick, eth_btc, series_key, Harness};
use pubsub::{PollOutcome, PubSub, SubscriberRunner};
use settings::Settings;
use std::sync::Arc;
use types::{Horizon, SeriesCoordinates, SeriesKind};

#[tokio::test]
async fn idle_subscriber_returns_without_touching_state() {
    let mut harness = Harness::new(Settings::default()).unwrap();
    let report = harness.pump().await;
    assert_eq!(report.total(), 0);
    assert!(harness.store.is_empty(&series_key("PriceStorage", "close_price")));
    assert_eq!(harness.repository.event_count(), 0);
}

#[tokio::test]
async fn closes_flow_from_raw_ticks_to_indicators() {
    let mut settings = Settings::default();
    settings.indicators.horizons = vec![Horizon(2), Horizon(5)];
    let mut harness = Harness::new(settings).unwrap();

    for (score, close) in [(1, 1.0), (2, 2.0), (3, 3.0)] {
        let report = harness.ingest(&closing_tick(score, close, 10.0)).await.unwrap();
        assert_eq!(report.failed, 0);
    }

    assert_eq!(harness.store.len(&series_key("PriceStorage", "close_price")), 3);
    assert_eq!(harness.store.len(&series_key("SmaStorage", "sma_2")), 2);
    assert!(harness.store.is_empty(&series_key("SmaStorage", "sma_5")));
    assert_eq!(harness.store.len(&series_key("VbiStorage", "vbi_2")), 2);
}

#[tokio::test]
async fn missed_notifications_are_recovered_by_rescan() {
    let mut settings = Settings::default();
    settings.indicators.horizons = vec![Horizon(2)];
    let harness = Harness::detached(settings).unwrap();

    for (score, close) in [(1, 1.0), (2, 2.0), (3, 3.0)] {
        harness
            .pipeline
            .resampler()
            .history()
            .save_tick(&closing_tick(score, close, 10.0), true)
            .await
            .unwrap();
        harness.pipeline.resampler().resample(&eth_btc(), score).await.unwrap();
    }
    assert!(harness.store.is_empty(&series_key("SmaStorage", "sma_2")));

    let report = harness.pipeline.rescan(0, 3 * 300).await.unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(harness.store.len(&series_key("SmaStorage", "sma_2")), 2);
}

#[tokio::test]
async fn late_subscriber_never_sees_earlier_messages() {
    let bus = PubSub::new(8);
    let coords = SeriesCoordinates::new(&eth_btc(), 900).with_index("close_price");
    bus.notify(SeriesKind::Sma, &coords).unwrap();

    let harness = Harness::detached(Settings::default()).unwrap();
    let detector = harness.pipeline.detector().clone();
    let mut runner = SubscriberRunner::new(&bus, detector as Arc<dyn pubsub::Subscriber>);
    assert_eq!(runner.poll().await.unwrap(), PollOutcome::Idle);
}
