//! Raw ticks through the staged resample

use e2e_tests::{eth_btc, ohlcv_tick, raw_key, series_key, Harness};
use resampler::ResampleOutcome;
use settings::Settings;
use storage::{Order, ScoreRange, TimeseriesStorage};
use types::{score_from_timestamp, PriceTick, SeriesKind, FIVE_MINUTES};

#[tokio::test]
async fn full_tick_resamples_into_one_bucket_and_clears_raw() {
    let harness = Harness::detached(Settings::default()).unwrap();
    let resampler = harness.pipeline.resampler();

    resampler
        .history()
        .save_tick(&ohlcv_tick(1000, 10.0, 12.0, 9.0, 11.0, 100.0), false)
        .await
        .unwrap();
    let score = score_from_timestamp(1000, FIVE_MINUTES);
    assert_eq!(score, 3);

    let ResampleOutcome::Complete(ohlcv) = resampler.resample(&eth_btc(), score).await.unwrap() else {
        panic!("bucket should be complete");
    };
    assert_eq!(ohlcv.timestamp, 900);
    assert_eq!((ohlcv.open, ohlcv.high, ohlcv.low, ohlcv.close, ohlcv.volume), (10.0, 12.0, 9.0, 11.0, 100.0));

    let prices = TimeseriesStorage::new(harness.store.clone(), SeriesKind::Price);
    for (index, expected) in [("open_price", 10.0), ("high_price", 12.0), ("low_price", 9.0), ("close_price", 11.0)] {
        let entry = prices.get(&eth_btc(), index, 900).await.unwrap().unwrap();
        assert_eq!(entry.as_f64(), Some(expected), "{}", index);
    }
    assert_eq!(harness.store.len(&series_key("VolumeStorage", "close_volume")), 1);

    for index in ["open_price", "high_price", "low_price", "close_price", "close_volume"] {
        assert!(harness.store.is_empty(&raw_key(index)), "{} raw not cleared", index);
    }
}

#[tokio::test]
async fn bucket_without_close_stays_pending() {
    let harness = Harness::detached(Settings::default()).unwrap();
    let resampler = harness.pipeline.resampler();

    let mut tick = PriceTick::new(eth_btc(), 1000);
    tick.open = Some(10.0);
    tick.high = Some(12.0);
    tick.low = Some(9.0);
    resampler.history().save_tick(&tick, false).await.unwrap();

    assert_eq!(resampler.resample(&eth_btc(), 3).await.unwrap(), ResampleOutcome::Pending);
    assert!(harness.store.is_empty(&series_key("PriceStorage", "close_price")));
    assert!(harness.store.is_empty(&series_key("PriceStorage", "open_price")));
    for index in ["open_price", "high_price", "low_price"] {
        assert_eq!(harness.store.len(&raw_key(index)), 1);
    }

    // the close arrives later in the same bucket
    let mut close = PriceTick::new(eth_btc(), 1100);
    close.close = Some(11.0);
    resampler.history().save_tick(&close, false).await.unwrap();
    assert!(matches!(
        resampler.resample(&eth_btc(), 3).await.unwrap(),
        ResampleOutcome::Complete(_)
    ));
}

#[tokio::test]
async fn tick_after_last_minute_resample_merges_into_bucket() {
    let mut harness = Harness::new(Settings::default()).unwrap();

    for (timestamp, close, volume) in [(1150, 11.0, 100.0), (1190, 12.0, 50.0)] {
        let mut tick = PriceTick::new(eth_btc(), timestamp);
        tick.close = Some(close);
        tick.volume = Some(volume);
        harness.ingest(&tick).await.unwrap();
    }

    let resampled = harness.pipeline.resampler().resampled(&eth_btc(), 900).await.unwrap().unwrap();
    assert_eq!(
        (resampled.open, resampled.high, resampled.low, resampled.close, resampled.volume),
        (11.0, 12.0, 11.0, 12.0, 150.0)
    );
    assert_eq!(harness.store.len(&series_key("PriceStorage", "close_price")), 1);
    assert!(harness.store.is_empty(&raw_key("close_volume")));
}

#[tokio::test]
async fn rewriting_a_timestamp_keeps_one_entry() {
    let harness = Harness::detached(Settings::default()).unwrap();
    let prices = TimeseriesStorage::new(harness.store.clone(), SeriesKind::Price);

    prices.write(&eth_btc(), "close_price", 900, "11").await.unwrap();
    prices.write(&eth_btc(), "close_price", 900, "12").await.unwrap();

    let entries = prices
        .query(&eth_btc(), "close_price", ScoreRange::all(), Order::Ascending, None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].as_f64(), Some(12.0));
}

#[tokio::test]
async fn unaligned_resampled_write_is_rejected_before_io() {
    let harness = Harness::detached(Settings::default()).unwrap();
    let prices = TimeseriesStorage::new(harness.store.clone(), SeriesKind::Price);

    harness.store.set_available(false);
    let err = prices.write(&eth_btc(), "close_price", 901, "11").await.unwrap_err();
    assert!(!err.is_unavailable());
}

#[tokio::test]
async fn sweep_resamples_every_closed_bucket_once() {
    let harness = Harness::detached(Settings::default()).unwrap();
    let resampler = harness.pipeline.resampler();

    for (ts, close) in [(310, 1.0), (620, 2.0), (1000, 3.0)] {
        let mut tick = PriceTick::new(eth_btc(), ts);
        tick.close = Some(close);
        resampler.history().save_tick(&tick, false).await.unwrap();
    }
    let stop = std::sync::atomic::AtomicBool::new(false);

    let first = resampler.sweep(&[eth_btc()], 0, 4, &stop).await;
    assert_eq!(first.report.processed, 3);
    assert_eq!(first.checkpoint, 4);

    let second = resampler.sweep(&[eth_btc()], 0, 4, &stop).await;
    assert_eq!(second.report.processed, 0);
    assert_eq!(harness.store.len(&series_key("PriceStorage", "close_price")), 3);
}
