//! End-to-end pipeline tests: feed ring in, order ring out.

use fen_core::prelude::*;
use std::sync::Arc;
use std::thread;

fn pipeline() -> Pipeline<FixedLatencyOracle> {
    Pipeline::new(
        PipelineConfig {
            asset_id: 7,
            session_horizon_secs: 300.0,
            volatility_estimate: 0.0,
        },
        IntensityParams::default(),
        QuoteParams::default(),
        RiskLimits {
            max_position: 1000,
            max_order_notional: 1_000_000.0,
            max_daily_loss: 1_000_000.0,
            deny_naked_short: false,
        },
        FixedLatencyOracle::default(),
    )
}

fn update(kind: UpdateKind, seq: u64, order_id: u64, is_bid: bool, price: f64, qty: f64) -> BookUpdate {
    BookUpdate {
        kind,
        order_id,
        price,
        quantity: qty,
        is_bid,
        sequence: seq,
        timestamp_ns: seq as i64 * 100,
    }
}

/// A short session: build both sides, trade through, keep quoting.
#[test]
fn test_session_emits_orders_through_ring() {
    let feed: Arc<SpscQueue<BookUpdate, 256>> = Arc::new(SpscQueue::new());
    let orders: Arc<SpscQueue<Order, 256>> = Arc::new(SpscQueue::new());
    let shutdown = ShutdownFlag::new();

    let mut seq = 0u64;
    let mut events = Vec::new();
    // Seed ten levels per side.
    for i in 0..10u64 {
        seq += 1;
        events.push(update(
            UpdateKind::Add,
            seq,
            i + 1,
            true,
            99.99 - i as f64 * 0.01,
            10.0,
        ));
        seq += 1;
        events.push(update(
            UpdateKind::Add,
            seq,
            i + 101,
            false,
            100.01 + i as f64 * 0.01,
            10.0,
        ));
    }
    // Aggressive buy flow hits the asks.
    for _ in 0..5 {
        seq += 1;
        events.push(update(UpdateKind::Execute, seq, 9_999, true, 100.01, 2.0));
    }

    let producer = {
        let feed = Arc::clone(&feed);
        thread::spawn(move || {
            for event in events {
                while !feed.push(event) {
                    std::hint::spin_loop();
                }
            }
        })
    };

    let consumer = {
        let feed = Arc::clone(&feed);
        let orders = Arc::clone(&orders);
        let shutdown = shutdown.clone();
        thread::spawn(move || {
            let mut p = pipeline();
            p.run(&feed, &orders, &shutdown)
        })
    };

    producer.join().unwrap();
    // Let the consumer drain, then stop it.
    while !feed.is_empty() {
        thread::yield_now();
    }
    thread::sleep(std::time::Duration::from_millis(20));
    shutdown.request();
    let stats = consumer.join().unwrap();

    assert_eq!(stats.updates_processed, seq);
    assert!(stats.quotes_generated > 0, "no quotes from a two-sided book");
    assert!(stats.orders_emitted > 0);
    assert_eq!(stats.gaps_detected, 0);

    // Orders arrive in emission order with monotone ids per side pair.
    let mut last_id = 0;
    let mut count = 0;
    while let Some(order) = orders.pop() {
        assert!(order.order_id > last_id);
        last_id = order.order_id;
        assert!(order.price > 0.0);
        assert!(order.quantity > 0);
        count += 1;
    }
    assert_eq!(count as u64, stats.orders_emitted);
}

/// Orders respect position limits across the session.
#[test]
fn test_risk_limits_cap_emission() {
    let mut p = Pipeline::new(
        PipelineConfig {
            asset_id: 1,
            session_horizon_secs: 300.0,
            volatility_estimate: 0.0,
        },
        IntensityParams::default(),
        QuoteParams::default(),
        RiskLimits {
            max_position: 50, // below the base quote size of 100
            max_order_notional: 1_000_000.0,
            max_daily_loss: 1_000_000.0,
            deny_naked_short: false,
        },
        FixedLatencyOracle::default(),
    );

    p.process_update(&update(UpdateKind::Add, 1, 1, true, 99.99, 10.0));
    let decision = p.process_update(&update(UpdateKind::Add, 2, 2, false, 100.01, 10.0));

    // Both sides breach |position + qty| > 50 from a flat book.
    assert!(decision.is_none());
    assert_eq!(p.stats().risk_denials, 2);
}

/// Trade flow moves the intensity imbalance in the taker direction.
#[test]
fn test_executions_drive_intensity() {
    let mut p = pipeline();
    p.process_update(&update(UpdateKind::Add, 1, 1, true, 99.99, 100.0));
    p.process_update(&update(UpdateKind::Add, 2, 2, false, 100.01, 100.0));

    for i in 0..10 {
        p.process_update(&update(UpdateKind::Execute, 3 + i, 50_000, true, 100.01, 1.0));
    }

    let features = p.book().current_features();
    assert!(features.buy_pressure > 0.0);
    assert_eq!(features.sell_pressure, 0.0);
}
