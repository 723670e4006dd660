use super::*;
use std::sync::Arc;

fn window() -> RateWindow {
    RateWindow::new(RateWindowConfig {
        calls_per_minute: 3,
        monitor_window: Duration::from_secs(300),
    })
}

#[test]
fn test_counts_recorded_calls() {
    let w = window();
    let base = Instant::now();

    for i in 0..5 {
        w.record_call(base + Duration::from_secs(i));
    }

    let now = base + Duration::from_secs(5);
    assert_eq!(w.calls_in_last_at(MINUTE, now), 5);
    assert_eq!(w.calls_in_last_at(Duration::from_secs(300), now), 5);
}

#[test]
fn test_elapsed_calls_stop_counting() {
    let w = window();
    let base = Instant::now();

    w.record_call(base);
    w.record_call(base + Duration::from_secs(10));
    w.record_call(base + Duration::from_secs(70));

    // At t=75s, only the call at 70s is inside the last minute
    let now = base + Duration::from_secs(75);
    assert_eq!(w.calls_in_last_at(MINUTE, now), 1);
    assert_eq!(w.calls_in_last_at(Duration::from_secs(300), now), 3);
}

#[test]
fn test_prunes_beyond_monitor_window() {
    let w = window();
    let base = Instant::now();

    w.record_call(base);
    w.record_call(base + Duration::from_secs(1));
    assert_eq!(w.len(), 2);

    w.prune(base + Duration::from_millis(300_500));
    assert_eq!(w.len(), 1);

    // Recording prunes too
    w.record_call(base + Duration::from_secs(400));
    assert_eq!(w.len(), 1);
}

#[test]
fn test_would_exceed_at_ceiling() {
    let w = window();
    let base = Instant::now();

    w.record_call(base);
    w.record_call(base);
    assert!(!w.would_exceed_at(3, MINUTE, base));

    w.record_call(base);
    assert!(w.would_exceed_at(3, MINUTE, base));

    // A minute later the ceiling frees up
    assert!(!w.would_exceed_at(3, MINUTE, base + Duration::from_secs(61)));
}

#[test]
fn test_out_of_order_timestamp_is_clamped() {
    let w = window();
    let base = Instant::now();

    w.record_call(base + Duration::from_secs(30));
    w.record_call(base + Duration::from_secs(10));

    // Both count as t=30s, so both survive until t=90s
    let now = base + Duration::from_secs(89);
    assert_eq!(w.calls_in_last_at(MINUTE, now), 2);
}

#[test]
fn test_concurrent_recording() {
    let w = Arc::new(RateWindow::default());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let w = Arc::clone(&w);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    w.record_now();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(w.calls_in_last(MINUTE), 200);
}

#[test]
fn test_try_record_stops_at_ceiling() {
    let w = window();
    let base = Instant::now();

    assert!(w.try_record_at(base));
    assert!(w.try_record_at(base + Duration::from_secs(1)));
    assert!(w.try_record_at(base + Duration::from_secs(2)));
    assert!(!w.try_record_at(base + Duration::from_secs(3)));
    // a refused call is not recorded
    assert_eq!(w.len(), 3);

    assert!(w.try_record_at(base + Duration::from_secs(61)));
}

#[test]
fn test_concurrent_try_record_never_overshoots() {
    let w = Arc::new(window());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let w = Arc::clone(&w);
            std::thread::spawn(move || (0..10).filter(|_| w.try_record_now()).count())
        })
        .collect();
    let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(granted, 3);
    assert_eq!(w.calls_in_last(MINUTE), 3);
}

#[test]
fn test_empty_window() {
    let w = RateWindow::default();
    assert!(w.is_empty());
    assert_eq!(w.ceiling(), DEFAULT_CALLS_PER_MINUTE);
    assert!(!w.at_ceiling());
}
