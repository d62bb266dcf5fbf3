//! Integration tests for Pengesture
//!
//! These drive the public library API with scripted pen event streams.
//! Tests that require hardware live in `hardware_tests.rs`.

use pengesture::{
    ClassifierState, GestureClassifier, GestureEvent, GestureKind, InputRecord, RawEvent,
    RawEventKind, Timestamp, Timings, classify, run_classifier,
};

fn at(ms: i64) -> Timestamp {
    Timestamp::from_millis(ms)
}

fn gesture(kind: GestureKind, count: u32) -> GestureEvent {
    GestureEvent::new(kind, count)
}

/// Tiny xorshift generator so the fuzz streams are reproducible
struct Xorshift(u64);

impl Xorshift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// A plausible but noisy pen stream with non-decreasing timestamps
fn noisy_stream(seed: u64, len: usize) -> Vec<RawEvent> {
    let mut rng = Xorshift(seed);
    let mut now = 0i64;
    let mut events = Vec::with_capacity(len);

    for _ in 0..len {
        now += match rng.below(4) {
            0 => 0,
            1 => rng.below(12) as i64,
            2 => rng.below(150) as i64,
            _ => rng.below(600) as i64,
        };
        let ts = at(now);
        let ev = match rng.below(9) {
            0 => RawEvent::sync(ts),
            1 => RawEvent::button(true, ts),
            2 => RawEvent::button(false, ts),
            3 => RawEvent::tool(rng.below(2) == 1, ts),
            4 => RawEvent::distance(if rng.below(2) == 0 { 0 } else { rng.below(40) as i32 }, ts),
            5 => RawEvent::pressure(if rng.below(2) == 0 { 0 } else { rng.below(2048) as i32 }, ts),
            _ => RawEvent::other(rng.below(4096) as i32, ts),
        };
        events.push(ev);
    }
    events
}

#[test]
fn test_single_click_scenario() {
    let events = vec![
        RawEvent::button(true, at(0)),
        RawEvent::sync(at(0)),
        RawEvent::button(false, at(50)),
        RawEvent::sync(at(50)),
        RawEvent::other(731, at(52)),
        RawEvent::other(733, at(450)),
    ];
    assert_eq!(
        run_classifier(events, Timings::default()),
        vec![gesture(GestureKind::Click, 1)]
    );
}

#[test]
fn test_press_and_hold_scenario() {
    let mut classifier = GestureClassifier::default();
    assert_eq!(classifier.classify(RawEvent::button(true, at(0))), None);
    assert_eq!(
        classifier.classify(RawEvent::other(1, at(250))),
        Some(gesture(GestureKind::HoldStart, 1))
    );
    assert_eq!(classifier.classify(RawEvent::button(false, at(255))), None);
    assert_eq!(
        classifier.classify(RawEvent::other(1, at(260))),
        Some(gesture(GestureKind::HoldStop, 1))
    );
    assert_eq!(
        classifier.classify(RawEvent::sync(at(260))),
        Some(gesture(GestureKind::LongClick, 1))
    );
}

#[test]
fn test_false_lift_scenario() {
    let events = vec![
        RawEvent::distance(0, at(0)),
        RawEvent::pressure(900, at(5)),
        RawEvent::pressure(0, at(80)),
        RawEvent::distance(3, at(100)),
        RawEvent::button(false, at(104)),
        RawEvent::distance(0, at(106)),
        RawEvent::other(1, at(300)),
        RawEvent::other(1, at(900)),
    ];
    let outputs = run_classifier(events, Timings::default());
    assert!(outputs.iter().all(|g| g.kind != GestureKind::Lift));
}

#[test]
fn test_pulled_away_while_held_scenario() {
    let mut classifier = GestureClassifier::default();
    let events = [
        RawEvent::button(true, at(0)),
        RawEvent::other(1, at(250)),
        RawEvent::tool(false, at(300)),
        RawEvent::sync(at(300)),
        RawEvent::button(false, at(300)),
        RawEvent::sync(at(300)),
    ];
    let outputs: Vec<_> = events.iter().filter_map(|ev| classifier.classify(*ev)).collect();
    assert_eq!(outputs, vec![gesture(GestureKind::HoldStart, 1)]);
    assert_eq!(classifier.state().hold, Some(1));

    assert_eq!(
        classifier.classify(RawEvent::tool(true, at(1500))),
        Some(gesture(GestureKind::HoldStop, 1))
    );
    assert_eq!(classifier.state().click_count, 0);
    assert_eq!(classifier.state().segment_count, 0);
    assert_eq!(classifier.state().hold, None);
}

#[test]
fn test_second_press_during_hold_scenario() {
    let mut classifier = GestureClassifier::default();
    assert_eq!(classifier.classify(RawEvent::button(true, at(0))), None);
    assert_eq!(
        classifier.classify(RawEvent::other(1, at(210))),
        Some(gesture(GestureKind::HoldStart, 1))
    );
    // the first release was never seen, so the new press closes the hold
    assert_eq!(
        classifier.classify(RawEvent::button(true, at(215))),
        Some(gesture(GestureKind::HoldStop, 1))
    );
    assert_eq!(classifier.state().click_count, 1);
    assert_eq!(classifier.state().hold, None);
}

#[test]
fn test_raw_records_drive_classifier() {
    // BTN_STYLUS down/up, then ABS_X reports
    let records = [
        InputRecord::new(0x01, 0x14b, 1, at(1_000)),
        InputRecord::new(0x00, 0x00, 0, at(1_000)),
        InputRecord::new(0x01, 0x14b, 0, at(1_080)),
        InputRecord::new(0x00, 0x00, 0, at(1_080)),
        InputRecord::new(0x03, 0x00, 4000, at(1_084)),
        InputRecord::new(0x03, 0x00, 4010, at(1_500)),
    ];
    let events: Vec<RawEvent> = records.iter().copied().map(RawEvent::from).collect();
    assert_eq!(events[4].kind, RawEventKind::Other);
    assert_eq!(
        run_classifier(events, Timings::default()),
        vec![gesture(GestureKind::Click, 1)]
    );
}

#[test]
fn test_hold_balance_and_repeat_counts_on_noise() {
    for seed in 1..=40u64 {
        let mut classifier = GestureClassifier::default();
        let mut open_holds = 0i32;

        for ev in noisy_stream(seed * 7919, 3000) {
            if let Some(g) = classifier.classify(ev) {
                assert!(g.repeat_count >= 1, "seed {seed}: {g:?} has zero count");
                match g.kind {
                    GestureKind::HoldStart => open_holds += 1,
                    GestureKind::HoldStop => open_holds -= 1,
                    _ => {}
                }
                assert!(
                    (0..=1).contains(&open_holds),
                    "seed {seed}: hold balance {open_holds} after {g:?}"
                );
            }

            let state = classifier.state();
            if state.click_count == 0 {
                assert!(!state.long_click_pending, "seed {seed}: long click pending with no clicks");
                assert!(state.hold.is_none(), "seed {seed}: hold open with no clicks");
            }
        }
    }
}

#[test]
fn test_classification_is_deterministic() {
    for seed in [3u64, 17, 2024] {
        let events = noisy_stream(seed, 2000);
        let first = run_classifier(events.clone(), Timings::default());
        let second = run_classifier(events, Timings::default());
        assert_eq!(first, second, "seed {seed}");
    }
}

#[test]
fn test_unrecognised_events_are_inert_on_idle_state() {
    let mut state = ClassifierState::default();
    let timings = Timings::default();
    for (i, value) in [0, 17, -5, 4096].into_iter().enumerate() {
        let ev = RawEvent::new(RawEventKind::Other, value, at(i as i64 * 1000));
        assert_eq!(classify(&mut state, &timings, ev), None);
        assert_eq!(state, ClassifierState::default());
    }
}
