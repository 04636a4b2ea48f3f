//! Integration tests for sliding-window admission.

use inference_governor::infrastructure::mocks::MockClock;
use inference_governor::{SlidingWindowLimiter, WindowConfig};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn limiter(window_ms: u64, max: usize) -> (SlidingWindowLimiter, MockClock) {
    let clock = MockClock::new(Instant::now());
    let config = WindowConfig::from_millis(window_ms, max).unwrap();
    let limiter = SlidingWindowLimiter::new(config, Arc::new(clock.clone()));
    (limiter, clock)
}

#[test]
fn test_nth_admitted_and_next_rejected() {
    for max in [1, 2, 5, 17] {
        let (limiter, clock) = limiter(10_000, max);

        for n in 1..=max {
            let decision = limiter.check("caller");
            assert!(decision.allowed, "check {n} of {max} should be admitted");
            assert_eq!(decision.remaining, max - n);
            clock.advance_ms(1);
        }
        assert!(!limiter.check("caller").allowed);
    }
}

#[test]
fn test_documented_scenario() {
    let start = Instant::now();
    let (limiter, _clock) = limiter(1_000, 2);
    let at = |ms: u64| start + Duration::from_millis(ms);

    let first = limiter.check_at("a", at(0));
    assert!(first.allowed);
    assert_eq!(first.remaining, 1);

    let second = limiter.check_at("a", at(10));
    assert!(second.allowed);
    assert_eq!(second.remaining, 0);

    let third = limiter.check_at("a", at(20));
    assert!(!third.allowed);
    assert_eq!(third.reset_ms(), 980);

    assert!(limiter.check_at("a", at(1_001)).allowed);
}

#[test]
fn test_first_check_reports_full_window() {
    let (limiter, _clock) = limiter(60_000, 10);

    let decision = limiter.check("new-caller");
    assert_eq!(decision.remaining, 9);
    assert_eq!(decision.reset, Duration::from_secs(60));
}

#[test]
fn test_reset_always_within_window() {
    let (limiter, clock) = limiter(1_000, 3);

    for step in 0..200 {
        let decision = limiter.check("busy");
        assert!(decision.reset <= Duration::from_millis(1_000));
        clock.advance_ms(7 + (step % 11));
    }
}

#[test]
fn test_rejected_caller_recovers_after_window() {
    let (limiter, clock) = limiter(5_000, 1);

    assert!(limiter.check("a").allowed);
    clock.advance_ms(4_999);
    assert!(!limiter.check("a").allowed);
    clock.advance_ms(1);
    assert!(limiter.check("a").allowed);
}

#[test]
fn test_keys_never_influence_each_other() {
    let (limiter, _clock) = limiter(60_000, 2);

    limiter.check("noisy");
    limiter.check("noisy");
    for _ in 0..10 {
        assert!(!limiter.check("noisy").allowed);
    }

    let quiet = limiter.check("quiet");
    assert!(quiet.allowed);
    assert_eq!(quiet.remaining, 1);
}

#[test]
fn test_stale_key_after_cleanup_behaves_like_new() {
    let (limiter, clock) = limiter(1_000, 2);

    limiter.check("a");
    limiter.check("a");
    clock.advance_ms(1_500);
    limiter.check("b");

    assert_eq!(limiter.cleanup(), 1);
    assert_eq!(limiter.registry().len(), 1);

    let decision = limiter.check("a");
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 1);
    assert_eq!(decision.reset, Duration::from_millis(1_000));
}

#[test]
fn test_cleanup_keeps_partially_live_windows() {
    let (limiter, clock) = limiter(1_000, 5);

    limiter.check("a");
    clock.advance_ms(900);
    limiter.check("a");
    clock.advance_ms(200);

    assert_eq!(limiter.cleanup(), 0);
    assert_eq!(limiter.check("a").remaining, 3);
}

#[test]
fn test_cleanup_concurrent_with_checks() {
    let clock = MockClock::new(Instant::now());
    let config = WindowConfig::from_millis(60_000, 1_000).unwrap();
    let limiter = Arc::new(SlidingWindowLimiter::new(config, Arc::new(clock)));

    let checker = {
        let limiter = Arc::clone(&limiter);
        thread::spawn(move || {
            (0..500)
                .filter(|i| limiter.check(&format!("caller-{}", i % 5)).allowed)
                .count()
        })
    };
    let sweeper = {
        let limiter = Arc::clone(&limiter);
        thread::spawn(move || (0..100).map(|_| limiter.cleanup()).sum::<usize>())
    };

    assert_eq!(checker.join().unwrap(), 500);
    assert_eq!(sweeper.join().unwrap(), 0);

    // Nothing admitted was lost.
    let recorded: usize = (0..5)
        .map(|i| {
            limiter
                .registry()
                .with_window(&format!("caller-{i}"), |window, _| window.len())
        })
        .sum();
    assert_eq!(recorded, 500);
}
