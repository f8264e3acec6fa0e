//! Property tests for the scheduler over random rating sequences and
//! elapsed-time shapes.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use kordrill::fsrs::{self, MIN_STABILITY};
use kordrill::{DifficultyLevel, Rating, ReviewState, Scheduler, SchedulerError};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap()
}

fn arb_rating() -> impl Strategy<Value = Rating> {
    prop_oneof![
        Just(Rating::Again),
        Just(Rating::Hard),
        Just(Rating::Good),
        Just(Rating::Easy),
    ]
}

fn arb_level() -> impl Strategy<Value = DifficultyLevel> {
    prop_oneof![
        Just(DifficultyLevel::VeryEasy),
        Just(DifficultyLevel::Easy),
        Just(DifficultyLevel::Medium),
        Just(DifficultyLevel::Hard),
    ]
}

/// Gap before a review, in minutes: same day, days, or years.
fn arb_gap() -> impl Strategy<Value = i64> {
    prop_oneof![
        0i64..=600,
        (1i64..=60).prop_map(|d| d * 1440),
        (365i64..=3650).prop_map(|d| d * 1440),
    ]
}

fn arb_retention() -> impl Strategy<Value = f64> {
    (700u32..=970).prop_map(|v| f64::from(v) / 1000.0)
}

/// A reviewed state reached by replaying random ratings from an initial or
/// seeded start.
fn arb_state() -> impl Strategy<Value = (ReviewState, DateTime<Utc>)> {
    (
        proptest::option::of(arb_level()),
        proptest::collection::vec((arb_rating(), arb_gap()), 1..12),
    )
        .prop_map(|(level, steps)| {
            let sched = Scheduler::default();
            let mut now = t0();
            let mut state = match level {
                Some(level) => sched.create_from_difficulty(level, now),
                None => sched.create_initial(now),
            };
            for (rating, gap) in steps {
                now += Duration::minutes(gap);
                state = sched.apply(&state, rating, now, 0.9).unwrap();
            }
            (state, now)
        })
}

proptest! {
    #[test]
    fn retrievability_fixed_point(s in 0.01f64..50_000.0) {
        prop_assert!((fsrs::retrievability(s, s) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn retrievability_decreases_with_time(s in 0.01f64..10_000.0, t in 0.0f64..10_000.0, dt in 0.01f64..1000.0) {
        prop_assert_eq!(fsrs::retrievability(0.0, s), 1.0);
        prop_assert!(fsrs::retrievability(t + dt, s) < fsrs::retrievability(t, s));
    }

    #[test]
    fn retrievability_increases_with_stability(s in 0.01f64..10_000.0, ds in 0.01f64..1000.0, t in 0.01f64..10_000.0) {
        prop_assert!(fsrs::retrievability(t, s + ds) > fsrs::retrievability(t, s));
    }

    #[test]
    fn recall_never_lowers_stability(
        (state, last) in arb_state(),
        rating in prop_oneof![Just(Rating::Hard), Just(Rating::Good), Just(Rating::Easy)],
        gap in arb_gap(),
        retention in arb_retention(),
    ) {
        prop_assume!(state.stability > 0.0);
        let sched = Scheduler::default();
        let next = sched.apply(&state, rating, last + Duration::minutes(gap), retention).unwrap();
        prop_assert!(next.stability >= state.stability);
        prop_assert_eq!(next.lapses, state.lapses);
        prop_assert!(next.current_interval_days >= 1);
    }

    #[test]
    fn lapse_lowers_stability(
        (state, last) in arb_state(),
        gap in arb_gap(),
        retention in arb_retention(),
    ) {
        prop_assume!(state.stability > 0.0);
        let sched = Scheduler::default();
        let next = sched.apply(&state, Rating::Again, last + Duration::minutes(gap), retention).unwrap();
        prop_assert!(
            next.stability < state.stability
                || next.stability == MIN_STABILITY.min(state.stability)
        );
        prop_assert_eq!(next.lapses, state.lapses + 1);
    }

    #[test]
    fn difficulty_stays_in_bounds((state, _) in arb_state()) {
        prop_assert!((1.0..=10.0).contains(&state.difficulty));
        for entry in &state.review_history {
            prop_assert!((1.0..=10.0).contains(&entry.difficulty_after));
            prop_assert!((0.0..=1.0).contains(&entry.retrievability));
        }
    }

    #[test]
    fn history_is_append_only(
        (state, last) in arb_state(),
        rating in arb_rating(),
        gap in arb_gap(),
    ) {
        let sched = Scheduler::default();
        let now = last + Duration::minutes(gap);
        let next = sched.apply(&state, rating, now, 0.9).unwrap();
        prop_assert_eq!(next.review_history.len(), state.review_history.len() + 1);
        prop_assert_eq!(&next.review_history[..state.review_history.len()], &state.review_history[..]);
        let entry = next.review_history.last().unwrap();
        prop_assert_eq!(entry.rating, rating);
        prop_assert_eq!(entry.date, now);
        prop_assert_eq!(entry.stability_before, state.stability);
        prop_assert_eq!(entry.stability_after, next.stability);
    }

    #[test]
    fn next_review_is_in_the_future(
        (state, last) in arb_state(),
        rating in arb_rating(),
        gap in arb_gap(),
        retention in arb_retention(),
    ) {
        let sched = Scheduler::default();
        let now = last + Duration::minutes(gap);
        let next = sched.apply(&state, rating, now, retention).unwrap();
        prop_assert!(next.next_review_date > now);
        prop_assert_eq!(next.last_review_date, Some(now));
    }

    #[test]
    fn out_of_range_ratings_rejected((state, last) in arb_state(), rating in 5u8..=255) {
        let sched = Scheduler::default();
        prop_assert_eq!(sched.update(&state, rating, last, 0.9), Err(SchedulerError::InvalidRating(rating)));
        prop_assert_eq!(sched.update(&state, 0, last, 0.9), Err(SchedulerError::InvalidRating(0)));
    }

    #[test]
    fn preview_is_repeatable(rating in 1u8..=4, retention in arb_retention()) {
        let sched = Scheduler::default();
        let a = sched.preview_interval(rating, retention).unwrap();
        let b = sched.preview_interval(rating, retention).unwrap();
        prop_assert_eq!(a, b);
    }
}
