use chrono::{Duration, TimeZone, Utc};
use mastery_system::{Flashcard, Quality, SchedulerError, Sm2Scheduler};
use mastery_system::sm2_scheduler::{MAX_INTERVAL_DAYS, MIN_EASE_FACTOR};
use uuid::Uuid;

fn card_with(interval: u32, ease_factor: f64, repetition_count: u32) -> Flashcard {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    Flashcard {
        interval,
        ease_factor,
        repetition_count,
        ..Flashcard::new(Uuid::new_v4(), "front".to_string(), "back".to_string(), now)
    }
}

fn ease_grid() -> Vec<f64> {
    (0..=27).map(|step| 1.3 + step as f64 * 0.1).collect()
}

#[test]
fn test_ease_factor_never_drops_below_floor() {
    let scheduler = Sm2Scheduler::new();
    let now = Utc::now();

    for ease in ease_grid() {
        for quality in 0..=5 {
            for repetitions in 0..4 {
                let card = card_with(10, ease, repetitions);
                let (updated, log) = scheduler.schedule_review(&card, quality, now).unwrap();
                assert!(
                    updated.ease_factor >= MIN_EASE_FACTOR,
                    "ease {} with quality {} fell to {}",
                    ease,
                    quality,
                    updated.ease_factor
                );
                assert_eq!(log.ease_factor, updated.ease_factor);
            }
        }
    }
}

#[test]
fn test_failure_resets_interval_and_repetitions() {
    let scheduler = Sm2Scheduler::new();
    let now = Utc::now();

    for ease in ease_grid() {
        for quality in 0..=2 {
            for (interval, repetitions) in [(0, 0), (1, 1), (6, 2), (40, 7)] {
                let card = card_with(interval, ease, repetitions);
                let (updated, _) = scheduler.schedule_review(&card, quality, now).unwrap();
                assert_eq!(updated.repetition_count, 0);
                assert_eq!(updated.interval, 1);
                assert_eq!(updated.next_review_at, now + Duration::days(1));
            }
        }
    }
}

#[test]
fn test_first_two_successes_use_fixed_intervals() {
    let scheduler = Sm2Scheduler::new();
    let now = Utc::now();
    let card = card_with(0, 2.5, 0);

    let (first, _) = scheduler.schedule_review(&card, 4, now).unwrap();
    assert_eq!(first.interval, 1);

    let (second, _) = scheduler.schedule_review(&first, 4, now).unwrap();
    assert_eq!(second.interval, 6);

    let (third, _) = scheduler.schedule_review(&second, 4, now).unwrap();
    assert_eq!(third.interval, (6.0 * second.ease_factor).round() as u32);
    assert_eq!(third.interval, 15);
}

#[test]
fn test_due_boundary_is_inclusive() {
    let now = Utc::now();
    let mut card = card_with(1, 2.5, 1);

    card.next_review_at = now;
    assert!(Sm2Scheduler::is_due(&card, now));

    card.next_review_at = now - Duration::milliseconds(1);
    assert!(Sm2Scheduler::is_due(&card, now));

    card.next_review_at = now + Duration::milliseconds(1);
    assert!(!Sm2Scheduler::is_due(&card, now));
}

#[test]
fn test_remembered_card_is_never_immediately_due() {
    let scheduler = Sm2Scheduler::new();
    let now = Utc::now();

    for ease in ease_grid() {
        for quality in 3..=5 {
            for (interval, repetitions) in [(0, 0), (0, 2), (1, 1), (1, 2), (6, 2), (30, 5)] {
                let card = card_with(interval, ease, repetitions);
                let (updated, _) = scheduler.schedule_review(&card, quality, now).unwrap();
                assert!(updated.interval >= 1);
                assert!(!Sm2Scheduler::is_due(&updated, now));
            }
        }
    }
}

#[test]
fn test_out_of_range_quality_fails_loudly() {
    let scheduler = Sm2Scheduler::new();
    let card = card_with(0, 2.5, 0);

    for quality in [-1, 6, 100] {
        assert_eq!(
            scheduler.schedule_review(&card, quality, Utc::now()).unwrap_err(),
            SchedulerError::InvalidQuality(quality)
        );
        assert!(Quality::new(quality).is_err());
    }
}

#[test]
fn test_repeated_easy_reviews_stay_bounded() {
    let scheduler = Sm2Scheduler::new();
    let now = Utc::now();
    let mut card = card_with(0, 2.5, 0);

    for _ in 0..40 {
        let (updated, log) = scheduler.schedule_review(&card, 5, now).unwrap();
        assert!(updated.interval >= card.interval.max(1));
        assert!(updated.interval <= MAX_INTERVAL_DAYS);
        assert_eq!(log.scheduled_days, updated.interval);
        assert!(updated.next_review_at > now);
        card = updated;
    }

    assert_eq!(card.interval, MAX_INTERVAL_DAYS);
    assert_eq!(card.next_review_at, now + Duration::days(MAX_INTERVAL_DAYS as i64));
}
