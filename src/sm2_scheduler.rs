use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SchedulerError;
use crate::intervals::next_review_at;
use crate::models::Flashcard;

pub const INITIAL_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const MAX_QUALITY: u8 = 5;
/// Qualities at or above this count as remembered.
pub const PASSING_QUALITY: u8 = 3;
/// Upper bound on a scheduled interval, one hundred years.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Recall quality on the SM-2 six-point scale, validated to [0, 5].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: i64) -> Result<Self, SchedulerError> {
        if (0..=MAX_QUALITY as i64).contains(&value) {
            Ok(Quality(value as u8))
        } else {
            Err(SchedulerError::InvalidQuality(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_passing(self) -> bool {
        self.0 >= PASSING_QUALITY
    }
}

impl TryFrom<i64> for Quality {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Quality::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Buttons offered to the learner after flipping a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewButton {
    Again,
    Hard,
    Good,
    Easy,
}

impl ReviewButton {
    pub fn quality(self) -> Quality {
        match self {
            ReviewButton::Again => Quality(1),
            ReviewButton::Hard => Quality(3),
            ReviewButton::Good => Quality(4),
            ReviewButton::Easy => Quality(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewLog {
    pub quality: u8,
    pub scheduled_days: u32,
    pub ease_factor: f64,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Sm2Scheduler;

impl Sm2Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Apply one review outcome to a card and return its new state.
    ///
    /// Remembered outcomes walk the 1 day, 6 days, `interval * ease` ladder;
    /// forgotten outcomes restart the ladder with a one day grace period.
    /// The ease factor is adjusted for every outcome and never drops below
    /// [`MIN_EASE_FACTOR`].
    pub fn schedule_review(
        &self,
        card: &Flashcard,
        quality: i64,
        now: DateTime<Utc>,
    ) -> Result<(Flashcard, ReviewLog), SchedulerError> {
        let quality = Quality::new(quality)?;
        Ok(self.schedule_with_quality(card, quality, now))
    }

    pub fn schedule_with_quality(
        &self,
        card: &Flashcard,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> (Flashcard, ReviewLog) {
        let (interval, repetition_count) = if quality.is_passing() {
            let interval = match card.repetition_count {
                0 => 1,
                1 => 6,
                _ => Self::grow_interval(card.interval, card.ease_factor),
            };
            (interval, card.repetition_count.saturating_add(1))
        } else {
            (1, 0)
        };

        let ease_factor = Self::next_ease_factor(card.ease_factor, quality);

        let updated_card = Flashcard {
            interval,
            ease_factor,
            repetition_count,
            next_review_at: next_review_at(now, interval),
            last_reviewed_at: Some(now),
            ..card.clone()
        };

        let review_log = ReviewLog {
            quality: quality.value(),
            scheduled_days: interval,
            ease_factor,
            reviewed_at: now,
        };

        (updated_card, review_log)
    }

    /// `round(interval * ease)`, rounding half away from zero, within
    /// `[1, MAX_INTERVAL_DAYS]`. Never 0 so a remembered card is never
    /// immediately due again.
    fn grow_interval(interval: u32, ease_factor: f64) -> u32 {
        let grown = (interval as f64 * ease_factor).round();
        grown.clamp(1.0, MAX_INTERVAL_DAYS as f64) as u32
    }

    fn next_ease_factor(ease_factor: f64, quality: Quality) -> f64 {
        let miss = (MAX_QUALITY - quality.value()) as f64;
        let adjusted = ease_factor + (0.1 - miss * (0.08 + miss * 0.02));
        adjusted.max(MIN_EASE_FACTOR)
    }

    pub fn is_due(card: &Flashcard, now: DateTime<Utc>) -> bool {
        card.next_review_at <= now
    }

    /// Due cards, most overdue first.
    pub fn due_cards(cards: &[Flashcard], now: DateTime<Utc>) -> Vec<Flashcard> {
        let mut due: Vec<Flashcard> = cards
            .iter()
            .filter(|card| Self::is_due(card, now))
            .cloned()
            .collect();
        due.sort_by_key(|card| card.next_review_at);
        due
    }
}
