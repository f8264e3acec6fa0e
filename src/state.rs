//! Per-item review state as callers persist it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RowError;
use crate::fsrs::Rating;

/// One applied rating, frozen at the moment it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    pub rating: Rating,
    pub stability_before: f64,
    pub stability_after: f64,
    pub difficulty_before: f64,
    pub difficulty_after: f64,
    /// Recall probability at the time of the rating, in [0, 1].
    pub retrievability: f64,
}

/// Scheduling state for one learning item.
///
/// Only ever replaced wholesale by the scheduler's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    /// Days until recall probability decays to 90%. Zero before the first rating.
    pub stability: f64,
    pub difficulty: f64,
    pub lapses: u32,
    pub current_interval_days: u32,
    pub next_review_date: DateTime<Utc>,
    pub last_review_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub review_history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    New,
    Review,
    Relearning,
}

impl ReviewState {
    pub fn phase(&self) -> Phase {
        match self.review_history.last() {
            None => Phase::New,
            Some(last) if self.lapses > 0 && last.rating == Rating::Again => Phase::Relearning,
            Some(_) if self.stability > 0.0 => Phase::Review,
            Some(_) => Phase::New,
        }
    }

    /// True when the next rating must use the seed formulas.
    pub fn is_unreviewed(&self) -> bool {
        self.stability <= 0.0 || self.last_review_date.is_none()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date <= now
    }
}

/// Self-reported difficulty chosen when an item is first collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    VeryEasy,
    Easy,
    Medium,
    Hard,
}

/// Fixed seed values for a [`DifficultyLevel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultySeed {
    pub rating: Rating,
    pub interval_days: u32,
    pub stability: f64,
    pub difficulty: f64,
}

impl DifficultyLevel {
    pub const ALL: [DifficultyLevel; 4] = [
        DifficultyLevel::VeryEasy,
        DifficultyLevel::Easy,
        DifficultyLevel::Medium,
        DifficultyLevel::Hard,
    ];

    pub fn seed(self) -> DifficultySeed {
        let (rating, interval_days, stability, difficulty) = match self {
            DifficultyLevel::VeryEasy => (Rating::Easy, 14, 14.0, 1.0),
            DifficultyLevel::Easy => (Rating::Good, 7, 7.0, 3.0),
            DifficultyLevel::Medium => (Rating::Hard, 3, 3.0, 5.0),
            DifficultyLevel::Hard => (Rating::Again, 1, 1.0, 7.0),
        };
        DifficultySeed {
            rating,
            interval_days,
            stability,
            difficulty,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyLevel::VeryEasy => "very_easy",
            DifficultyLevel::Easy => "easy",
            DifficultyLevel::Medium => "medium",
            DifficultyLevel::Hard => "hard",
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyLevel {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DifficultyLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s.trim())
            .ok_or_else(|| RowError::UnknownDifficulty(s.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn entry(rating: Rating) -> HistoryEntry {
        HistoryEntry {
            date: t0(),
            rating,
            stability_before: 0.0,
            stability_after: 3.0,
            difficulty_before: 5.0,
            difficulty_after: 5.0,
            retrievability: 1.0,
        }
    }

    fn state() -> ReviewState {
        ReviewState {
            stability: 0.0,
            difficulty: 5.0,
            lapses: 0,
            current_interval_days: 1,
            next_review_date: t0() + Duration::days(1),
            last_review_date: None,
            review_history: Vec::new(),
        }
    }

    #[test]
    fn phase_new_without_history() {
        assert_eq!(state().phase(), Phase::New);
        assert!(state().is_unreviewed());
    }

    #[test]
    fn phase_review_after_success() {
        let mut s = state();
        s.stability = 3.0;
        s.last_review_date = Some(t0());
        s.review_history.push(entry(Rating::Good));
        assert_eq!(s.phase(), Phase::Review);
        assert!(!s.is_unreviewed());
    }

    #[test]
    fn phase_relearning_after_lapse() {
        let mut s = state();
        s.stability = 0.8;
        s.lapses = 1;
        s.last_review_date = Some(t0());
        s.review_history.push(entry(Rating::Good));
        s.review_history.push(entry(Rating::Again));
        assert_eq!(s.phase(), Phase::Relearning);

        s.review_history.push(entry(Rating::Good));
        assert_eq!(s.phase(), Phase::Review);
    }

    #[test]
    fn due_check_is_inclusive() {
        let s = state();
        assert!(!s.is_due(t0()));
        assert!(s.is_due(t0() + Duration::days(1)));
    }

    #[test]
    fn level_parsing() {
        assert!(matches!("very_easy".parse::<DifficultyLevel>(), Ok(DifficultyLevel::VeryEasy)));
        assert!(matches!(" hard ".parse::<DifficultyLevel>(), Ok(DifficultyLevel::Hard)));
        assert!(matches!(
            "impossible".parse::<DifficultyLevel>(),
            Err(RowError::UnknownDifficulty(level)) if level == "impossible"
        ));
        assert_eq!(DifficultyLevel::Medium.to_string(), "medium");
    }

    #[test]
    fn history_json_uses_camel_case() {
        let json = serde_json::to_value(entry(Rating::Hard)).unwrap();
        assert_eq!(json["rating"], 2);
        assert_eq!(json["stabilityAfter"], 3.0);
        assert!(json.get("difficultyBefore").is_some());
    }

    #[test]
    fn state_without_history_field_deserializes() {
        let json = serde_json::json!({
            "stability": 2.5,
            "difficulty": 4.0,
            "lapses": 0,
            "currentIntervalDays": 2,
            "nextReviewDate": "2025-03-03T09:00:00Z",
            "lastReviewDate": null
        });
        let s: ReviewState = serde_json::from_value(json).unwrap();
        assert!(s.review_history.is_empty());
        assert_eq!(s.last_review_date, None);
    }
}
