//! Scheduler facade: the operations drill callers use to create and advance
//! review states.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SchedulerError};
use crate::fsrs::{self, FACTOR, MemoryState, Parameters, Rating};
use crate::state::{DifficultyLevel, HistoryEntry, ReviewState};

pub const DEFAULT_RETENTION: f64 = 0.9;
pub const DEFAULT_MAXIMUM_INTERVAL_DAYS: u32 = 36500;
pub const DEFAULT_RELEARN_DELAY_MINUTES: u32 = 10;

const INITIAL_DIFFICULTY: f64 = 5.0;
const INITIAL_INTERVAL_DAYS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Target recall probability used when the caller doesn't pass one.
    pub desired_retention: f64,
    pub parameters: Parameters,
    pub maximum_interval_days: u32,
    /// Delay before re-showing an item that was forgotten and scheduled for
    /// the same day.
    pub relearn_delay_minutes: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            desired_retention: DEFAULT_RETENTION,
            parameters: Parameters::default(),
            maximum_interval_days: DEFAULT_MAXIMUM_INTERVAL_DAYS,
            relearn_delay_minutes: DEFAULT_RELEARN_DELAY_MINUTES,
        }
    }
}

impl SchedulerConfig {
    pub fn with_retention(mut self, desired_retention: f64) -> Self {
        self.desired_retention = desired_retention;
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_maximum_interval(mut self, days: u32) -> Self {
        self.maximum_interval_days = days;
        self
    }

    pub fn with_relearn_delay(mut self, minutes: u32) -> Self {
        self.relearn_delay_minutes = minutes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_retention(self.desired_retention).map(|_| ())
    }
}

pub fn validate_retention(desired_retention: f64) -> Result<f64> {
    if desired_retention > 0.0 && desired_retention < 1.0 {
        Ok(desired_retention)
    } else {
        Err(SchedulerError::InvalidConfig(desired_retention))
    }
}

/// Interval sizing for one desired retention, rounded to 3 decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
struct IntervalModel {
    desired_retention: f64,
    days_per_stability: f64,
}

impl IntervalModel {
    fn new(key: u32) -> Self {
        let desired_retention = f64::from(key) / 1000.0;
        Self {
            desired_retention,
            days_per_stability: fsrs::interval_factor(desired_retention) / FACTOR,
        }
    }

    fn days(&self, stability: f64) -> f64 {
        stability * self.days_per_stability
    }
}

fn retention_key(desired_retention: f64) -> u32 {
    (desired_retention * 1000.0).round() as u32
}

/// Entry point for all scheduling decisions.
///
/// Holds no per-item state. The only interior state is an append-only cache
/// of interval models keyed by rounded retention; entries are pure functions
/// of their key, so concurrent inserts are harmless.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    models: RwLock<HashMap<u32, IntervalModel>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            config: SchedulerConfig::default(),
            models: RwLock::new(HashMap::new()),
        }
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            models: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn desired_retention(&self) -> f64 {
        self.config.desired_retention
    }

    /// State of an item that has never been rated.
    pub fn create_initial(&self, now: DateTime<Utc>) -> ReviewState {
        ReviewState {
            stability: 0.0,
            difficulty: INITIAL_DIFFICULTY,
            lapses: 0,
            current_interval_days: INITIAL_INTERVAL_DAYS,
            next_review_date: now + Duration::days(i64::from(INITIAL_INTERVAL_DAYS)),
            last_review_date: None,
            review_history: Vec::new(),
        }
    }

    /// State of an item the user graded on collection instead of reviewing it.
    pub fn create_from_difficulty(
        &self,
        level: DifficultyLevel,
        now: DateTime<Utc>,
    ) -> ReviewState {
        let seed = level.seed();
        ReviewState {
            stability: seed.stability,
            difficulty: seed.difficulty,
            lapses: 0,
            current_interval_days: seed.interval_days,
            next_review_date: now + Duration::days(i64::from(seed.interval_days)),
            last_review_date: Some(now),
            review_history: vec![HistoryEntry {
                date: now,
                rating: seed.rating,
                stability_before: 0.0,
                stability_after: seed.stability,
                difficulty_before: INITIAL_DIFFICULTY,
                difficulty_after: seed.difficulty,
                retrievability: 1.0,
            }],
        }
    }

    /// Applies a raw 1..=4 rating. Rejects anything else before touching
    /// the state.
    pub fn update(
        &self,
        state: &ReviewState,
        rating: u8,
        now: DateTime<Utc>,
        desired_retention: f64,
    ) -> Result<ReviewState> {
        let rating = Rating::try_from(rating)?;
        self.apply(state, rating, now, desired_retention)
    }

    pub fn apply(
        &self,
        state: &ReviewState,
        rating: Rating,
        now: DateTime<Utc>,
        desired_retention: f64,
    ) -> Result<ReviewState> {
        let model = self.model(desired_retention)?;
        let params = &self.config.parameters;

        let (memory, r) = match state.last_review_date {
            Some(last) if !state.is_unreviewed() => {
                let elapsed = elapsed_days(last, now);
                let r = fsrs::retrievability(elapsed, state.stability);
                let prev = MemoryState {
                    stability: state.stability,
                    difficulty: state.difficulty,
                };
                (params.next_state(prev, r, rating), r)
            }
            _ => (params.init_state(rating), 1.0),
        };

        let interval = self.interval_for(&model, memory.stability, rating);
        let next_review_date = if interval == 0 {
            now + Duration::minutes(i64::from(self.config.relearn_delay_minutes.max(1)))
        } else {
            now + Duration::days(i64::from(interval))
        };

        debug!(
            rating = rating.label(),
            stability = memory.stability,
            difficulty = memory.difficulty,
            retrievability = r,
            interval,
            "review applied"
        );

        let mut review_history = state.review_history.clone();
        review_history.push(HistoryEntry {
            date: now,
            rating,
            stability_before: state.stability,
            stability_after: memory.stability,
            difficulty_before: state.difficulty,
            difficulty_after: memory.difficulty,
            retrievability: r.clamp(0.0, 1.0),
        });

        let lapses = if rating == Rating::Again {
            state.lapses.saturating_add(1)
        } else {
            state.lapses
        };

        Ok(ReviewState {
            stability: memory.stability,
            difficulty: memory.difficulty,
            lapses,
            current_interval_days: interval,
            next_review_date,
            last_review_date: Some(now),
            review_history,
        })
    }

    /// Days until the next review if a brand-new card were given `rating`.
    pub fn preview_interval(&self, rating: u8, desired_retention: f64) -> Result<u32> {
        let rating = Rating::try_from(rating)?;
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let state = self.create_initial(epoch);
        Ok(self.apply(&state, rating, epoch, desired_retention)?.current_interval_days)
    }

    /// Preview for every rating, easiest last.
    pub fn preview_all(&self, desired_retention: f64) -> Result<[(Rating, u32); 4]> {
        let mut out = [(Rating::Again, 0); 4];
        for (slot, rating) in out.iter_mut().zip(Rating::ALL) {
            *slot = (rating, self.preview_interval(rating.into(), desired_retention)?);
        }
        Ok(out)
    }

    /// Number of distinct retention settings seen so far.
    pub fn cached_models(&self) -> usize {
        self.models.read().len()
    }

    fn model(&self, desired_retention: f64) -> Result<IntervalModel> {
        let key = retention_key(validate_retention(desired_retention)?);
        // Rounding can land on 0 or 1000 for values at the very edge.
        if key == 0 || key >= 1000 {
            return Err(SchedulerError::InvalidConfig(desired_retention));
        }
        if let Some(model) = self.models.read().get(&key) {
            return Ok(*model);
        }
        let model = IntervalModel::new(key);
        self.models.write().entry(key).or_insert(model);
        debug!(retention = model.desired_retention, "interval model cached");
        Ok(model)
    }

    fn interval_for(&self, model: &IntervalModel, stability: f64, rating: Rating) -> u32 {
        let minimum = if rating == Rating::Again { 0.0 } else { 1.0 };
        let maximum = f64::from(self.config.maximum_interval_days.max(1));
        model.days(stability).round().clamp(minimum, maximum) as u32
    }
}

fn elapsed_days(last: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - last).num_seconds() as f64;
    (seconds / 86_400.0).max(0.0)
}
