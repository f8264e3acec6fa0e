// FSRS (Free Spaced Repetition Scheduler) memory model.
// Power-law forgetting curve with the FSRS-5 update formulas; the weights are
// a swappable `Parameters` table.

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

type R = f64;
type S = f64;
type D = f64;
type T = f64;

/// Forgetting curve exponent.
pub const DECAY: f64 = -0.5;
/// `0.9^(1/DECAY) - 1`, so that retrievability is exactly 0.9 when the
/// elapsed time equals the stability.
pub const FACTOR: f64 = 19.0 / 81.0;

pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;
pub const MIN_STABILITY: f64 = 0.01;
pub const MAX_STABILITY: f64 = 36500.0;

/// Published FSRS-5 default weights.
pub const FSRS5_WEIGHTS: [f64; 19] = [
    0.40255, 1.18385, 3.173, 15.69105, 7.1949, 0.5345, 1.4604, 0.0046, 1.54575, 0.1192, 1.01925,
    1.9395, 0.11, 0.29605, 2.2698, 0.2315, 2.9898, 0.51655, 0.6621,
];

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn from_u8(n: u8) -> Option<Rating> {
        match n {
            1 => Some(Rating::Again),
            2 => Some(Rating::Hard),
            3 => Some(Rating::Good),
            4 => Some(Rating::Easy),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = SchedulerError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Rating::from_u8(n).ok_or(SchedulerError::InvalidRating(n))
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> u8 {
        match r {
            Rating::Again => 1,
            Rating::Hard => 2,
            Rating::Good => 3,
            Rating::Easy => 4,
        }
    }
}

impl From<Rating> for f64 {
    fn from(r: Rating) -> f64 {
        f64::from(u8::from(r))
    }
}

/// Calibration weights for the update formulas.
///
/// Any FSRS-family weight set with the same layout can be substituted; the
/// structural guarantees (difficulty bounds, non-decreasing stability on
/// recall, non-increasing stability on a lapse) come from the formulas, not
/// from particular values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub w: [f64; 19],
}

impl Default for Parameters {
    fn default() -> Self {
        Self { w: FSRS5_WEIGHTS }
    }
}

/// Stability and difficulty of one item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemoryState {
    pub stability: f64,
    pub difficulty: f64,
}

/// Probability of recall after `t` days for an item with stability `s`.
pub fn retrievability(t: T, s: S) -> R {
    if s <= 0.0 {
        return 0.0;
    }
    let t = t.max(0.0);
    (1.0 + FACTOR * (t / s)).powf(DECAY).clamp(0.0, 1.0)
}

/// Elapsed days at which retrievability falls to `desired_retention`.
pub fn interval_days(s: S, desired_retention: f64) -> T {
    (s / FACTOR) * interval_factor(desired_retention)
}

/// Stability-independent part of [`interval_days`].
pub fn interval_factor(desired_retention: f64) -> f64 {
    desired_retention.powf(1.0 / DECAY) - 1.0
}

fn clamp_d(d: D) -> D {
    d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

impl Parameters {
    pub fn init_stability(&self, r: Rating) -> S {
        let w = &self.w;
        let s = match r {
            Rating::Again => w[0],
            Rating::Hard => w[1],
            Rating::Good => w[2],
            Rating::Easy => w[3],
        };
        s.max(MIN_STABILITY)
    }

    pub fn init_difficulty(&self, r: Rating) -> D {
        let g: f64 = r.into();
        clamp_d(self.w[4] - f64::exp(self.w[5] * (g - 1.0)) + 1.0)
    }

    fn delta_d(&self, r: Rating) -> f64 {
        let g: f64 = r.into();
        -self.w[6] * (g - 3.0)
    }

    // Linear damping: steps shrink as difficulty approaches 10.
    fn damped(&self, d: D, r: Rating) -> f64 {
        d + self.delta_d(r) * ((10.0 - d) / 9.0)
    }

    /// Difficulty after rating `r`, mean-reverted toward the initial "Easy"
    /// difficulty and clamped to [1, 10].
    pub fn next_difficulty(&self, d: D, r: Rating) -> D {
        let w7 = self.w[7];
        clamp_d(w7 * self.init_difficulty(Rating::Easy) + (1.0 - w7) * self.damped(clamp_d(d), r))
    }

    /// Stability after a successful recall. Never below `s`.
    pub fn recall_stability(&self, d: D, s: S, r: R, rating: Rating) -> S {
        let w = &self.w;
        let t_d = 11.0 - clamp_d(d);
        let t_s = s.powf(-w[9]);
        let t_r = f64::exp(w[10] * (1.0 - r)) - 1.0;
        let h = if rating == Rating::Hard { w[15] } else { 1.0 };
        let b = if rating == Rating::Easy { w[16] } else { 1.0 };
        let c = f64::exp(w[8]);
        let alpha = 1.0 + t_d * t_s * t_r.max(0.0) * h * b * c;
        f64::min(s * alpha, MAX_STABILITY.max(s)).max(s)
    }

    /// Stability after a lapse. Strictly below `s` unless already at the floor;
    /// a stability already under the floor is never raised back up to it.
    pub fn forget_stability(&self, d: D, s: S, r: R) -> S {
        let w = &self.w;
        let d_f = clamp_d(d).powf(-w[12]);
        let s_f = (s + 1.0).powf(w[13]) - 1.0;
        let r_f = f64::exp(w[14] * (1.0 - r));
        let c_f = w[11];
        let long_term = d_f * s_f * r_f * c_f;
        // Short-term ceiling: a lapse always costs at least this much.
        let short_term = s / f64::exp(w[17] * w[18]).max(1.0 + f64::EPSILON);
        f64::min(long_term, short_term).max(MIN_STABILITY.min(s))
    }

    fn stability(&self, d: D, s: S, r: R, rating: Rating) -> S {
        if rating == Rating::Again {
            self.forget_stability(d, s, r)
        } else {
            self.recall_stability(d, s, r, rating)
        }
    }

    /// Seed state for the first ever rating of an item.
    pub fn init_state(&self, rating: Rating) -> MemoryState {
        MemoryState {
            stability: self.init_stability(rating),
            difficulty: self.init_difficulty(rating),
        }
    }

    /// State after rating an item that already has a memory trace, given the
    /// retrievability at the moment of review.
    pub fn next_state(&self, prev: MemoryState, r: R, rating: Rating) -> MemoryState {
        MemoryState {
            stability: self.stability(prev.difficulty, prev.stability, r, rating),
            difficulty: self.next_difficulty(prev.difficulty, rating),
        }
    }
}
