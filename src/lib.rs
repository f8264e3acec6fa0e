//! Spaced-repetition scheduling for Korean drill items.
//!
//! The [`scheduler::Scheduler`] turns a self-rating into a new
//! [`state::ReviewState`]; it never touches storage. [`row`] maps the flat
//! rows every drill type stores to and from that state, and [`review`] holds
//! the session helpers used by the `kordrill` command-line driller.

pub mod error;
pub mod fsrs;
pub mod review;
pub mod row;
pub mod scheduler;
pub mod state;

pub use error::{RowError, SchedulerError};
pub use fsrs::{Parameters, Rating};
pub use row::{Direction, DrillKind, ReviewRow};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use state::{DifficultyLevel, HistoryEntry, Phase, ReviewState};
