use chrono::{DateTime, Utc};
use tracing::debug;

use crate::fsrs::Rating;
use crate::row::{Direction, DrillKind, ReviewRow};
use crate::scheduler::Scheduler;
use crate::state::ReviewState;

pub struct ReviewItem {
    pub row_index: usize,
    pub prompt: String,
    pub answer: String,
    pub drill: DrillKind,
}

pub struct DrillSummary {
    pub drill: DrillKind,
    pub total: usize,
    pub due: usize,
    pub starred: usize,
}

pub fn prompt_and_answer(row: &ReviewRow) -> (String, String) {
    match row.direction {
        Direction::KrVn => (row.front.clone(), row.back.clone()),
        Direction::VnKr => (row.back.clone(), row.front.clone()),
    }
}

pub fn build_review_items(rows: &[ReviewRow], indices: &[usize]) -> Vec<ReviewItem> {
    indices
        .iter()
        .map(|&i| {
            let row = &rows[i];
            let (prompt, answer) = prompt_and_answer(row);
            ReviewItem {
                row_index: i,
                prompt,
                answer,
                drill: row.drill,
            }
        })
        .collect()
}

fn is_due(row: &ReviewRow, now: DateTime<Utc>) -> bool {
    row.last_review.is_none() || row.next_review <= now
}

/// Indices of rows due at `now`, optionally limited to one drill, oldest
/// due date first.
pub fn filter_due(rows: &[ReviewRow], now: DateTime<Utc>, drill: Option<DrillKind>) -> Vec<usize> {
    let mut due: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| drill.is_none_or(|d| row.drill == d))
        .filter(|(_, row)| is_due(row, now))
        .map(|(i, _)| i)
        .collect();
    due.sort_by_key(|&i| rows[i].next_review);
    due
}

pub fn drill_summaries(rows: &[ReviewRow], now: DateTime<Utc>) -> Vec<DrillSummary> {
    let mut drills: std::collections::BTreeMap<DrillKind, (usize, usize, usize)> =
        std::collections::BTreeMap::new();
    for row in rows {
        let entry = drills.entry(row.drill).or_insert((0, 0, 0));
        entry.0 += 1;
        if is_due(row, now) {
            entry.1 += 1;
        }
        if row.starred {
            entry.2 += 1;
        }
    }
    drills
        .into_iter()
        .map(|(drill, (total, due, starred))| DrillSummary {
            drill,
            total,
            due,
            starred,
        })
        .collect()
}

/// Runs `rating` through the scheduler and writes the result back to `row`.
pub fn apply_rating(
    row: &mut ReviewRow,
    scheduler: &Scheduler,
    rating: Rating,
    now: DateTime<Utc>,
    desired_retention: f64,
) -> crate::row::Result<ReviewState> {
    let state = row.to_state()?;
    let next = scheduler.apply(&state, rating, now, desired_retention)?;
    row.store_state(&next)?;
    debug!(id = %row.id, drill = %row.drill, due = %row.next_review, "row rescheduled");
    Ok(next)
}
