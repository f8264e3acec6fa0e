//! Storage-row adapter shared by every drill type, plus the CSV deck files
//! the command-line driller reads and writes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RowError;
use crate::state::{HistoryEntry, ReviewState};

pub type Result<T> = std::result::Result<T, RowError>;

const HEADER: [&str; 13] = [
    "id",
    "drill",
    "front",
    "back",
    "direction",
    "starred",
    "stability",
    "difficulty",
    "lapses",
    "interval",
    "next_review",
    "last_review",
    "history",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillKind {
    Vocabulary,
    Translation,
    Listening,
    Shadowing,
}

impl DrillKind {
    pub const ALL: [DrillKind; 4] = [
        DrillKind::Vocabulary,
        DrillKind::Translation,
        DrillKind::Listening,
        DrillKind::Shadowing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DrillKind::Vocabulary => "vocabulary",
            DrillKind::Translation => "translation",
            DrillKind::Listening => "listening",
            DrillKind::Shadowing => "shadowing",
        }
    }
}

impl fmt::Display for DrillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrillKind {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self> {
        DrillKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| RowError::UnknownDrill(s.to_string()))
    }
}

/// Which side of the card is shown first. Not interpreted by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    KrVn,
    VnKr,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::KrVn => "kr_vn",
            Direction::VnKr => "vn_kr",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "kr_vn" => Ok(Direction::KrVn),
            "vn_kr" => Ok(Direction::VnKr),
            other => Err(RowError::UnknownDirection(other.to_string())),
        }
    }
}

/// A drill item as stored: flat scheduling columns, JSON-encoded history and
/// caller-owned metadata (direction, star).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRow {
    pub id: String,
    pub drill: DrillKind,
    pub front: String,
    pub back: String,
    pub direction: Direction,
    pub starred: bool,
    pub stability: f64,
    pub difficulty: f64,
    pub lapses: u32,
    pub interval_days: u32,
    pub next_review: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
    pub history: String,
}

impl ReviewRow {
    pub fn new(
        drill: DrillKind,
        front: impl Into<String>,
        back: impl Into<String>,
        direction: Direction,
        state: &ReviewState,
    ) -> Result<Self> {
        let mut row = ReviewRow {
            id: uuid::Uuid::new_v4().to_string(),
            drill,
            front: front.into(),
            back: back.into(),
            direction,
            starred: false,
            stability: 0.0,
            difficulty: 0.0,
            lapses: 0,
            interval_days: 0,
            next_review: state.next_review_date,
            last_review: None,
            history: String::new(),
        };
        row.store_state(state)?;
        Ok(row)
    }

    /// Rejects rows whose memory columns could not have come from the
    /// scheduler: a non-finite or negative stability, or a non-finite difficulty.
    pub fn to_state(&self) -> Result<ReviewState> {
        check_measure("stability", self.stability, 0.0)?;
        check_measure("difficulty", self.difficulty, f64::NEG_INFINITY)?;
        Ok(ReviewState {
            stability: self.stability,
            difficulty: self.difficulty,
            lapses: self.lapses,
            current_interval_days: self.interval_days,
            next_review_date: self.next_review,
            last_review_date: self.last_review,
            review_history: parse_history(&self.history)?,
        })
    }

    /// Overwrites every scheduling column from `state`; metadata is untouched.
    pub fn store_state(&mut self, state: &ReviewState) -> Result<()> {
        self.history = encode_history(&state.review_history)?;
        self.stability = state.stability;
        self.difficulty = state.difficulty;
        self.lapses = state.lapses;
        self.interval_days = state.current_interval_days;
        self.next_review = state.next_review_date;
        self.last_review = state.last_review_date;
        Ok(())
    }
}

/// Empty text and JSON `null` both mean "no history yet".
pub fn parse_history(text: &str) -> Result<Vec<HistoryEntry>> {
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(text)?)
}

pub fn encode_history(history: &[HistoryEntry]) -> Result<String> {
    Ok(serde_json::to_string(history)?)
}

fn parse_number<T: FromStr>(column: &'static str, s: &str, default: T) -> Result<T> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(default);
    }
    s.parse().map_err(|_| RowError::InvalidField {
        column,
        value: s.to_string(),
    })
}

fn check_measure(column: &'static str, value: f64, min: f64) -> Result<f64> {
    if value.is_finite() && value >= min {
        Ok(value)
    } else {
        Err(RowError::InvalidField {
            column,
            value: value.to_string(),
        })
    }
}

fn parse_measure(column: &'static str, s: &str, default: f64, min: f64) -> Result<f64> {
    check_measure(column, parse_number(column, s, default)?, min)
}

fn parse_optional_time(column: &'static str, s: &str) -> Result<Option<DateTime<Utc>>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|_| RowError::InvalidField {
            column,
            value: s.to_string(),
        })
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.trim() {
        "" | "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        other => Err(RowError::InvalidField {
            column: "starred",
            value: other.to_string(),
        }),
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn get_field(record: &csv::StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or("")
}

/// Loads a deck file. Blank scheduling columns describe a never-reviewed
/// item that is due at `now`; a blank drill column falls back to the file
/// name, then to vocabulary.
pub fn load_csv(path: &Path, now: DateTime<Utc>) -> Result<Vec<ReviewRow>> {
    let default_drill = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(DrillKind::Vocabulary);

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;

        let id = match get_field(&record, 0).trim() {
            "" => uuid::Uuid::new_v4().to_string(),
            id => id.to_string(),
        };
        let drill = match get_field(&record, 1).trim() {
            "" => default_drill,
            s => s.parse()?,
        };
        let direction = match get_field(&record, 4).trim() {
            "" => Direction::default(),
            s => s.parse()?,
        };

        rows.push(ReviewRow {
            id,
            drill,
            front: get_field(&record, 2).to_string(),
            back: get_field(&record, 3).to_string(),
            direction,
            starred: parse_bool(get_field(&record, 5))?,
            stability: parse_measure("stability", get_field(&record, 6), 0.0, 0.0)?,
            difficulty: parse_measure(
                "difficulty",
                get_field(&record, 7),
                5.0,
                f64::NEG_INFINITY,
            )?,
            lapses: parse_number("lapses", get_field(&record, 8), 0)?,
            interval_days: parse_number("interval", get_field(&record, 9), 1)?,
            next_review: parse_optional_time("next_review", get_field(&record, 10))?
                .unwrap_or(now),
            last_review: parse_optional_time("last_review", get_field(&record, 11))?,
            history: get_field(&record, 12).to_string(),
        });
    }
    Ok(rows)
}

pub fn save_csv(path: &Path, rows: &[ReviewRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADER)?;

    for row in rows {
        writer.write_record([
            row.id.clone(),
            row.drill.to_string(),
            row.front.clone(),
            row.back.clone(),
            row.direction.to_string(),
            row.starred.to_string(),
            row.stability.to_string(),
            row.difficulty.to_string(),
            row.lapses.to_string(),
            row.interval_days.to_string(),
            format_time(row.next_review),
            row.last_review.map_or(String::new(), format_time),
            row.history.clone(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Deck files named by `paths`, walking directories. Sorted and deduplicated
/// so a session visits decks in the same order every run.
pub fn discover_files(paths: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths.iter().map(PathBuf::from) {
        if path.is_dir() {
            walk_decks(&path, &mut files);
        } else if is_deck(&path) {
            files.push(path);
        }
    }
    files.sort();
    files.dedup();
    files
}

fn is_deck(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "csv")
}

fn walk_decks(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot read {}: {e}", dir.display());
            return;
        }
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            walk_decks(&path, files);
        } else if is_deck(&path) {
            files.push(path);
        }
    }
}
