use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kordrill::scheduler::{DEFAULT_RETENTION, Scheduler, SchedulerConfig};
use kordrill::{DifficultyLevel, Direction, DrillKind, Rating, ReviewRow, review, row};

#[derive(Parser)]
#[command(name = "kordrill", version, about = "Spaced-repetition driller for Korean study decks")]
struct Cli {
    /// Target recall probability used to size intervals
    #[arg(
        long,
        short,
        global = true,
        env = "KORDRILL_RETENTION",
        default_value_t = DEFAULT_RETENTION
    )]
    retention: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Review due items in the terminal
    Drill {
        /// Deck files or directories containing them
        #[arg(required = true)]
        paths: Vec<String>,
        /// Only review one drill type
        #[arg(long)]
        drill: Option<DrillKind>,
    },
    /// Show the interval each rating would give a brand-new item
    Preview,
    /// Append a new item to a deck file
    Add {
        file: PathBuf,
        front: String,
        back: String,
        #[arg(long, default_value = "vocabulary")]
        drill: DrillKind,
        #[arg(long, default_value = "kr_vn")]
        direction: Direction,
        /// Self-rated difficulty (very_easy, easy, medium, hard)
        #[arg(long)]
        level: Option<DifficultyLevel>,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = SchedulerConfig::default().with_retention(cli.retention);
    let scheduler = match Scheduler::new(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Drill { paths, drill: kind } => drill(&scheduler, &paths, kind),
        Command::Preview => preview(&scheduler),
        Command::Add {
            file,
            front,
            back,
            drill,
            direction,
            level,
        } => add(&scheduler, file, front, back, drill, direction, level),
    }
}

fn preview(scheduler: &Scheduler) {
    let retention = scheduler.desired_retention();
    match scheduler.preview_all(retention) {
        Ok(previews) => {
            println!("New item, desired retention {retention}:");
            for (rating, days) in previews {
                println!("  {} ({}): {}", u8::from(rating), rating.label(), format_days(days));
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn add(
    scheduler: &Scheduler,
    file: PathBuf,
    front: String,
    back: String,
    drill: DrillKind,
    direction: Direction,
    level: Option<DifficultyLevel>,
) {
    let now = Utc::now();
    let mut rows = if file.exists() {
        row::load_csv(&file, now).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        })
    } else {
        Vec::new()
    };

    let state = match level {
        Some(level) => scheduler.create_from_difficulty(level, now),
        None => scheduler.create_initial(now),
    };
    let new_row = ReviewRow::new(drill, front, back, direction, &state).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    println!("Added {} ({}), next review {}", new_row.id, drill, new_row.next_review.date_naive());
    rows.push(new_row);

    if let Err(e) = row::save_csv(&file, &rows) {
        eprintln!("Error saving {}: {e}", file.display());
        std::process::exit(1);
    }
}

fn drill(scheduler: &Scheduler, args: &[String], kind: Option<DrillKind>) {
    let files = row::discover_files(args);
    if files.is_empty() {
        eprintln!("No CSV files found.");
        std::process::exit(1);
    }

    let now = Utc::now();

    // Load all rows, tracking source file per row
    let mut all_rows: Vec<ReviewRow> = Vec::new();
    let mut row_source: Vec<PathBuf> = Vec::new();

    for file in &files {
        match row::load_csv(file, now) {
            Ok(rows) => {
                for r in rows {
                    row_source.push(file.clone());
                    all_rows.push(r);
                }
            }
            Err(e) => {
                warn!("skipping {}: {e}", file.display());
            }
        }
    }

    if all_rows.is_empty() {
        eprintln!("No items found.");
        std::process::exit(1);
    }

    println!("Drills:");
    for s in review::drill_summaries(&all_rows, now) {
        println!(
            "  {}: {} due / {} total ({} starred)",
            s.drill, s.due, s.total, s.starred
        );
    }
    println!();

    let due = review::filter_due(&all_rows, now, kind);
    if due.is_empty() {
        println!("No items due for review.");
        return;
    }
    println!("{} items due for review.\n", due.len());

    let items = review::build_review_items(&all_rows, &due);
    let retention = scheduler.desired_retention();

    let mut counts = [0u32; 4]; // again, hard, good, easy
    let stdin = io::stdin();
    let mut stdin = stdin.lock();

    for (i, item) in items.iter().enumerate() {
        println!("[{}/{}] {}", i + 1, items.len(), item.drill);
        println!();
        println!("{}", item.prompt);
        println!();

        print!("Press Enter to reveal...");
        let mut buf = String::new();
        if io::stdout().flush().is_err() || stdin.read_line(&mut buf).unwrap_or(0) == 0 {
            break;
        }

        println!("{}", item.answer);
        println!();
        print_hints(scheduler, &all_rows[item.row_index], retention);

        let rating = loop {
            print!("Rate (1=again, 2=hard, 3=good, 4=easy): ");
            buf.clear();
            if io::stdout().flush().is_err() || stdin.read_line(&mut buf).unwrap_or(0) == 0 {
                break None;
            }
            if let Ok(n) = buf.trim().parse::<u8>()
                && let Some(r) = Rating::from_u8(n)
            {
                break Some(r);
            }
            println!("Please enter 1, 2, 3, or 4.");
        };
        let Some(rating) = rating else {
            break;
        };

        counts[usize::from(u8::from(rating)) - 1] += 1;

        let target = &mut all_rows[item.row_index];
        match review::apply_rating(target, scheduler, rating, Utc::now(), retention) {
            Ok(state) => println!(
                "Next review in {}.",
                format_days(state.current_interval_days)
            ),
            Err(e) => warn!("could not reschedule {}: {e}", target.id),
        }
        println!();
    }

    // Save all rows back to their source files
    let mut files_to_save: HashMap<PathBuf, Vec<usize>> = HashMap::new();
    for (i, source) in row_source.iter().enumerate() {
        files_to_save.entry(source.clone()).or_default().push(i);
    }

    for (path, indices) in &files_to_save {
        let file_rows: Vec<ReviewRow> = indices.iter().map(|&i| all_rows[i].clone()).collect();
        if let Err(e) = row::save_csv(path, &file_rows) {
            eprintln!("Error saving {}: {e}", path.display());
        }
    }
    info!(files = files_to_save.len(), "decks saved");

    println!("Session complete!");
    println!(
        "  Again: {}, Hard: {}, Good: {}, Easy: {}",
        counts[0], counts[1], counts[2], counts[3]
    );
}

fn print_hints(scheduler: &Scheduler, row: &ReviewRow, retention: f64) {
    let Ok(state) = row.to_state() else {
        return;
    };
    let now = Utc::now();
    let hints: Vec<String> = Rating::ALL
        .iter()
        .filter_map(|&r| {
            let next = scheduler.apply(&state, r, now, retention).ok()?;
            Some(format!("{}={}", r.label(), format_days(next.current_interval_days)))
        })
        .collect();
    println!("({})", hints.join(", "));
}

fn format_days(days: u32) -> String {
    match days {
        0 => "later today".to_string(),
        1 => "1 day".to_string(),
        n => format!("{n} days"),
    }
}
