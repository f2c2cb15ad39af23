//! Command-line front end for the interactions tracker.
//!
//! Every invocation loads the latest snapshot, applies one action, flushes the
//! pending save and prints the resulting state.

use anyhow::Context;
use clap::{Parser, Subcommand};
use interactions_lib::{
    init_tracing, open_sqlite_tracker, vocabulary, AppError, CommitOutcome, EventKind, Link, TrackerCore,
    TrackerView,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Track links, log how each interaction felt, and watch the stability score.
#[derive(Parser)]
#[command(name = "interactions")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the snapshot database and logs.
    #[arg(long, global = true, env = "INTERACTIONS_DATA_DIR", default_value = ".interactions")]
    data_dir: PathBuf,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stability score and all links.
    Show,

    /// Add a new link.
    Add {
        /// Display name of the link.
        name: String,
    },

    /// Remove a link and its entire history.
    Remove {
        /// Position of the link as listed by `show`.
        index: usize,

        /// Confirm the irreversible deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Show the event history of one link.
    Detail {
        index: usize,
    },

    /// Log an event against a link.
    Log {
        index: usize,

        /// positive or negative (also + / -).
        kind: EventKind,

        /// Emotion label.
        #[arg(short, long)]
        emotion: String,

        /// Habit label.
        #[arg(short = 'H', long)]
        habit: String,
    },

    /// List the emotion and habit labels offered for each kind.
    Vocabulary {
        kind: Option<EventKind>,
    },

    /// Print settings, or merge a JSON object into them.
    Settings {
        /// JSON object, e.g. '{"autosaveDelayMs": 1000}'.
        #[arg(long)]
        set: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(error) = init_tracing(&cli.data_dir, cli.verbose) {
        eprintln!("warning: file logging disabled: {error}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let (tracker, db) = open_sqlite_tracker(&cli.data_dir)
        .with_context(|| format!("failed to open tracker in {}", cli.data_dir.display()))?;
    tracker.start();
    tracker.bootstrap().await;

    let mutating = matches!(
        cli.command,
        Commands::Add { .. } | Commands::Remove { .. } | Commands::Log { .. }
    );
    let outcome = match cli.command {
        Commands::Show => {
            print_view(&tracker.view(), cli.json)?;
            Ok(())
        }
        Commands::Add { name } => tracker.add_link(&name).map(|_| ()),
        Commands::Remove { index, yes } => {
            if !yes {
                eprintln!("refusing to remove link {index} without --yes (its history is deleted for good)");
                return Ok(ExitCode::from(2));
            }
            tracker.remove_link(index).map(|_| ())
        }
        Commands::Detail { index } => match tracker.link(index) {
            Some(link) => {
                print_link(&link, cli.json)?;
                Ok(())
            }
            None => Err(AppError::ValidationRejected(format!("no link at index {index}"))),
        },
        Commands::Log {
            index,
            kind,
            emotion,
            habit,
        } => log_through_registration(&tracker, index, kind, &emotion, &habit),
        Commands::Vocabulary { kind } => {
            let kinds = match kind {
                Some(kind) => vec![kind],
                None => vec![EventKind::Positive, EventKind::Negative],
            };
            for kind in kinds {
                let entry = vocabulary(kind);
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(entry)?);
                } else {
                    println!("{kind}");
                    println!("  emotions: {}", entry.emotions.join(", "));
                    println!("  habits:   {}", entry.habits.join(", "));
                }
            }
            Ok(())
        }
        Commands::Settings { set } => {
            let settings = match set {
                Some(raw) => db.update_settings_from_str(&raw),
                None => db.get_settings(),
            };
            match settings {
                Ok(settings) => {
                    tracker.apply_settings(settings.clone());
                    println!("{}", serde_json::to_string_pretty(&settings)?);
                    Ok(())
                }
                Err(error) => Err(error),
            }
        }
    };

    let code = match outcome {
        Ok(()) => {
            if mutating {
                print_view(&tracker.view(), cli.json)?;
            }
            ExitCode::SUCCESS
        }
        Err(error) if error.is_validation() => {
            eprintln!("rejected: {error}");
            ExitCode::from(2)
        }
        Err(error) => return Err(error.into()),
    };

    if tracker.view().save_pending && !tracker.flush().await {
        eprintln!("warning: could not save the latest changes (see logs)");
    }
    tracker.shutdown();
    Ok(code)
}

fn log_through_registration(
    tracker: &Arc<TrackerCore>,
    index: usize,
    kind: EventKind,
    emotion: &str,
    habit: &str,
) -> Result<(), AppError> {
    tracker.open_registration(index, kind)?;
    let picked = tracker
        .choose_emotion(emotion)
        .and_then(|()| tracker.choose_habit(habit));
    if let Err(error) = picked {
        tracker.cancel_registration();
        return Err(error);
    }
    match tracker.commit_registration() {
        Ok(CommitOutcome::Committed(_)) => Ok(()),
        Ok(_) => {
            tracker.cancel_registration();
            Err(AppError::ValidationRejected("emotion and habit are both required".to_string()))
        }
        Err(error) => {
            tracker.cancel_registration();
            Err(error)
        }
    }
}

fn print_view(view: &TrackerView, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    let score = view.stability_score.value();
    let filled = usize::from(score) / 5;
    println!("ESTABILIDAD {}", view.stability_score);
    println!("[{}{}]", "#".repeat(filled), ".".repeat(20 - filled));
    if view.links.is_empty() {
        println!("(no links yet; add one with `interactions add <name>`)");
    }
    for link in &view.links {
        println!(
            "{:>3}  {:<24} {:>3} events (+{} / -{})",
            link.index, link.name, link.event_count, link.positive_count, link.negative_count
        );
    }
    Ok(())
}

fn print_link(link: &Link, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(link)?);
        return Ok(());
    }

    println!("{}", link.name());
    if link.history().is_empty() {
        println!("  (no events)");
        return Ok(());
    }
    let dots: String = link
        .history()
        .iter()
        .map(|event| match event.kind() {
            EventKind::Positive => '+',
            EventKind::Negative => '-',
        })
        .collect();
    println!("  {dots}");
    for event in link.history() {
        println!(
            "  {}  {:<8} {:<12} {}",
            event.occurred_at().format("%Y-%m-%d %H:%M"),
            event.kind(),
            event.emotion(),
            event.habit()
        );
    }
    Ok(())
}
