//! placematch CLI - Debug tool for place detection and category learning
//!
//! Usage:
//!   placematch-cli detect <samples.json> [--config <cfg.json>] [--strategy <name>]
//!   placematch-cli learn <corrections.json> [--preferences <prefs.json>]
//!
//! Samples, corrections and preferences are JSON arrays in the same shape the
//! library serializes them. Detection runs against an in-memory store and
//! prints every place, visit and decision.

use clap::{Parser, Subcommand, ValueEnum};
use placematch::{
    AutoAcceptStrategy, CategoryLearner, CategoryPreference, DetectionConfig, DetectionReport,
    InMemoryCorrectionQueue, InMemoryPlaceStore, InMemoryPreferenceStore, LocationSample,
    PlaceDetector, PreferenceStore, UserCorrection,
};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "placematch-cli")]
#[command(about = "Debug tool for place detection and category learning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Never,
    HighConfidence,
    AfterVisits,
    Always,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect places from a batch of location samples
    Detect {
        /// JSON file containing an array of samples
        samples: PathBuf,

        /// JSON detection config; missing fields use defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the auto-accept strategy
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Confidence threshold for the high-confidence strategy
        #[arg(long, default_value = "0.7")]
        threshold: f64,

        /// Visit count for the after-visits strategy
        #[arg(long, default_value = "3")]
        visits: u32,

        /// Assign scored categories to new places
        #[arg(long)]
        categorize: bool,

        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay user corrections into category preferences
    Learn {
        /// JSON file containing an array of corrections
        corrections: PathBuf,

        /// JSON file of previously learned preferences to start from
        #[arg(short, long)]
        preferences: Option<PathBuf>,

        /// Write the resulting preferences as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let result = match cli.command {
        Commands::Detect {
            samples,
            config,
            strategy,
            threshold,
            visits,
            categorize,
            output,
        } => run_detect(
            &samples,
            config.as_deref(),
            strategy.map(|s| to_strategy(s, threshold, visits)),
            categorize,
            output.as_deref(),
            cli.verbose,
        ),
        Commands::Learn {
            corrections,
            preferences,
            output,
        } => run_learn(&corrections, preferences.as_deref(), output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn to_strategy(arg: StrategyArg, threshold: f64, visits: u32) -> AutoAcceptStrategy {
    match arg {
        StrategyArg::Never => AutoAcceptStrategy::Never,
        StrategyArg::HighConfidence => AutoAcceptStrategy::HighConfidenceOnly { threshold },
        StrategyArg::AfterVisits => AutoAcceptStrategy::AfterNVisits { visits },
        StrategyArg::Always => AutoAcceptStrategy::Always,
    }
}

/// Read a JSON document from a file
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Write a value as pretty JSON
fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let file = File::create(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())?;
    println!("\nWrote {}", path.display());
    Ok(())
}

fn banner(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
}

/// Run place detection
fn run_detect(
    samples_path: &Path,
    config_path: Option<&Path>,
    strategy: Option<AutoAcceptStrategy>,
    categorize: bool,
    output: Option<&Path>,
    verbose: bool,
) -> Result<(), String> {
    banner(&format!("Loading samples from: {}", samples_path.display()));
    let samples: Vec<LocationSample> = read_json(samples_path)?;
    println!("Loaded {} samples", samples.len());

    let mut config: DetectionConfig = match config_path {
        Some(path) => read_json(path)?,
        None => DetectionConfig::default(),
    };
    if let Some(strategy) = strategy {
        config.auto_accept.strategy = strategy;
    }
    if categorize {
        config.auto_categorization_enabled = true;
    }
    println!(
        "Strategy: {}, auto-categorization: {}",
        config.auto_accept.strategy.as_str(),
        config.auto_categorization_enabled
    );

    let detector = PlaceDetector::new(
        config,
        Arc::new(InMemoryPlaceStore::new()),
        Arc::new(CategoryLearner::new()),
    );

    banner("PLACE DETECTION");
    let report = detector.detect(&samples).map_err(|e| e.to_string())?;
    print_report(&report, verbose);

    if let Some(path) = output {
        write_json(path, &report)?;
    }
    Ok(())
}

fn print_report(report: &DetectionReport, verbose: bool) {
    let stats = &report.stats;
    println!(
        "\n[Filter] {} in, {} capped, {} kept",
        stats.samples_in, stats.samples_capped, stats.samples_kept
    );
    println!(
        "[Cluster] {} clusters, {} noise samples, {} dropped by cap",
        stats.clusters, stats.noise_samples, stats.cluster_cap_dropped
    );

    println!("\n[Places] {} new", report.new_places.len());
    for detected in &report.new_places {
        let place = &detected.place;
        println!(
            "  {} '{}' ({}) at [{:.5}, {:.5}] r={:.0}m confidence={:.2} visits={}{}",
            place.id,
            place.name,
            place.category,
            place.latitude,
            place.longitude,
            place.radius,
            place.confidence,
            place.visit_count,
            if detected.is_fallback { " [fallback]" } else { "" }
        );
        println!("    decision: {:?}", detected.decision);
        if verbose {
            for visit in &detected.visits {
                println!(
                    "    visit {} -> {}",
                    visit.entry_time,
                    visit
                        .exit_time
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "open".to_string())
                );
            }
        }
    }

    if !report.updated_places.is_empty() {
        println!("\n[Places] {} updated", report.updated_places.len());
        for update in &report.updated_places {
            println!(
                "  {} '{}' +{} visits{}",
                update.place.id,
                update.place.name,
                update.new_visits.len(),
                if update.recategorized {
                    format!(", now {}", update.place.category)
                } else {
                    String::new()
                }
            );
        }
    }

    println!(
        "\nSummary: {} new ({} accepted), {} updated, {} duplicates, {} rejected, {} failed",
        stats.new_places,
        report.accepted().count(),
        stats.updated_places,
        stats.duplicates,
        stats.rejected,
        stats.failed_writes
    );
}

/// Replay corrections into a learner
fn run_learn(
    corrections_path: &Path,
    preferences_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), String> {
    banner(&format!(
        "Loading corrections from: {}",
        corrections_path.display()
    ));
    let corrections: Vec<UserCorrection> = read_json(corrections_path)?;
    println!("Loaded {} corrections", corrections.len());

    let store = Arc::new(InMemoryPreferenceStore::new());
    if let Some(path) = preferences_path {
        let existing: Vec<CategoryPreference> = read_json(path)?;
        for pref in &existing {
            store.save(pref).map_err(|e| e.to_string())?;
        }
        println!("Loaded {} existing preferences", existing.len());
    }

    let learner = CategoryLearner::with_store(store).map_err(|e| e.to_string())?;
    let queue = InMemoryCorrectionQueue::from_corrections(corrections);

    banner("CORRECTION REPLAY");
    let summary = learner
        .replay_corrections(&queue)
        .map_err(|e| e.to_string())?;
    println!(
        "\n{} applied, {} skipped, {} failed, {} still pending",
        summary.applied,
        summary.skipped,
        summary.failed,
        queue.pending_count()
    );

    let preferences = learner.preferences();
    println!("\n[Preferences]");
    for pref in &preferences {
        println!(
            "  {:<14} score={:+.3} bonus={:+.3} accepted={} rejected={} corrected={}",
            pref.category.as_str(),
            pref.preference_score,
            pref.bonus(),
            pref.acceptance_count,
            pref.rejection_count,
            pref.correction_count
        );
    }

    if let Some(path) = output {
        write_json(path, &preferences)?;
    }
    Ok(())
}
