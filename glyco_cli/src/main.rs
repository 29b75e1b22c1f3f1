use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use glyco_core::journal::cleanup_processed_journals;
use glyco_core::profile::FileProfileProvider;
use glyco_core::snapshot::{compact, load_store};
use glyco_core::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "glyco")]
#[command(about = "Glucose monitoring and alerting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a manual glucose reading
    Reading {
        /// Value in mg/dL (40-400)
        #[arg(long)]
        value: f64,

        /// Trend (steady, up, down, double_up, double_down)
        #[arg(long, default_value = "steady")]
        trend: Trend,

        #[arg(long)]
        note: Option<String>,
    },

    /// Record a meal
    Meal {
        #[arg(long)]
        description: String,

        /// Carbohydrates in grams
        #[arg(long, requires_all = ["protein", "fat"])]
        carbs: Option<f64>,

        /// Protein in grams
        #[arg(long, requires_all = ["carbs", "fat"])]
        protein: Option<f64>,

        /// Fat in grams
        #[arg(long, requires_all = ["carbs", "protein"])]
        fat: Option<f64>,
    },

    /// Record an insulin dose
    Dose {
        /// basal or bolus
        #[arg(long)]
        kind: DoseKind,

        #[arg(long)]
        units: f64,

        #[arg(long)]
        note: Option<String>,
    },

    /// Show current insulin on board
    Iob,

    /// Summary statistics over a lookback window
    Summary {
        #[arg(long, default_value_t = 1)]
        days: u32,
    },

    /// Show the most recent reading, meal and dose
    Latest,

    /// Backfill simulated readings ending now, one per generator interval
    Simulate {
        #[arg(long, default_value_t = 1)]
        cycles: u32,

        /// Seed the generator for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Generate readings in real time until interrupted (Ctrl-C)
    Watch,

    /// Export all retained readings to CSV
    Export {
        #[arg(long)]
        out: PathBuf,
    },

    /// Fold the journal into the snapshot
    Compact {
        /// Remove archived journals afterwards
        #[arg(long)]
        cleanup: bool,
    },
}

/// On-disk layout under the data directory
struct Paths {
    snapshot: PathBuf,
    journal_dir: PathBuf,
    journal: PathBuf,
    profile: PathBuf,
}

impl Paths {
    fn new(data_dir: &Path) -> Self {
        let journal_dir = data_dir.join("journal");
        Self {
            snapshot: data_dir.join("snapshot.json"),
            journal: journal_dir.join("events.wal"),
            journal_dir,
            profile: data_dir.join("profile.json"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    glyco_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let paths = Paths::new(&data_dir);

    if let Commands::Compact { cleanup } = cli.command {
        return cmd_compact(&paths, &config, cleanup);
    }

    let monitor = Arc::new(open_monitor(&paths, &config)?);
    let result = match cli.command {
        Commands::Reading { value, trend, note } => cmd_reading(&monitor, value, trend, note),
        Commands::Meal {
            description,
            carbs,
            protein,
            fat,
        } => cmd_meal(&monitor, description, carbs, protein, fat),
        Commands::Dose { kind, units, note } => cmd_dose(&monitor, kind, units, note),
        Commands::Iob => cmd_iob(&monitor),
        Commands::Summary { days } => cmd_summary(&monitor, days),
        Commands::Latest => {
            cmd_latest(&monitor);
            Ok(())
        }
        Commands::Simulate { cycles, seed } => cmd_simulate(&monitor, &config, cycles, seed),
        Commands::Watch => cmd_watch(Arc::clone(&monitor), &config).await,
        Commands::Export { out } => cmd_export(&monitor, &out),
        Commands::Compact { .. } => Ok(()),
    };

    // Deliver any queued alerts before exiting
    monitor.dispatcher().close().await;
    result
}

fn open_monitor(paths: &Paths, config: &Config) -> Result<Monitor> {
    let store = load_store(&paths.snapshot, &paths.journal, &config.store)?;
    let profile = FileProfileProvider::new(&paths.profile, config.profile.clone());
    let journal = JsonlJournal::new(&paths.journal);

    Ok(Monitor::new(
        Arc::new(store),
        Arc::new(profile),
        Dispatcher::spawn(Arc::new(LogSink)),
    )
    .with_journal(Arc::new(journal)))
}

fn cmd_reading(monitor: &Monitor, value: f64, trend: Trend, note: Option<String>) -> Result<()> {
    let outcome = monitor.log_manual_reading(ManualReading {
        timestamp: Utc::now(),
        value,
        trend,
        insulin_on_board: None,
        note,
    })?;

    println!("✓ Reading logged: {}", format_reading(&outcome.reading));
    print_verdict(&outcome.verdict);
    Ok(())
}

fn cmd_meal(
    monitor: &Monitor,
    description: String,
    carbs: Option<f64>,
    protein: Option<f64>,
    fat: Option<f64>,
) -> Result<()> {
    let mut meal = MealEvent::new(Utc::now(), description);
    if let (Some(carbs), Some(protein), Some(fat)) = (carbs, protein, fat) {
        meal = meal.with_macros(Macros { carbs, protein, fat });
    }
    let (description, carbs) = (meal.description.clone(), meal.carbs());
    monitor.log_meal(meal)?;

    println!("✓ Meal logged: {} ({:.0} g carbs)", description, carbs);
    Ok(())
}

fn cmd_dose(monitor: &Monitor, kind: DoseKind, units: f64, note: Option<String>) -> Result<()> {
    let mut dose = MedicationDose::new(Utc::now(), kind, units);
    dose.note = note;
    monitor.log_dose(dose)?;

    println!("✓ Dose logged: {:.1} U {}", units, kind);
    Ok(())
}

fn cmd_iob(monitor: &Monitor) -> Result<()> {
    let iob = monitor.current_iob(Utc::now())?;
    println!("Insulin on board: {:.2} U", iob);
    Ok(())
}

fn cmd_summary(monitor: &Monitor, days: u32) -> Result<()> {
    if days == 0 {
        return Err(Error::InvalidInput("--days must be at least 1".into()));
    }
    let summary = monitor.summarize(Duration::days(i64::from(days)), Utc::now());

    println!("Summary (last {} day{})", days, if days == 1 { "" } else { "s" });
    println!("  Readings:          {}", summary.reading_count);
    println!("  Average BGL:       {} mg/dL", summary.avg_bgl);
    println!("  Time in range:     {}%", summary.time_in_range_pct);
    println!("  Time above range:  {}%", summary.time_above_pct);
    println!("  Time below range:  {}%", summary.time_below_pct);
    println!("  Hypo events:       {}", summary.hypo_event_count);
    println!("  Hyper events:      {}", summary.hyper_event_count);
    println!("  Avg carbs/meal:    {:.1} g", summary.avg_carbs_per_meal);
    println!("  Total insulin:     {:.1} U", summary.total_insulin_units);
    Ok(())
}

fn cmd_latest(monitor: &Monitor) {
    let store = monitor.store();

    match store.latest_reading() {
        Some(reading) => println!("Reading: {}", format_reading(&reading)),
        None => println!("Reading: none"),
    }
    match store.latest_meal() {
        Some(meal) => println!(
            "Meal:    {} at {} ({:.0} g carbs)",
            meal.description,
            meal.timestamp.format("%Y-%m-%d %H:%M"),
            meal.carbs()
        ),
        None => println!("Meal:    none"),
    }
    match store.latest_dose() {
        Some(dose) => println!(
            "Dose:    {:.1} U {} at {}",
            dose.units,
            dose.kind,
            dose.timestamp.format("%Y-%m-%d %H:%M")
        ),
        None => println!("Dose:    none"),
    }
}

fn cmd_simulate(monitor: &Monitor, config: &Config, cycles: u32, seed: Option<u64>) -> Result<()> {
    let mut generator_config = config.generator.clone();
    if seed.is_some() {
        generator_config.seed = seed;
    }
    let mut generator = ReadingGenerator::new(&generator_config)?;

    let interval = Duration::minutes(i64::from(generator.interval_minutes()));
    let now = Utc::now();
    let start = now - interval * cycles.saturating_sub(1) as i32;

    // Continue from what was observed before the backfill, not after it
    if let Some(previous) = monitor.store().latest_reading_at(start) {
        generator.overwrite(f64::from(previous.value), previous.trend);
    }

    let mut alerts = 0;
    for i in 0..cycles {
        let at = start + interval * i as i32;
        let outcome = monitor.run_cycle(&mut generator, at)?;
        println!("{}", format_reading(&outcome.reading));
        if outcome.verdict.alert {
            alerts += 1;
            print_verdict(&outcome.verdict);
        }
    }

    println!("✓ Simulated {} readings ({} alerts)", cycles, alerts);
    Ok(())
}

async fn cmd_watch(monitor: Arc<Monitor>, config: &Config) -> Result<()> {
    let mut generator = ReadingGenerator::new(&config.generator)?;
    if let Some(latest) = monitor.store().latest_reading() {
        generator.overwrite(f64::from(latest.value), latest.trend);
    }

    let scheduler = Scheduler::new(monitor, generator);
    scheduler.start();
    println!(
        "Generating a reading every {} minutes. Press Ctrl-C to stop.",
        config.generator.interval_minutes
    );
    if let Some(reading) = scheduler.monitor().store().latest_reading() {
        println!("{}", format_reading(&reading));
    }

    tokio::signal::ctrl_c().await?;
    scheduler.shutdown().await;
    println!("✓ Stopped");
    Ok(())
}

fn cmd_export(monitor: &Monitor, out: &Path) -> Result<()> {
    let readings = monitor.store().snapshot().readings;
    let count = glyco_core::export::export_readings_csv(&readings, out)?;

    println!("✓ Exported {} readings", count);
    println!("  CSV: {}", out.display());
    Ok(())
}

fn cmd_compact(paths: &Paths, config: &Config, cleanup: bool) -> Result<()> {
    if !paths.journal.exists() {
        println!("No journal found - nothing to compact.");
        return Ok(());
    }

    let count = compact(&paths.snapshot, &paths.journal, &config.store)?;
    println!("✓ Compacted {} events into snapshot", count);
    println!("  Snapshot: {}", paths.snapshot.display());

    if cleanup {
        let cleaned = cleanup_processed_journals(&paths.journal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed journal files", cleaned);
        }
    }

    Ok(())
}

fn format_reading(reading: &GlucoseReading) -> String {
    let mut line = format!(
        "{} mg/dL {} at {} (IOB {:.2} U)",
        reading.value,
        reading.trend.arrow(),
        reading.timestamp.format("%Y-%m-%d %H:%M"),
        reading.insulin_on_board
    );
    if let Some(note) = &reading.note {
        line.push_str(&format!(" - {}", note));
    }
    line
}

fn print_verdict(verdict: &AlertVerdict) {
    if verdict.alert {
        println!("⚠ {} ALERT: {}", verdict.severity.to_string().to_uppercase(), verdict.rationale);
    }
}
