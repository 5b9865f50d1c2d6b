use caff_core::*;
use chrono::offset::LocalResult;
use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Days of history to load; old doses decay to nothing well before this
const HISTORY_DAYS: i64 = 3;

#[derive(Parser)]
#[command(name = "sip")]
#[command(about = "Caffeine intake planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Use this data directory instead of the configured one
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a dose by beverage id or raw milligram amount
    Log {
        /// Beverage id (see `sip beverages`) or an amount in mg
        drink: String,

        /// Time of intake (RFC 3339, or HH:MM on today's clock)
        #[arg(long)]
        at: Option<String>,

        /// Free-form note stored with the dose
        #[arg(long)]
        note: Option<String>,
    },

    /// Remove the most recently logged dose
    Undo,

    /// Show current level and today's budget (default)
    Status,

    /// Chart the projected decay curve
    Curve {
        /// Hours ahead to project
        #[arg(long, default_value_t = 12)]
        hours: i64,

        /// Sampling step in minutes
        #[arg(long, default_value_t = caff_core::curve::DEFAULT_STEP_MINUTES)]
        step_minutes: i64,
    },

    /// Recommend the next dose
    Next,

    /// List known beverages
    Beverages,

    /// Roll up WAL doses to CSV
    Rollup {
        /// Remove processed WAL files once rolled up
        #[arg(long)]
        cleanup: bool,
    },
}

fn main() -> Result<()> {
    caff_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Log { drink, at, note }) => cmd_log(data_dir, drink, at, note, &config),
        Some(Commands::Undo) => cmd_undo(data_dir),
        Some(Commands::Status) => cmd_status(data_dir, &config),
        Some(Commands::Curve {
            hours,
            step_minutes,
        }) => cmd_curve(data_dir, hours, step_minutes, &config),
        Some(Commands::Next) => cmd_next(data_dir, &config),
        Some(Commands::Beverages) => cmd_beverages(&config),
        Some(Commands::Rollup { cleanup }) => cmd_rollup(data_dir, cleanup),
        None => {
            // Default to "status" command
            cmd_status(data_dir, &config)
        }
    }
}

/// File layout under the data directory
struct DataPaths {
    wal_dir: PathBuf,
    wal: PathBuf,
    csv: PathBuf,
    sleep_signal: PathBuf,
}

impl DataPaths {
    fn new(data_dir: &Path) -> Self {
        let wal_dir = data_dir.join("wal");
        Self {
            wal: wal_dir.join("doses.wal"),
            csv: data_dir.join("doses.csv"),
            sleep_signal: data_dir.join("signals").join("sleep.json"),
            wal_dir,
        }
    }
}

/// Build the beverage catalog with config overlays, refusing a broken one
fn load_catalog(config: &Config) -> Result<Catalog> {
    let catalog = if config.beverages.custom.is_empty() {
        get_default_catalog().clone()
    } else {
        build_default_catalog().with_custom(config.beverages.custom.clone())
    };
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::Catalog("Invalid catalog".into()));
    }
    Ok(catalog)
}

/// Resolve today's schedule, letting a fresh sleep-tracker signal override
/// the configured wake time
fn resolve_schedule(
    config: &Config,
    paths: &DataPaths,
    now: DateTime<Utc>,
) -> Result<ScheduleProfile> {
    let mut schedule = config.schedule.resolve(now)?;

    if let Some(signal) = load_sleep_signal(&paths.sleep_signal)? {
        if signal.is_fresh(now) {
            tracing::info!(
                "Using tracked wake time {} over the configured {}",
                signal.woke_at,
                schedule.wake_at
            );
            schedule.wake_at = signal.woke_at;
        }
    }

    Ok(schedule)
}

fn cmd_log(
    data_dir: PathBuf,
    drink: String,
    at: Option<String>,
    note: Option<String>,
    config: &Config,
) -> Result<()> {
    let paths = DataPaths::new(&data_dir);
    std::fs::create_dir_all(&paths.wal_dir)?;

    let catalog = load_catalog(config)?;
    let decay = config.decay.to_profile()?;
    let now = Utc::now();
    let occurred_at = match at {
        Some(ref value) => parse_intake_time(value, now)?,
        None => now,
    };

    let (amount_mg, beverage_id) = resolve_drink(&catalog, &drink)?;

    let dose = DoseEvent {
        id: Uuid::new_v4(),
        beverage_id: beverage_id.clone(),
        amount_mg,
        occurred_at,
        note,
    };
    let mut sink = JsonlSink::new(&paths.wal);
    sink.append(&dose)?;

    let label = beverage_id
        .as_deref()
        .and_then(|id| catalog.beverages.get(id))
        .map(|b| b.name.as_str())
        .unwrap_or("custom amount");

    let doses = load_recent_doses(&paths.wal, &paths.csv, HISTORY_DAYS)?;
    let level = level_at(&doses, now, &decay);

    println!(
        "✓ Logged {:.0}mg ({}) at {}",
        amount_mg,
        label,
        format_local(occurred_at)
    );
    println!("  Current level: ~{:.0}mg", level);

    Ok(())
}

fn cmd_undo(data_dir: PathBuf) -> Result<()> {
    let paths = DataPaths::new(&data_dir);

    match caff_core::wal::remove_latest_dose(&paths.wal)? {
        Some(dose) => {
            println!(
                "✓ Removed {:.0}mg logged at {}",
                dose.amount_mg,
                format_local(dose.occurred_at)
            );
        }
        None => println!("No doses in the log to undo."),
    }

    Ok(())
}

fn cmd_status(data_dir: PathBuf, config: &Config) -> Result<()> {
    let paths = DataPaths::new(&data_dir);
    let now = Utc::now();
    let decay = config.decay.to_profile()?;
    let schedule = resolve_schedule(config, &paths, now)?;
    let doses = load_recent_doses(&paths.wal, &paths.csv, HISTORY_DAYS)?;

    let bounds = engine::cycle_bounds(&schedule);
    let level = level_at(&doses, now, &decay);
    let consumed = history::total_mg_in_window(&doses, bounds.cycle_start, bounds.sleep_at);
    let remaining = (schedule.optimal_daily_mg - consumed).max(0.0);

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  CAFFEINE STATUS");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Current level:    ~{:.0}mg", level);
    println!(
        "  Consumed today:   {:.0}mg of {:.0}mg",
        consumed, schedule.optimal_daily_mg
    );
    println!("  Remaining budget: {:.0}mg", remaining);
    println!();
    println!("  Intake cutoff: {}", format_local(bounds.cutoff));
    println!(
        "  Bedtime:       {} (projected ~{:.0}mg)",
        format_local(bounds.sleep_at),
        level_at(&doses, bounds.sleep_at, &decay)
    );

    if let Some(last) = history::last_dose_in_window(&doses, bounds.cycle_start, bounds.sleep_at) {
        println!();
        println!(
            "  Last dose: {:.0}mg at {}",
            last.amount_mg,
            format_local(last.occurred_at)
        );
    }

    println!();
    Ok(())
}

fn cmd_curve(data_dir: PathBuf, hours: i64, step_minutes: i64, config: &Config) -> Result<()> {
    let paths = DataPaths::new(&data_dir);
    let now = Utc::now();
    let decay = config.decay.to_profile()?;
    let doses = load_recent_doses(&paths.wal, &paths.csv, HISTORY_DAYS)?;

    let start = now;
    let end = now + chrono::Duration::hours(hours);
    let step = chrono::Duration::minutes(step_minutes);

    let samples = sample_curve(&doses, start, end, &decay, step)?;
    let peak = peak_in_window(&doses, start, end, &decay, step)?;

    println!("{}", render_curve_chart(&samples, &peak));
    println!("Peak: ~{:.0}mg at {}", peak.level_mg, format_local(peak.at));

    Ok(())
}

fn cmd_next(data_dir: PathBuf, config: &Config) -> Result<()> {
    let paths = DataPaths::new(&data_dir);
    let now = Utc::now();
    let ctx = DoseContext {
        now,
        doses: load_recent_doses(&paths.wal, &paths.csv, HISTORY_DAYS)?,
        decay: config.decay.to_profile()?,
        schedule: resolve_schedule(config, &paths, now)?,
    };

    let recommendation = recommend_next_dose(&ctx)?;
    display_recommendation(&recommendation, now);

    Ok(())
}

fn cmd_beverages(config: &Config) -> Result<()> {
    let catalog = load_catalog(config)?;

    let mut beverages: Vec<_> = catalog.beverages.values().collect();
    beverages.sort_by(|a, b| a.id.cmp(&b.id));

    println!("\nKnown beverages:\n");
    for beverage in beverages {
        println!(
            "  {:<18} {:>4.0}mg  {} ({})",
            beverage.id, beverage.caffeine_mg, beverage.name, beverage.serving
        );
    }
    println!("\nLog one with `sip log <id>`, or a raw amount with `sip log 80`.");

    Ok(())
}

fn cmd_rollup(data_dir: PathBuf, cleanup: bool) -> Result<()> {
    let paths = DataPaths::new(&data_dir);

    if !paths.wal.exists() {
        println!("No WAL on disk - nothing to roll up.");
        return Ok(());
    }

    let count = caff_core::csv_rollup::wal_to_csv_and_archive(&paths.wal, &paths.csv)?;

    println!("✓ Rolled up {} doses to CSV", count);
    println!("  CSV: {}", paths.csv.display());

    if cleanup {
        let cleaned = caff_core::csv_rollup::cleanup_processed_wals(&paths.wal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed WAL files", cleaned);
        }
    }

    Ok(())
}

/// Look up a beverage id, falling back to a raw milligram amount
fn resolve_drink(catalog: &Catalog, drink: &str) -> Result<(f64, Option<String>)> {
    if let Some(beverage) = catalog.beverages.get(drink) {
        return Ok((beverage.caffeine_mg, Some(beverage.id.clone())));
    }

    match drink.parse::<f64>() {
        Ok(mg) if mg > 0.0 && mg.is_finite() => Ok((mg, None)),
        _ => Err(Error::Parse(format!(
            "'{}' is neither a known beverage nor a milligram amount; try `sip beverages`",
            drink
        ))),
    }
}

/// Parse an intake time as RFC 3339, or HH:MM on today's local clock
fn parse_intake_time(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }

    if let Ok(time) = NaiveTime::parse_from_str(value, "%H:%M") {
        let day = now.with_timezone(&Local).date_naive();
        if let LocalResult::Single(instant) | LocalResult::Ambiguous(instant, _) =
            Local.from_local_datetime(&day.and_time(time))
        {
            return Ok(instant.with_timezone(&Utc));
        }
    }

    Err(Error::Parse(format!(
        "Could not parse '{}' as a time (use RFC 3339 or HH:MM)",
        value
    )))
}

fn format_local(instant: DateTime<Utc>) -> String {
    let local = instant.with_timezone(&Local);
    if local.date_naive() == Local::now().date_naive() {
        local.format("%H:%M").to_string()
    } else {
        local.format("%Y-%m-%d %H:%M").to_string()
    }
}

fn display_recommendation(recommendation: &Recommendation, now: DateTime<Utc>) {
    match recommendation {
        Recommendation::Recommended(dose) => {
            println!("\n╭─────────────────────────────────────────╮");
            println!("│  NEXT DOSE");
            println!("╰─────────────────────────────────────────╯");
            println!();
            if dose.dose_at <= now + chrono::Duration::minutes(1) {
                println!("  → {:.0}mg now", dose.amount_mg);
            } else {
                println!("  → {:.0}mg at {}", dose.amount_mg, format_local(dose.dose_at));
            }
            println!();
            println!("  Intake window closes at {}", format_local(dose.window_end));
            println!();
        }
        Recommendation::NoMoreDosesToday { reason } => {
            println!("\nNo more doses today: {}.", reason);
        }
    }
}

fn render_curve_chart(samples: &[SamplePoint], peak: &SamplePoint) -> String {
    const BAR_WIDTH: usize = 30;
    const MAX_ROWS: usize = 25;

    let mut output = String::from("\nProjected caffeine curve:\n");
    output.push_str(&"─".repeat(50));
    output.push('\n');

    let scale = peak.level_mg.max(1.0);
    let stride = (samples.len() + MAX_ROWS - 1) / MAX_ROWS;

    for point in samples.iter().step_by(stride.max(1)) {
        let bar_length = (point.level_mg / scale * BAR_WIDTH as f64) as usize;
        let bar = "█".repeat(bar_length);
        let empty = " ".repeat(BAR_WIDTH - bar_length);

        output.push_str(&format!(
            "{} {}{} {:>4.0}mg\n",
            point.at.with_timezone(&Local).format("%H:%M"),
            bar,
            empty,
            point.level_mg
        ));
    }

    output.push_str(&"─".repeat(50));
    output
}
