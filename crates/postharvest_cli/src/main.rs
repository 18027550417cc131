//! `postharvest` command-line entry point.
//!
//! # Responsibility
//! - Load configuration and logging once, then dispatch one command.
//! - Map the command outcome to the process exit code (0 ok, 1 failure).

use chrono::Local;
use clap::{Parser, Subcommand};
use log::{error, info};
use postharvest_core::annotate::{AnnotationArchive, OpenAiAnnotator};
use postharvest_core::config::{AppConfig, DEFAULT_CONFIG_FILE};
use postharvest_core::deliver::WebhookDelivery;
use postharvest_core::render::WebDriverSession;
use postharvest_core::schedule::{CronSchedule, Scheduler, CHECK_INTERVAL};
use postharvest_core::{
    init_logging, CompletionLedger, Pipeline, SqliteCompletionLedger, WorkingSetStore,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;
type CorePipeline<'a> = Pipeline<'a, SqliteCompletionLedger>;

#[derive(Parser)]
#[command(name = "postharvest")]
#[command(about = "Scrape a listing page, annotate new items and deliver them")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape, annotate and deliver (default)
    Run,
    /// Refresh the working set from the listing page
    Scrape,
    /// Annotate records that have no annotation yet
    Annotate,
    /// Send annotated records to the configured webhook
    Deliver,
    /// Working-set and ledger statistics
    Stats,
    /// Inspect the completion ledger
    Ledger {
        /// Number of recent entries to show
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Run the full pipeline on the configured cron schedule
    Schedule,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("event=cli module=cli status=error error={err}");
            eprintln!("Error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> CliResult<bool> {
    let config = AppConfig::load(&cli.config)?;
    init_logging(&config.logging.level, &config.logging.dir)?;
    info!(
        "event=cli_start module=cli status=ok config={} version={}",
        cli.config.display(),
        postharvest_core::core_version()
    );

    let store = WorkingSetStore::new(&config.files.working_set_path);
    let ledger = SqliteCompletionLedger::open(&config.files.ledger_path)?;
    let pipeline = Pipeline::new(&config, store, ledger)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => full_run(&config, &pipeline),
        Commands::Scrape => {
            let mut session = WebDriverSession::connect(&config.render.webdriver_settings())?;
            Ok(pipeline.run_scrape(&mut session))
        }
        Commands::Annotate => {
            let annotator = OpenAiAnnotator::new(&config.annotation)?;
            let archive = AnnotationArchive::open(&config.files.archive_path)?;
            Ok(pipeline.run_annotation(&annotator, &archive))
        }
        Commands::Deliver => {
            let channel = WebhookDelivery::new(&config.delivery)?;
            Ok(pipeline.run_delivery(&channel))
        }
        Commands::Stats => show_statistics(&config, &pipeline),
        Commands::Ledger { limit } => inspect_ledger(pipeline.ledger(), limit),
        Commands::Schedule => run_scheduled(&config, &pipeline),
    }
}

fn full_run(config: &AppConfig, pipeline: &CorePipeline<'_>) -> CliResult<bool> {
    let annotator = OpenAiAnnotator::new(&config.annotation)?;
    let archive = AnnotationArchive::open(&config.files.archive_path)?;
    let channel = WebhookDelivery::new(&config.delivery)?;
    let mut session = WebDriverSession::connect(&config.render.webdriver_settings())?;

    let succeeded = pipeline.run_full(&mut session, &annotator, &archive, &channel);
    // Statistics never change the exit code.
    if let Err(err) = show_statistics(config, pipeline) {
        error!("event=stats module=cli status=error error={err}");
    }
    Ok(succeeded)
}

fn run_scheduled(config: &AppConfig, pipeline: &CorePipeline<'_>) -> CliResult<bool> {
    if !config.schedule.enabled {
        info!("event=schedule module=cli status=skip reason=disabled action=run_once");
        return full_run(config, pipeline);
    }

    let mut scheduler = Scheduler::new(CronSchedule::parse(&config.schedule.cron)?);
    println!("Scheduled {}; waiting.", scheduler.schedule().describe());
    loop {
        scheduler.tick(Local::now(), || {
            full_run(config, pipeline).unwrap_or_else(|err| {
                error!("event=scheduled_run module=cli status=error error={err}");
                false
            })
        });
        std::thread::sleep(CHECK_INTERVAL);
    }
}

fn show_statistics(config: &AppConfig, pipeline: &CorePipeline<'_>) -> CliResult<bool> {
    let working_set = pipeline.store().statistics()?;
    let ledger = pipeline.ledger().statistics()?;
    let archived = AnnotationArchive::open(&config.files.archive_path)?
        .annotated_permalinks()?
        .len();

    println!("Working set: {}", pipeline.store().path().display());
    println!("  records:            {}", working_set.total);
    println!("  annotated:          {}", working_set.with_annotation);
    println!("  not annotated:      {}", working_set.without_annotation);
    for (category, count) in &working_set.by_category {
        println!("  - {category}: {count}");
    }
    println!("Ledger: {}", pipeline.ledger().path().display());
    println!("  completed:          {}", ledger.total_completed);
    println!("  completed today:    {}", ledger.completed_today);
    println!("Archived permalinks:  {archived}");
    Ok(true)
}

fn inspect_ledger(ledger: &SqliteCompletionLedger, limit: u32) -> CliResult<bool> {
    println!("Ledger: {}", ledger.path().display());
    println!("Schema:");
    for statement in ledger.schema()? {
        println!("{statement}");
    }

    let stats = ledger.statistics()?;
    println!();
    println!(
        "Completed: {} total, {} today",
        stats.total_completed, stats.completed_today
    );

    println!();
    println!("Completions per day:");
    for (day, count) in ledger.completions_by_day()? {
        println!("  {day}: {count}");
    }

    println!();
    println!("Most recent {limit}:");
    for entry in ledger.recent(limit)? {
        println!("  [{}] {} {}", entry.id, entry.completed_at, entry.permalink);
    }
    Ok(true)
}
