//! Raffle operator CLI
//!
//! Usage:
//!   raffle import event.json       - Load an event with quotas and signups
//!   raffle open <event>            - Open registration
//!   raffle run <event> [--seed S]  - Run the raffle
//!   raffle due                     - Run every event that is due now
//!   raffle abandon <event>         - Roll back a stuck run
//!   raffle replay <event>          - Audit the committed run
//!   raffle status [event]          - Show lifecycle and simulation records
//!   raffle draw entrants.json      - Simulate a standalone draw

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use raffle_core::{DrawLabel, EventData, EventId, OperatorId, QuotaId};
use raffle_draw::{DrawSeed, DrawSimulator, Entrant, PhysicsDrawSimulator, sort_entrants};
use raffle_engine::{EngineConfig, FileStore, RaffleEngine, RaffleStore};

#[derive(Parser)]
#[command(name = "raffle", about = "Deterministic raffle runs for oversubscribed quotas")]
struct Cli {
    /// Store directory
    #[arg(long, global = true, default_value = "raffle-data")]
    store: PathBuf,

    /// Engine config (YAML, or JSON by extension)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Operator identity
    #[arg(long, global = true, default_value = "cli")]
    operator: String,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a standalone draw from a JSON list of entrants
    Draw {
        file: PathBuf,
        #[arg(short, long, default_value = "demo")]
        seed: String,
        /// Print the full trace instead of just the order
        #[arg(long)]
        trace: bool,
    },

    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that operate on the event store
#[derive(Subcommand)]
enum StoreCommand {
    /// Load an event document (event, quotas, signups)
    Import { file: PathBuf },
    /// Open registration
    Open { event: String },
    /// Run the raffle
    Run {
        event: String,
        /// Seed for the first attempt (default: random)
        #[arg(short, long)]
        seed: Option<String>,
    },
    /// Run every due event in parallel
    Due,
    /// Roll a stuck run back to REGISTRATION_OPEN
    Abandon { event: String },
    /// Re-resolve the committed run and compare with the store
    Replay {
        event: String,
        /// Re-run the chamber from the seed instead of using recorded draws
        #[arg(long)]
        resimulate: bool,
    },
    /// Show lifecycle status and simulation records
    Status { event: Option<String> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let command = match cli.command {
        Commands::Draw { file, seed, trace } => return draw(&file, &seed, trace, &config),
        Commands::Store(command) => command,
    };

    let store = Arc::new(
        FileStore::open(&cli.store)
            .with_context(|| format!("Failed to open store {}", cli.store.display()))?,
    );
    log::info!("Using store at {}", store.root().display());
    let engine = RaffleEngine::new(store.clone(), config).context("Invalid chamber config")?;
    let operator = OperatorId::new(cli.operator.as_str());
    dispatch(command, &store, &engine, &operator)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn dispatch(
    command: StoreCommand,
    store: &FileStore,
    engine: &RaffleEngine,
    operator: &OperatorId,
) -> Result<()> {
    match command {
        StoreCommand::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let data: EventData = serde_json::from_str(&text).context("Invalid event document")?;
            let id = data.event.id.clone();
            store.insert_event(data)?;
            println!("Imported {id}");
        }
        StoreCommand::Open { event } => {
            engine.open_registration(&EventId::new(event.as_str()), operator)?;
            println!("Registration opened for {event}");
        }
        StoreCommand::Run { event, seed } => {
            let report = engine.run(&EventId::new(event), operator, seed.map(DrawSeed::new))?;
            print_json(&report)?;
        }
        StoreCommand::Due => {
            let results = engine.run_due(operator)?;
            if results.is_empty() {
                println!("No raffles due");
            }
            let mut failed = 0;
            for (id, result) in results {
                match result {
                    Ok(report) => println!(
                        "{id}: {} confirmed, {} rejected ({} promoted)",
                        report.confirmed, report.rejected, report.promoted
                    ),
                    Err(err) => {
                        failed += 1;
                        eprintln!("{id}: {err}");
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} raffle(s) failed");
            }
        }
        StoreCommand::Abandon { event } => {
            engine.abandon_run(&EventId::new(event.as_str()), operator)?;
            println!("Run for {event} rolled back");
        }
        StoreCommand::Replay { event, resimulate } => {
            let id = EventId::new(event);
            let report = if resimulate {
                engine.resimulate(&id)?
            } else {
                engine.replay(&id)?
            };
            print_json(&report)?;
            if !report.verdict.is_match() || report.traces_match == Some(false) {
                bail!("Replay of {id} does not match the store");
            }
        }
        StoreCommand::Status { event } => {
            let ids = match event {
                Some(id) => vec![EventId::new(id)],
                None => store.events()?,
            };
            for id in ids {
                let event = store.event(&id)?;
                let records = engine.simulations(&id)?;
                let sealed = records.iter().filter(|r| r.is_sealed()).count();
                println!(
                    "{id}\t{}\t{} simulation(s), {sealed} sealed",
                    event.raffle_status,
                    records.len()
                );
            }
        }
    }
    Ok(())
}

/// Simulate one draw without touching a store
fn draw(file: &Path, seed: &str, full_trace: bool, config: &EngineConfig) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut entrants: Vec<Entrant> =
        serde_json::from_str(&text).context("Expected a JSON list of entrants")?;
    sort_entrants(&mut entrants);

    let simulator = PhysicsDrawSimulator::new(config.chamber.clone())?;
    let label = DrawLabel::Quota(QuotaId::new("demo"));
    let draw = simulator.draw(&label, &entrants, &DrawSeed::new(seed))?;

    if full_trace {
        print_json(&draw.trace)?;
    } else {
        for (position, signup_id) in draw.order.iter().enumerate() {
            println!("{:>4}  {signup_id}", position + 1);
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
