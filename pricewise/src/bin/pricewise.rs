//! Pricewise CLI - train, forecast and recommend over exported price history.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use pricewise::{EngineConfig, EntityId, InMemoryHistory, PriceEngine, TrainingOutcome};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pricewise")]
#[command(about = "Price forecasting and buy/wait recommendations", long_about = None)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Observations CSV (entity_id,timestamp,price,discount_price,in_stock)
    #[arg(long, global = true, default_value = "prices.csv")]
    observations: PathBuf,

    /// Attributes CSV (entity_id,brand,platform,processor,ram,storage,graphics)
    #[arg(long, global = true)]
    attributes: Option<PathBuf>,

    /// Engine configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Artifact location, overriding the configuration
    #[arg(long, global = true)]
    artifact: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit and persist a model
    Train {
        /// Retrain even if an artifact exists
        #[arg(short, long)]
        force: bool,
    },

    /// Forecast one entity
    Forecast {
        entity: EntityId,

        /// Days to forecast
        #[arg(short, long, default_value = "7")]
        days: usize,

        /// Forecast from this date instead of today (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Find the cheapest day within a horizon
    BestTime {
        entity: EntityId,

        /// Horizon in days
        #[arg(short, long, default_value = "30")]
        days: usize,

        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Forecast several entities
    Batch {
        #[arg(required = true, num_args = 1..)]
        entities: Vec<EntityId>,

        #[arg(short, long, default_value = "7")]
        days: usize,

        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

#[derive(Serialize)]
#[serde(untagged)]
enum BatchEntry<T> {
    Ok(T),
    Err { error: String },
}

fn load_engine(args: &SourceArgs) -> Result<PriceEngine<InMemoryHistory>> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(path) = &args.artifact {
        config.artifact.path = Some(path.clone());
    }

    let history = InMemoryHistory::from_csv(args.observations.clone(), args.attributes.clone())
        .with_context(|| format!("loading history {}", args.observations.display()))?;
    Ok(PriceEngine::new(history, config)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("pricewise=info".parse()?))
        .init();

    let cli = Cli::parse();
    let engine = load_engine(&cli.source)?;
    let today = chrono::Utc::now().date_naive();

    match cli.command {
        Commands::Train { force } => match engine.train(force) {
            TrainingOutcome::Failed(err) => bail!("{}", err),
            TrainingOutcome::Trained(metrics) => {
                info!(mae = metrics.mae, r2 = metrics.r2, "Training successful");
                print_json(&metrics)?;
            }
            TrainingOutcome::AlreadyTrained => {
                if let Some(artifact) = engine.artifact() {
                    print_json(&artifact.metrics)?;
                }
            }
        },
        Commands::Forecast {
            entity,
            days,
            as_of,
        } => {
            let forecast = engine.forecast_at(entity, days, as_of.unwrap_or(today))?;
            print_json(&forecast)?;
        }
        Commands::BestTime {
            entity,
            days,
            as_of,
        } => {
            let best = engine.best_time_to_buy_at(entity, days, as_of.unwrap_or(today))?;
            print_json(&best)?;
        }
        Commands::Batch {
            entities,
            days,
            as_of,
        } => {
            let results: BTreeMap<EntityId, BatchEntry<_>> = engine
                .batch_forecast_at(&entities, days, as_of.unwrap_or(today))
                .into_iter()
                .map(|(id, result)| {
                    let entry = match result {
                        Ok(forecast) => BatchEntry::Ok(forecast),
                        Err(err) => BatchEntry::Err {
                            error: err.to_string(),
                        },
                    };
                    (id, entry)
                })
                .collect();
            print_json(&results)?;
        }
    }

    Ok(())
}
