mod commands;
mod render;
mod store;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::Context;
use crate::commands::edit::EditArgs;

#[derive(Parser)]
#[command(name = "astrocron")]
#[command(about = "Edit scheduled events that fire at clock times or with the sun")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored events
    List,
    /// Show one event
    Show { id: String },
    /// Create a new event
    New {
        name: String,

        /// Event id (generated if omitted)
        #[arg(long)]
        id: Option<String>,
    },
    /// Change an event
    Edit {
        id: String,

        #[command(flatten)]
        args: EditArgs,
    },
    /// Delete an event
    Delete {
        id: String,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show today's sun events
    Astro {
        /// Day to compute (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Explain a recurrence string, e.g. "0 8 ? * 1-5"
    Cron { expression: String },
    /// Show configuration paths and site
    Config {
        /// Store a new site latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Store a new site longitude
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("ASTROCRON_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => commands::list::run(&Context::load()?).await,
        Commands::Show { id } => commands::show::run(&Context::load()?, &id).await,
        Commands::New { name, id } => commands::new::run(&Context::load()?, name, id).await,
        Commands::Edit { id, args } => commands::edit::run(&Context::load()?, &id, args).await,
        Commands::Delete { id, yes } => commands::delete::run(&Context::load()?, &id, yes).await,
        Commands::Astro { date, lat, lon } => commands::astro::run(date, lat, lon),
        Commands::Cron { expression } => {
            let settings = astrocron_core::config::Settings::load()?;
            commands::cron::run(&expression, &settings.weekday_order())
        }
        Commands::Config { lat, lon } => commands::config::run(lat, lon),
    }
}
