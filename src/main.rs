use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

mod analytics;
mod assessment;
mod checkin;
mod config;
mod crisis;
mod db;
mod error;
mod http;
mod import;
mod memory;
mod models;
mod report;
mod resources;
mod store;

use analytics::{Timeframe, WellnessAnalyticsAggregator};
use config::{Config, LogFormat};
use models::Identity;
use store::RecordStore;

#[derive(Parser)]
#[command(name = "mindwell")]
#[command(about = "Student wellness check-ins, crisis screening and analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("identity")
        .args(["user_id", "session_id"])
        .required(true)
        .multiple(false)
))]
struct IdentityArgs {
    #[arg(long)]
    user_id: Option<Uuid>,
    #[arg(long)]
    session_id: Option<String>,
}

impl IdentityArgs {
    fn resolve(&self) -> anyhow::Result<Identity> {
        Identity::resolve(self.user_id, self.session_id.as_deref())
            .context("--user-id or a non-empty --session-id is required")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import historical mood check-ins from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Run the HTTP service
    Serve {
        #[arg(long)]
        port: Option<u16>,
        /// Keep records in memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },
    /// Print wellness analytics for one identity
    Analytics {
        #[command(flatten)]
        identity: IdentityArgs,
        #[arg(long, default_value = "7d")]
        timeframe: String,
    },
    /// Generate a markdown wellness report
    Report {
        #[command(flatten)]
        identity: IdentityArgs,
        #[arg(long, default_value = "7d")]
        timeframe: String,
        #[arg(long, default_value = "wellness-report.md")]
        out: PathBuf,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config::DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config.require_database_url()?;
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn serve(store: Arc<dyn RecordStore>, port: u16) -> anyhow::Result<()> {
    let app = http::routes(http::AppState::new(store));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(address = %addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_tracing(config.log_format);

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!(
                "Seed data inserted for session {} and user {}.",
                db::SEED_SESSION,
                db::SEED_USER
            );
        }
        Commands::Import { csv } => {
            let rows = import::read_mood_csv_file(&csv)?;
            let pool = connect(&config).await?;
            let inserted = db::import_mood_entries(&pool, rows).await?;
            println!("Inserted {inserted} mood entries from {}.", csv.display());
        }
        Commands::Serve { port, in_memory } => {
            let port = port.unwrap_or(config.port);
            info!(
                service = "mindwell",
                version = env!("CARGO_PKG_VERSION"),
                in_memory,
                "starting wellness service"
            );
            let store: Arc<dyn RecordStore> = if in_memory {
                Arc::new(memory::MemoryStore::new())
            } else {
                Arc::new(db::PgStore::new(connect(&config).await?))
            };
            serve(store, port).await?;
        }
        Commands::Analytics {
            identity,
            timeframe,
        } => {
            let identity = identity.resolve()?;
            let timeframe = Timeframe::parse(&timeframe);
            let pool = connect(&config).await?;
            let aggregator = WellnessAnalyticsAggregator::new(Arc::new(db::PgStore::new(pool)));
            let analytics = aggregator
                .aggregate_for(&identity, timeframe, Utc::now())
                .await?;

            if analytics.mood.total_entries == 0 && analytics.wellness.total_assessments == 0 {
                println!("No check-ins found for this window.");
                return Ok(());
            }

            println!("Wellness analytics for {identity} ({timeframe}):");
            println!(
                "- mood {:.1} ({}) across {} check-ins",
                analytics.mood.average,
                analytics.mood.trend.as_str(),
                analytics.mood.total_entries
            );
            println!(
                "- stress {:.1}, sleep {:.1}, social {:.1} across {} assessments",
                analytics.wellness.average_stress,
                analytics.wellness.average_sleep,
                analytics.wellness.average_social,
                analytics.wellness.total_assessments
            );
            println!("- checked in on {}% of days", analytics.check_in_frequency);
            for insight in analytics.insights.iter() {
                println!("- {insight}");
            }
        }
        Commands::Report {
            identity,
            timeframe,
            out,
        } => {
            let identity = identity.resolve()?;
            let timeframe = Timeframe::parse(&timeframe);
            let pool = connect(&config).await?;
            let aggregator = WellnessAnalyticsAggregator::new(Arc::new(db::PgStore::new(pool)));
            let analytics = aggregator
                .aggregate_for(&identity, timeframe, Utc::now())
                .await?;
            let report = report::build_report(&identity, timeframe, &analytics);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
