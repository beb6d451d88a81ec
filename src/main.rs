use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::Request;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use community_pulse::analyzer::Analyzer;
use community_pulse::db::{self, PgStore};
use community_pulse::models::NewPost;
use community_pulse::store::{MemoryStore, PostQuery, SignalStore};
use community_pulse::{report, router, AppState, Config, Engine, Ingestor};

#[derive(Parser)]
#[command(name = "community-pulse")]
#[command(about = "Scores community posts and tracks community health", long_about = None)]
struct Cli {
    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Load the demo posts when the store is empty
        #[arg(long)]
        seed: bool,
    },
    /// Create or upgrade the database schema
    InitDb,
    /// Load the demo community posts
    Seed,
    /// Import posts from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score a piece of text without storing it
    Analyze {
        #[arg(long)]
        text: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Generate a markdown community report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if std::path::Path::new(&cli.dotenv).exists() {
        dotenvy::from_path(&cli.dotenv)?;
        eprintln!("Loaded environment from {}", cli.dotenv);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let scoring = config.scoring().context("invalid scoring configuration")?;

    match cli.command {
        Commands::Serve { seed } => {
            let store = open_store(&config).await?;
            let engine = Arc::new(Engine::open(store, scoring).await?);
            if seed {
                let inserted = db::seed(&engine, Utc::now()).await?;
                tracing::info!(inserted, "demo posts loaded");
            }
            serve(&config, engine).await?;
        }
        Commands::InitDb => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set to create the schema")?;
            let store = PgStore::connect(database_url)
                .await
                .context("failed to connect to Postgres")?;
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let engine = Engine::open(open_store(&config).await?, scoring).await?;
            let inserted = db::seed(&engine, Utc::now()).await?;
            println!("Seeded {inserted} posts.");
        }
        Commands::Import { csv } => {
            let engine = Engine::open(open_store(&config).await?, scoring).await?;
            let inserted = db::import_csv(&engine, &csv).await?;
            println!("Imported {inserted} posts from {}.", csv.display());
        }
        Commands::Analyze { text, category } => {
            let post = NewPost::validate(&text, "cli", category.as_deref(), None)?;
            let analysis = Analyzer::new(&scoring).analyze(&post);
            println!(
                "Sentiment {:.3} ({})",
                analysis.sentiment.score,
                analysis.sentiment.label.as_str()
            );
            println!("Misinformation risk {:.2}", analysis.misinformation_risk);
            println!(
                "Priority {:.2} ({:?})",
                analysis.priority_score,
                analysis.priority_band()
            );
            if analysis.rule_hits.is_empty() {
                println!("No misinformation rules matched.");
            } else {
                println!("Rule hits:");
                for hit in &analysis.rule_hits {
                    println!("- {} (+{:.2}): {}", hit.rule, hit.contribution, hit.description);
                }
            }
        }
        Commands::Report { out } => {
            let engine = Engine::open(open_store(&config).await?, scoring).await?;
            let now = Utc::now();
            let insights = engine.insights(now.date_naive()).await;
            let recent = engine
                .posts(&PostQuery {
                    limit: 50,
                    ..PostQuery::default()
                })
                .await?;
            let report = report::build_report(now, &insights, &recent);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn SignalStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url)
                .await
                .context("failed to connect to Postgres")?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, posts are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn serve(config: &Config, engine: Arc<Engine>) -> anyhow::Result<()> {
    let (ingestor, workers) = Ingestor::spawn(Arc::clone(&engine), config.queue_capacity, config.workers);

    let reconcile = {
        let engine = Arc::clone(&engine);
        let period = Duration::from_secs(config.reconcile_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = engine.reconcile().await {
                    tracing::warn!(error = %err, "reconcile pass failed");
                }
            }
        })
    };

    let app = router(AppState { engine, ingestor })
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    query = request.uri().query().unwrap_or("")
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, workers = config.workers, "starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reconcile.abort();
    // the router owned the last queue sender, so workers drain and stop
    for worker in workers {
        let _ = worker.await;
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
