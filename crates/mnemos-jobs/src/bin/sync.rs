//! Run one ingestion job against PostgreSQL and print the finished job.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mnemos_db::Database;
use mnemos_inference::OpenAIBackend;
use mnemos_jobs::{DocumentType, IngestionPipeline, JobStatus, PipelineConfig};
use mnemos_search::{VectorStore, VectorStoreConfig};

#[derive(Parser)]
#[command(name = "mnemos-sync")]
#[command(about = "Sync business records into the mnemos vector store", long_about = None)]
struct Cli {
    /// Organization to sync
    #[arg(short, long)]
    org: String,

    /// Only records owned by this user (unowned records are still synced)
    #[arg(short, long)]
    user: Option<String>,

    /// Comma-separated entity types (e.g. "tasks,deals"); all when omitted
    #[arg(short, long, value_delimiter = ',')]
    types: Vec<DocumentType>,

    /// Only records updated at or after this RFC 3339 instant
    #[arg(short, long)]
    since: Option<DateTime<Utc>>,

    /// Run database migrations first
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors
    //   RUST_LOG    - standard env filter (default: "mnemos_jobs=info,mnemos_search=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mnemos_jobs=info,mnemos_search=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("mnemos-sync.log");
        let (non_blocking, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(file_dir, file_name));

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(log_ansi.unwrap_or(false)),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    let cli = Cli::parse();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/mnemos".to_string());
    let db = Database::connect(&database_url).await?;
    if cli.migrate {
        db.migrate().await?;
        info!("Migrations applied");
    }

    let embedder = Arc::new(OpenAIBackend::from_env()?);
    let store = Arc::new(
        VectorStore::new(db.documents_arc(), db.similarity_arc(), embedder)
            .with_config(VectorStoreConfig::from_env()),
    );

    let pipeline = IngestionPipeline::builder(store)
        .with_config(PipelineConfig::from_env())
        .with_domain(db.domain_arc())
        .with_job_repository(db.jobs_arc())
        .build();

    let user = cli.user.as_deref();
    let job = match (cli.since, cli.types.is_empty()) {
        (Some(since), _) => pipeline.start_incremental_sync(&cli.org, user, since).await?,
        (None, false) => pipeline.start_entity_sync(&cli.org, user, &cli.types).await?,
        (None, true) => pipeline.start_full_sync(&cli.org, user).await?,
    };
    info!(job_id = %job.id, job_type = %job.job_type, "Ingestion job started");

    let finished = pipeline
        .wait_for_current_job()
        .await
        .ok_or_else(|| anyhow::anyhow!("ingestion job {} vanished", job.id))?;
    println!("{}", serde_json::to_string_pretty(&finished)?);

    if finished.status != JobStatus::Completed {
        anyhow::bail!(
            "ingestion job failed: {}",
            finished.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
