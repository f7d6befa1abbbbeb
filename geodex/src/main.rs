use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geodex::cmr::CmrClient;
use geodex::config::Config;
use geodex::db::{Database, EmbeddingStore, LibSqlStore};
use geodex::embeddings::{default_generator, EmbeddingGenerator};
use geodex::handlers::{
    BootstrapDriver, BootstrapRequest, EmbeddingHandler, IngestHandler, NotificationRecord,
};
use geodex::kms::KmsClient;
use geodex::models::ConceptType;
use geodex::queue::{LibSqlQueue, MessageQueue};
use geodex::worker::QueueWorker;

#[derive(Parser)]
#[command(name = "geodex")]
#[command(about = "Embedding pipeline keeping a vector index in sync with the NASA CMR catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the FIFO queue and process concept events
    Worker,

    /// Read a JSON array of notification records from stdin and enqueue them
    Ingest,

    /// Bulk-load concepts from a CMR search into the queue
    Bootstrap {
        /// Concept type: collection, variable, or citation
        #[arg(long)]
        concept_type: String,

        /// CMR search parameter as key=value; repeatable
        #[arg(long = "param")]
        params: Vec<String>,

        #[arg(long, default_value_t = 500)]
        page_size: u32,

        /// Report what would be sent without enqueueing
        #[arg(long)]
        dry_run: bool,
    },

    /// Embed a query and print the most similar chunks
    Search {
        #[arg(long)]
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: u32,

        /// Optional concept type filter
        #[arg(long)]
        concept_type: Option<String>,
    },
}

fn parse_concept_type(raw: &str) -> anyhow::Result<ConceptType> {
    ConceptType::parse(raw).ok_or_else(|| {
        anyhow::anyhow!("Unsupported concept type '{raw}'. Supported: collection, variable, citation")
    })
}

fn parse_search_params(params: &[String]) -> anyhow::Result<HashMap<String, String>> {
    params
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("Invalid search param '{pair}', expected key=value"))
        })
        .collect()
}

struct Components {
    store: Arc<dyn EmbeddingStore>,
    queue: Arc<dyn MessageQueue>,
    kms: KmsClient,
    cmr: CmrClient,
    embedder: Arc<dyn EmbeddingGenerator>,
}

async fn build_components(config: &Config) -> anyhow::Result<Components> {
    let db = Database::new(&config.database, config.embeddings.dimensions).await?;
    let store: Arc<dyn EmbeddingStore> = Arc::new(LibSqlStore::new(db.clone()));
    let queue: Arc<dyn MessageQueue> = Arc::new(LibSqlQueue::new(db, &config.queue).await?);
    let kms = KmsClient::new(&config.kms)?;
    let cmr = CmrClient::new(&config.cmr)?;
    let embedder: Arc<dyn EmbeddingGenerator> =
        Arc::new(default_generator(&config.embeddings, &kms)?);

    Ok(Components {
        store,
        queue,
        kms,
        cmr,
        embedder,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geodex=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let components = build_components(&config).await?;

    match cli.command {
        Command::Worker => run_worker(&config, components).await,
        Command::Ingest => run_ingest(components).await,
        Command::Bootstrap {
            concept_type,
            params,
            page_size,
            dry_run,
        } => {
            let request = BootstrapRequest {
                concept_type: parse_concept_type(&concept_type)?,
                search_params: parse_search_params(&params)?,
                page_size,
                dry_run,
            };
            let driver = BootstrapDriver::new(components.cmr, components.queue);
            let summary = driver.run(&request).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Search {
            query,
            limit,
            concept_type,
        } => {
            let concept_type = concept_type
                .as_deref()
                .map(parse_concept_type)
                .transpose()?;
            let embedding = components.embedder.generate(&query, None, None).await?;
            let results = components
                .store
                .search_similar(&embedding, limit, concept_type)
                .await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
    }
}

async fn run_worker(config: &Config, components: Components) -> anyhow::Result<()> {
    let handler = EmbeddingHandler::new(
        components.store,
        components.embedder,
        components.kms,
        components.cmr,
    );
    let worker = QueueWorker::new(
        components.queue,
        handler,
        config.queue.receive_batch_size,
    );

    let poll_interval = config.worker.poll_interval_secs.max(1);
    tracing::info!(poll_interval_secs = poll_interval, "Starting queue worker");

    let cancel_token = CancellationToken::new();
    let token = cancel_token.child_token();
    let poll_loop = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Queue worker shutting down...");
                    break;
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(poll_interval)) => {
                    match worker.run_once().await {
                        Ok(0) => {}
                        Ok(processed) => tracing::info!(processed, "Processed queue batch"),
                        Err(e) => tracing::error!(error = %e, "Queue worker error"),
                    }
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, cancelling worker...");
    cancel_token.cancel();
    poll_loop.await?;
    Ok(())
}

async fn run_ingest(components: Components) -> anyhow::Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let records: Vec<NotificationRecord> = serde_json::from_str(&input)?;

    let handler = IngestHandler::new(components.queue);
    let summary = handler.handle_batch(&records).await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
