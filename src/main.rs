use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use topicpulse::config::{Config, EmbedderBackend};
use topicpulse::metrics::{self, DEFAULT_TOP_TOPICS};
use topicpulse::pipeline::{PipelineError, TopicPipeline};
use topicpulse::sentiment::LexiconSentiment;
use topicpulse::topics::traits::EmbeddingProvider;

/// TopicPulse: topic discovery and engagement aggregation for discussion threads.
///
/// Clusters posts and their replies into topics, labels each topic with its
/// most characteristic words, and rolls up score, reply and sentiment
/// metrics per topic.
#[derive(Parser)]
#[command(name = "topicpulse", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Load items from a JSON array or JSON-lines file
    Import {
        /// Path to the export file
        path: PathBuf,

        /// Clear all existing items before loading
        #[arg(long)]
        replace: bool,
    },

    /// Download the sentence embedding model (~90 MB)
    DownloadModel,

    /// Discover topics and label every item
    Run {
        /// Only cluster items from this source
        #[arg(long)]
        corpus: Option<String>,

        /// Cluster at most this many items
        #[arg(long)]
        limit: Option<usize>,

        /// Override TOPICPULSE_EMBEDDER (onnx or hashing)
        #[arg(long)]
        embedder: Option<EmbedderBackend>,
    },

    /// Show per-topic engagement and sentiment
    Summary {
        /// Number of topics to show (default: 15)
        #[arg(long, default_value_t = DEFAULT_TOP_TOPICS)]
        top: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one topic and the items labeled with it
    Topic {
        /// A single topic word (e.g. "finetuning")
        word: String,
    },

    /// Show system status (DB stats, label coverage, last run)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("topicpulse=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing TopicPulse database...");
            let config = Config::load()?;
            let db = topicpulse::db::initialize_sqlite(&config.db_path)?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext: load items with `topicpulse import <file>`");
            println!("Then run: topicpulse run");
        }

        Commands::Import { path, replace } => {
            let config = Config::load()?;
            let db = topicpulse::db::open_sqlite(&config.db_path)?;
            let items = topicpulse::ingest::load_items(&path)?;

            if replace {
                let removed = db.clear_items().await?;
                info!(removed, "Cleared existing items");
            }
            let written = db.insert_items(&items).await?;
            println!(
                "Imported {} items from {}",
                written.to_string().bold(),
                path.display()
            );
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = &config.model_dir;

            println!("Downloading ONNX embedding model...");
            println!("  Destination: {}", model_dir.display());

            topicpulse::topics::download::download_model(model_dir).await?;

            println!("\n{}", "Model downloaded successfully.".bold());
            println!("You can now run `topicpulse run`.");
        }

        Commands::Run {
            corpus,
            limit,
            embedder,
        } => {
            let mut config = Config::load()?;
            if let Some(backend) = embedder {
                config.embedder = backend;
            }
            let db = topicpulse::db::open_sqlite(&config.db_path)?;
            let embedder = create_embedder(&config)?;
            let sentiment = LexiconSentiment::default();

            let pipeline = TopicPipeline::new(
                Arc::clone(&db),
                embedder.as_ref(),
                &sentiment,
                config.pipeline_settings(),
            );

            match pipeline.run_topic_modeling(corpus.as_deref(), limit).await {
                Ok(run) => {
                    topicpulse::output::terminal::display_run_summary(&run);
                    let top: Vec<_> = metrics::ranked(&run.metrics)
                        .into_iter()
                        .take(DEFAULT_TOP_TOPICS)
                        .collect();
                    topicpulse::output::terminal::display_topic_metrics(&top, run.metrics.len());
                }
                Err(PipelineError::EmptyCorpus { items }) => {
                    println!(
                        "{} No valid text: none of the {} selected items had enough content to cluster.",
                        "!".yellow(),
                        items
                    );
                    println!("  Existing topic labels were left unchanged.");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Summary { top, json } => {
            let config = Config::load()?;
            let db = topicpulse::db::open_sqlite(&config.db_path)?;
            let items = db.get_all_items().await?;
            let all = metrics::aggregate(&items, &LexiconSentiment::default());
            let ranked: Vec<_> = metrics::ranked(&all).into_iter().take(top).collect();

            if json {
                let mapping: std::collections::BTreeMap<&str, _> =
                    ranked.iter().map(|m| (m.topic.as_str(), *m)).collect();
                println!("{}", serde_json::to_string_pretty(&mapping)?);
            } else {
                topicpulse::output::terminal::display_topic_metrics(&ranked, all.len());
            }
        }

        Commands::Topic { word } => {
            let config = Config::load()?;
            let db = topicpulse::db::open_sqlite(&config.db_path)?;
            let items = db.get_all_items().await?;
            let all = metrics::aggregate(&items, &LexiconSentiment::default());

            let Some(metric) = all.get(word.trim()) else {
                anyhow::bail!(
                    "No topic named '{}'. Run `topicpulse summary` to list topics.",
                    word
                );
            };
            let members = metrics::items_for_topic(&items, &word);
            topicpulse::output::terminal::display_topic_detail(metric, &members);
        }

        Commands::Status => {
            let config = Config::load()?;
            if !topicpulse::status::database_exists(&config.db_path) {
                println!("Database: not initialized");
                println!("\nRun `topicpulse init` to set up the database.");
                return Ok(());
            }
            let db = topicpulse::db::open_sqlite(&config.db_path)?;
            topicpulse::status::show(&db, &config.db_path).await?;
            println!("Embedder: {:?} (model dir {})", config.embedder, config.model_dir.display());
        }
    }

    Ok(())
}

/// Create the embedding provider for the configured backend.
fn create_embedder(config: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    match config.embedder {
        EmbedderBackend::Onnx => {
            config.require_embedder()?;
            info!("Using local ONNX sentence embedder");
            let dir = topicpulse::topics::download::embedding_model_dir(&config.model_dir);
            let embedder = topicpulse::topics::embeddings::SentenceEmbedder::load(&dir)?;
            Ok(Box::new(embedder))
        }
        EmbedderBackend::Hashing => {
            info!("Using feature-hashing embedder");
            Ok(Box::new(topicpulse::topics::hashing::HashingEmbedder::default()))
        }
    }
}
