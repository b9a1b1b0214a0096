//! Train and evaluate the BiGRU NER tagger.

use std::path::PathBuf;

use clap::Parser;
use tessen_core::Aggregation;
use tessen_trainer::{NetworkConfig, TrainConfig, run_training};
use tracing::info;

/// CLI arguments
#[derive(Parser)]
#[command(name = "tessen-train")]
#[command(about = "Train a BiGRU named-entity tagger and report span-level F1")]
#[command(version)]
struct Cli {
    /// Word embedding file (`word v1 ... vN` per line, optionally gzipped)
    #[arg(short, long, env = "TESSEN_EMBEDDINGS", default_value = "glove.6B.100d.txt.ner.filtered")]
    embeddings: PathBuf,

    /// Embedding dimensionality
    #[arg(short = 'd', long, env = "TESSEN_EMBEDDING_SIZE", default_value_t = 100)]
    embedding_size: usize,

    /// Comma-separated labels; the first one means "no entity"
    #[arg(short, long, env = "TESSEN_LABELS", value_delimiter = ',', default_value = "O,PER,ORG,LOC,MISC")]
    labels: Vec<String>,

    /// Training corpus
    #[arg(long, env = "TESSEN_TRAIN", default_value = "train.conll03.json")]
    train: PathBuf,

    /// Development corpus, evaluated after every epoch
    #[arg(long, env = "TESSEN_DEV", default_value = "dev.conll03.json")]
    dev: PathBuf,

    /// Test corpus, evaluated once after training
    #[arg(long, env = "TESSEN_TEST", default_value = "test.conll03.json")]
    test: PathBuf,

    /// Number of epochs
    #[arg(short = 'n', long, env = "TESSEN_EPOCHS", default_value_t = 5)]
    epochs: usize,

    /// Sentences per batch
    #[arg(short, long, env = "TESSEN_BATCH_SIZE", default_value_t = 100)]
    batch_size: usize,

    /// Seed for batch-order shuffling
    #[arg(short, long, env = "TESSEN_SEED", default_value_t = 42)]
    seed: u64,

    /// How per-label counts are folded: `micro` or `occurrence-weighted`
    #[arg(short, long, env = "TESSEN_AGGREGATION", default_value = "micro")]
    aggregation: Aggregation,

    /// Adam learning rate
    #[arg(long, env = "TESSEN_LEARNING_RATE", default_value_t = 1e-3)]
    learning_rate: f64,
}

impl From<Cli> for TrainConfig {
    fn from(cli: Cli) -> Self {
        Self {
            embedding_path: cli.embeddings,
            embedding_size: cli.embedding_size,
            labels: cli.labels,
            train_path: cli.train,
            dev_path: cli.dev,
            test_path: cli.test,
            epochs: cli.epochs,
            batch_size: cli.batch_size,
            seed: cli.seed,
            aggregation: cli.aggregation,
            network: NetworkConfig {
                learning_rate: cli.learning_rate,
                ..Default::default()
            },
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let config = TrainConfig::from(Cli::parse());
    match run_training(config) {
        Ok(outcome) => info!("Test: {}", outcome.test),
        Err(e) => {
            eprintln!("Training failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
