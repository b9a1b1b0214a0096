//! Training and network configuration.

use std::path::PathBuf;

use tessen_core::{Aggregation, CONLL03_LABELS};

/// Shape and optimizer settings of the BiGRU labeller.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Dropout on the raw word embeddings.
    pub embedding_dropout: f32,
    /// GRU units per direction.
    pub hidden_size: usize,
    /// Stacked bidirectional GRU layers.
    pub gru_layers: usize,
    /// Affine feed-forward layers after the encoder.
    pub ffnn_layers: usize,
    pub ffnn_width: usize,
    /// Dropout after each feed-forward layer.
    pub hidden_dropout: f32,
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            embedding_dropout: 0.5,
            hidden_size: 50,
            gru_layers: 2,
            ffnn_layers: 2,
            ffnn_width: 50,
            hidden_dropout: 0.2,
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-7,
        }
    }
}

/// Everything a training run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub embedding_path: PathBuf,
    pub embedding_size: usize,
    /// Ordered labels; the first one means "no entity".
    pub labels: Vec<String>,
    pub train_path: PathBuf,
    pub dev_path: PathBuf,
    pub test_path: PathBuf,
    pub epochs: usize,
    pub batch_size: usize,
    /// Seed for batch-order shuffling.
    pub seed: u64,
    pub aggregation: Aggregation,
    pub network: NetworkConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            embedding_path: PathBuf::from("glove.6B.100d.txt.ner.filtered"),
            embedding_size: 100,
            labels: CONLL03_LABELS.iter().map(|l| l.to_string()).collect(),
            train_path: PathBuf::from("train.conll03.json"),
            dev_path: PathBuf::from("dev.conll03.json"),
            test_path: PathBuf::from("test.conll03.json"),
            epochs: 5,
            batch_size: 100,
            seed: 42,
            aggregation: Aggregation::Micro,
            network: NetworkConfig::default(),
        }
    }
}
