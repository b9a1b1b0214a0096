//! # Tessen Trainer
//!
//! BiGRU named-entity tagger built on candle, and the epoch loop that
//! trains it on span-annotated corpora and reports span-level F1.

pub mod config;
pub mod model;
pub mod trainer;

pub use config::{NetworkConfig, TrainConfig};
pub use model::{BiGru, NerModel, NerNetwork, StepMetrics};
pub use trainer::{
    EpochSummary, Trainer, TrainingOutcome, format_elapsed, run_training, shuffle,
};
