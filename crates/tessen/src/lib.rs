//! # Tessen
//!
//! Named-entity recognition training harness: load pretrained word
//! embeddings, batch span-annotated corpora, train a BiGRU tagger with
//! candle, and score it with span-level precision/recall/F1.
//!
//! See [`tessen_core`] for the data side and [`tessen_trainer`] for the
//! network and epoch loop.

pub use tessen_core::*;
pub use tessen_trainer as trainer;
pub use tessen_trainer::{NetworkConfig, TrainConfig, Trainer, run_training};
