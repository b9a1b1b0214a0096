//! # Tessen Core
//!
//! Data side of the Tessen NER harness: pretrained word embeddings,
//! span-annotated corpora, padded per-chunk batches, and span-level
//! precision/recall/F1 scoring.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::io::Cursor;
//! use candle_core::Device;
//! use tessen_core::{Batcher, Corpus, EmbeddingTable, LabelSet};
//!
//! let table = EmbeddingTable::from_reader(Cursor::new("eu 1 0\ngerman 0 1\n"), 2).unwrap();
//! let labels = LabelSet::conll03();
//! let corpus = Corpus::from_json(
//!     r#"{"sentences": [["EU", "rejects", "German", "call"]], "ners": [[[0, 0, "ORG"]]]}"#,
//! )
//! .unwrap();
//!
//! let batches = Batcher::new(&table, &labels, Device::Cpu)
//!     .batches_from_corpus(&corpus, 100)
//!     .unwrap();
//! assert_eq!(batches[0].embeddings.dims(), &[1, 4, 2]);
//! ```
pub mod batch;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod labels;

// Re-export primary API
pub use batch::{Batch, Batcher, GoldSpan};
pub use corpus::{Annotation, Corpus};
pub use embedding::EmbeddingTable;
pub use error::{Result, TessenError};
pub use eval::{Aggregation, EvalReport, LabelCounts, SpanEvaluator};
pub use labels::{CONLL03_LABELS, LabelSet};
