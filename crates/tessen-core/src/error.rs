use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading embeddings, batching a corpus or
/// scoring predictions.
#[derive(Debug, Error)]
pub enum TessenError {
    /// A file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An embedding line carried the wrong number of components.
    #[error("embedding line {line}: expected {expected} values, found {found}")]
    EmbeddingDimension {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// An embedding component was not a float.
    #[error("embedding line {line}: cannot parse {token:?} as a float")]
    EmbeddingValue { line: usize, token: String },

    /// The corpus document is not valid JSON or lacks `sentences`/`ners`.
    #[error("malformed corpus: {0}")]
    Corpus(#[from] serde_json::Error),

    /// `sentences` and `ners` are not parallel.
    #[error("corpus has {sentences} sentences but {ners} annotation lists")]
    CorpusMismatch { sentences: usize, ners: usize },

    /// An annotation names a label outside the configured label set.
    #[error("unknown label {0:?}")]
    UnknownLabel(String),

    /// An annotation does not fit inside its sentence.
    #[error("span [{start}, {end}] does not fit sentence {sentence} of length {len}")]
    SpanOutOfBounds {
        sentence: usize,
        start: usize,
        end: usize,
        len: usize,
    },

    /// The label set is empty or repeats a label.
    #[error("invalid label set: {0}")]
    InvalidLabelSet(String),

    /// Batch size must be at least one sentence.
    #[error("batch size must be positive")]
    InvalidBatchSize,

    /// Predictions do not line up with the batch they score.
    #[error("prediction shape mismatch: {0}")]
    PredictionShape(String),

    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),
}

impl TessenError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for Tessen core operations.
pub type Result<T> = std::result::Result<T, TessenError>;
