//! # Word Embeddings
//!
//! Loads pretrained word vectors from GloVe-style text files into an
//! in-memory table. Files ending in `.gz` are decompressed on the fly.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::info;

use crate::error::{Result, TessenError};

/// Immutable word → vector lookup table.
///
/// Every stored vector has exactly [`EmbeddingTable::dim`] components.
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
    zeros: Vec<f32>,
}

impl EmbeddingTable {
    /// Load embeddings from `path`, one `word v1 v2 ... vN` entry per line.
    ///
    /// # Errors
    /// Fails on I/O errors, unparsable floats, or any line whose vector
    /// length differs from `dim`.
    pub fn load<P: AsRef<Path>>(path: P, dim: usize) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading word embeddings from {}...", path.display());

        let file = File::open(path).map_err(|e| TessenError::io(path, e))?;
        let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let table = Self::from_reader(BufReader::new(reader), dim).map_err(|e| match e {
            TessenError::Io { source, .. } => TessenError::io(path, source),
            other => other,
        })?;

        info!(
            "Finished loading word embeddings ({} words, dim {})",
            table.len(),
            dim
        );
        Ok(table)
    }

    /// Parse embeddings from any buffered reader.
    ///
    /// The word is everything before the first space; a repeated word keeps
    /// its last vector. A blank line has no values and fails the dimension
    /// check like any other short line.
    pub fn from_reader<R: BufRead>(reader: R, dim: usize) -> Result<Self> {
        let mut vectors = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| TessenError::io("<reader>", e))?;
            let line_no = idx + 1;
            let line = line.trim_end();

            let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
            let vector = rest
                .split_whitespace()
                .map(|token| {
                    token.parse::<f32>().map_err(|_| TessenError::EmbeddingValue {
                        line: line_no,
                        token: token.to_string(),
                    })
                })
                .collect::<Result<Vec<f32>>>()?;

            if vector.len() != dim {
                return Err(TessenError::EmbeddingDimension {
                    line: line_no,
                    expected: dim,
                    found: vector.len(),
                });
            }

            vectors.insert(word.to_string(), vector);
        }

        Ok(Self {
            dim,
            vectors,
            zeros: vec![0.0; dim],
        })
    }

    /// Look up the vector for `word` exactly as given.
    ///
    /// Unknown words return the all-zero vector of length [`Self::dim`];
    /// a miss is never an error.
    pub fn lookup(&self, word: &str) -> &[f32] {
        self.vectors
            .get(word)
            .map(Vec::as_slice)
            .unwrap_or(self.zeros.as_slice())
    }

    /// Returns `true` if `word` has a stored vector.
    pub fn contains(&self, word: &str) -> bool {
        self.vectors.contains_key(word)
    }

    /// Vector dimensionality.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored words.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}
