//! # Corpus Reader
//!
//! Reads span-annotated corpora stored as a single JSON document:
//!
//! ```json
//! {"sentences": [["EU", "rejects", "German", "call"]],
//!  "ners": [[[0, 0, "ORG"], [2, 2, "MISC"]]]}
//! ```
//!
//! Keys other than `sentences` and `ners` are ignored.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TessenError};

/// An entity annotation over token offsets, `end` inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(usize, usize, String)", into = "(usize, usize, String)")]
pub struct Annotation {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

impl Annotation {
    pub fn new(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }
}

impl From<(usize, usize, String)> for Annotation {
    fn from((start, end, label): (usize, usize, String)) -> Self {
        Self { start, end, label }
    }
}

impl From<Annotation> for (usize, usize, String) {
    fn from(a: Annotation) -> Self {
        (a.start, a.end, a.label)
    }
}

/// Tokenized sentences with their parallel entity annotations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Corpus {
    pub sentences: Vec<Vec<String>>,
    pub ners: Vec<Vec<Annotation>>,
}

impl Corpus {
    /// Read and validate a corpus file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let corpus = Self::read(path)?;
        corpus.validate()?;
        Ok(corpus)
    }

    /// Deserialize a corpus file without checking it.
    pub(crate) fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TessenError::io(path, e))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Parse and validate a corpus held in memory.
    pub fn from_json(json: &str) -> Result<Self> {
        let corpus: Self = serde_json::from_str(json)?;
        corpus.validate()?;
        Ok(corpus)
    }

    /// Check that `sentences` and `ners` are parallel and every span lies
    /// inside its sentence.
    pub fn validate(&self) -> Result<()> {
        if self.sentences.len() != self.ners.len() {
            return Err(TessenError::CorpusMismatch {
                sentences: self.sentences.len(),
                ners: self.ners.len(),
            });
        }

        for (i, (sentence, spans)) in self.sentences.iter().zip(&self.ners).enumerate() {
            for span in spans {
                if span.start > span.end || span.end >= sentence.len() {
                    return Err(TessenError::SpanOutOfBounds {
                        sentence: i,
                        start: span.start,
                        end: span.end,
                        len: sentence.len(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Number of sentences.
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}
