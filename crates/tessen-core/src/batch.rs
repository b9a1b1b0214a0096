//! # Dataset Batcher
//!
//! Turns a span-annotated corpus into padded tensors for the network and a
//! set of gold spans for evaluation.
//!
//! Sentences are cut into contiguous chunks of `batch_size` in corpus
//! order. Each chunk is padded only up to its own longest sentence, so
//! batches differ in their second dimension.

use std::collections::BTreeSet;
use std::path::Path;

use candle_core::{Device, Tensor};
use tracing::debug;

use crate::corpus::Corpus;
use crate::embedding::EmbeddingTable;
use crate::error::{Result, TessenError};
use crate::labels::LabelSet;

/// A gold entity span inside a batch. `end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GoldSpan {
    /// Sentence index within the batch.
    pub sentence: usize,
    pub start: usize,
    pub end: usize,
    /// Label index in the [`LabelSet`].
    pub label: u32,
}

/// One padded chunk of the corpus.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[batch, max_len, embedding_size]` f32, zero beyond each sentence.
    pub embeddings: Tensor,
    /// `[batch, max_len]` u32 label indices; padding and non-entities are 0.
    pub labels: Tensor,
    /// Gold spans, duplicates collapsed.
    pub gold: BTreeSet<GoldSpan>,
    /// True token count of each sentence.
    pub lengths: Vec<usize>,
}

impl Batch {
    /// Number of sentences in the batch.
    pub fn size(&self) -> usize {
        self.lengths.len()
    }

    /// Chunk-local padded length.
    pub fn max_len(&self) -> usize {
        self.lengths.iter().copied().max().unwrap_or(0)
    }
}

/// Builds [`Batch`]es from corpora using a shared embedding table and
/// label set.
#[derive(Debug, Clone)]
pub struct Batcher<'a> {
    embeddings: &'a EmbeddingTable,
    labels: &'a LabelSet,
    device: Device,
}

impl<'a> Batcher<'a> {
    pub fn new(embeddings: &'a EmbeddingTable, labels: &'a LabelSet, device: Device) -> Self {
        Self {
            embeddings,
            labels,
            device,
        }
    }

    /// Load the corpus at `path` and cut it into batches.
    pub fn build_batches<P: AsRef<Path>>(&self, path: P, batch_size: usize) -> Result<Vec<Batch>> {
        let corpus = Corpus::read(path)?;
        self.batches_from_corpus(&corpus, batch_size)
    }

    /// Cut an in-memory corpus into batches.
    ///
    /// # Errors
    /// Fails on a zero batch size, a malformed corpus, or a label outside
    /// the label set.
    pub fn batches_from_corpus(&self, corpus: &Corpus, batch_size: usize) -> Result<Vec<Batch>> {
        if batch_size == 0 {
            return Err(TessenError::InvalidBatchSize);
        }
        corpus.validate()?;

        let mut batches = Vec::with_capacity(corpus.len().div_ceil(batch_size));
        for (sentences, ners) in corpus
            .sentences
            .chunks(batch_size)
            .zip(corpus.ners.chunks(batch_size))
        {
            batches.push(self.build_batch(sentences, ners)?);
        }

        debug!(
            "Built {} batches from {} sentences (batch size {})",
            batches.len(),
            corpus.len(),
            batch_size
        );
        Ok(batches)
    }

    fn build_batch(
        &self,
        sentences: &[Vec<String>],
        ners: &[Vec<crate::corpus::Annotation>],
    ) -> Result<Batch> {
        let dim = self.embeddings.dim();
        let lengths: Vec<usize> = sentences.iter().map(Vec::len).collect();
        let max_len = lengths.iter().copied().max().unwrap_or(0);
        let size = sentences.len();

        let mut word_emb = vec![0.0f32; size * max_len * dim];
        for (i, sentence) in sentences.iter().enumerate() {
            for (j, word) in sentence.iter().enumerate() {
                let offset = (i * max_len + j) * dim;
                word_emb[offset..offset + dim]
                    .copy_from_slice(self.embeddings.lookup(&word.to_lowercase()));
            }
        }

        let mut word_labels = vec![0u32; size * max_len];
        let mut gold = BTreeSet::new();
        for (i, spans) in ners.iter().enumerate() {
            for span in spans {
                let label = self.labels.index_of(&span.label)?;
                gold.insert(GoldSpan {
                    sentence: i,
                    start: span.start,
                    end: span.end,
                    label,
                });
                // later spans overwrite earlier ones where they overlap
                let row = i * max_len;
                word_labels[row + span.start..=row + span.end].fill(label);
            }
        }

        Ok(Batch {
            embeddings: Tensor::from_vec(word_emb, (size, max_len, dim), &self.device)?,
            labels: Tensor::from_vec(word_labels, (size, max_len), &self.device)?,
            gold,
            lengths,
        })
    }
}
