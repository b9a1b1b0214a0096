//! Ordered entity label set.

use std::collections::HashMap;

use crate::error::{Result, TessenError};

/// Labels of the CoNLL-2003 reference setup.
pub const CONLL03_LABELS: &[&str] = &["O", "PER", "ORG", "LOC", "MISC"];

/// Ordered, immutable label set. Index 0 is the "no entity" label and
/// doubles as the padding label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
    index: HashMap<String, u32>,
}

impl LabelSet {
    /// Build a label set from an ordered list.
    ///
    /// # Errors
    /// Fails if the list is empty or names a label twice.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(TessenError::InvalidLabelSet("no labels given".into()));
        }

        let mut index = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if index.insert(label.clone(), i as u32).is_some() {
                return Err(TessenError::InvalidLabelSet(format!(
                    "label {label:?} appears twice"
                )));
            }
        }

        Ok(Self { labels, index })
    }

    /// The CoNLL-2003 label set (`O PER ORG LOC MISC`).
    pub fn conll03() -> Self {
        let labels: Vec<String> = CONLL03_LABELS.iter().map(|l| l.to_string()).collect();
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i as u32))
            .collect();
        Self { labels, index }
    }

    /// Index of `label`.
    ///
    /// # Errors
    /// [`TessenError::UnknownLabel`] if the label is not in the set.
    pub fn index_of(&self, label: &str) -> Result<u32> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| TessenError::UnknownLabel(label.to_string()))
    }

    /// Label name at `index`, if any.
    pub fn name(&self, index: u32) -> Option<&str> {
        self.labels.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::conll03()
    }
}
