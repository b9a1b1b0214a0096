//! # Span Evaluation
//!
//! Scores arg-max token predictions against gold entity spans.
//!
//! A gold span `(sentence, start, end, label)` is a true positive when the
//! predicted label at `start` and the predicted label at `end` both equal
//! `label`. Interior tokens are not inspected. A miss counts one false
//! negative for the gold label and one false positive for whatever label
//! was predicted at `start`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::batch::{Batch, GoldSpan};
use crate::error::{Result, TessenError};

/// How per-label counters are folded into corpus totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    /// Plain sums over labels.
    #[default]
    Micro,
    /// Each label's counters are multiplied by that label's gold
    /// occurrence count before summing.
    OccurrenceWeighted,
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "micro" => Ok(Self::Micro),
            "occurrence-weighted" | "weighted" => Ok(Self::OccurrenceWeighted),
            other => Err(format!(
                "unknown aggregation {other:?} (expected `micro` or `occurrence-weighted`)"
            )),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Micro => write!(f, "micro"),
            Self::OccurrenceWeighted => write!(f, "occurrence-weighted"),
        }
    }
}

/// Counters for a single label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelCounts {
    /// Gold spans carrying this label.
    pub occurrences: u64,
    pub tp: u64,
    pub fn_count: u64,
    /// Missed gold spans whose start token was predicted as this label.
    pub fp: u64,
}

/// Accumulates span judgements over any number of batches.
#[derive(Debug, Clone)]
pub struct SpanEvaluator {
    counts: Vec<LabelCounts>,
}

impl SpanEvaluator {
    pub fn new(num_labels: usize) -> Self {
        Self {
            counts: vec![LabelCounts::default(); num_labels],
        }
    }

    /// Score one batch given its per-sentence predicted label indices.
    pub fn observe_batch(&mut self, batch: &Batch, predictions: &[Vec<u32>]) -> Result<()> {
        self.observe(&batch.gold, predictions)
    }

    /// Score gold spans against per-sentence predicted label indices.
    ///
    /// # Errors
    /// [`TessenError::PredictionShape`] if a span points outside
    /// `predictions` or a label index exceeds the label count.
    pub fn observe(&mut self, gold: &BTreeSet<GoldSpan>, predictions: &[Vec<u32>]) -> Result<()> {
        let num_labels = self.counts.len();

        for span in gold {
            let row = predictions.get(span.sentence).ok_or_else(|| {
                TessenError::PredictionShape(format!(
                    "no predictions for sentence {} ({} rows)",
                    span.sentence,
                    predictions.len()
                ))
            })?;
            let (Some(&start_pred), Some(&end_pred)) = (row.get(span.start), row.get(span.end))
            else {
                return Err(TessenError::PredictionShape(format!(
                    "span [{}, {}] exceeds prediction row of length {}",
                    span.start,
                    span.end,
                    row.len()
                )));
            };

            for label in [span.label, start_pred, end_pred] {
                if label as usize >= num_labels {
                    return Err(TessenError::PredictionShape(format!(
                        "label index {label} outside {num_labels} labels"
                    )));
                }
            }

            let gold_counts = &mut self.counts[span.label as usize];
            gold_counts.occurrences += 1;
            if start_pred == span.label && end_pred == span.label {
                gold_counts.tp += 1;
            } else {
                gold_counts.fn_count += 1;
                self.counts[start_pred as usize].fp += 1;
            }
        }

        Ok(())
    }

    /// Per-label counters, indexed by label.
    pub fn counts(&self) -> &[LabelCounts] {
        &self.counts
    }

    /// Fold the counters into precision, recall and F1.
    pub fn report(&self, aggregation: Aggregation) -> EvalReport {
        let weight = |c: &LabelCounts| match aggregation {
            Aggregation::Micro => 1,
            Aggregation::OccurrenceWeighted => c.occurrences,
        };

        let tp: u64 = self.counts.iter().map(|c| c.tp * weight(c)).sum();
        let fp: u64 = self.counts.iter().map(|c| c.fp * weight(c)).sum();
        let fn_count: u64 = self.counts.iter().map(|c| c.fn_count * weight(c)).sum();

        let (precision, recall, f1) = if tp == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let p = tp as f64 / (tp + fp) as f64;
            let r = tp as f64 / (tp + fn_count) as f64;
            (p, r, 2.0 * p * r / (p + r))
        };

        EvalReport {
            per_label: self.counts.clone(),
            aggregation,
            tp,
            fp,
            fn_count,
            precision,
            recall,
            f1,
        }
    }
}

/// Corpus-level evaluation result.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    pub per_label: Vec<LabelCounts>,
    pub aggregation: Aggregation,
    pub tp: u64,
    pub fp: u64,
    pub fn_count: u64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "F1: {:.2}% Precision: {:.2}% Recall: {:.2}% (tp={} fp={} fn={}, {})",
            self.f1 * 100.0,
            self.precision * 100.0,
            self.recall * 100.0,
            self.tp,
            self.fp,
            self.fn_count,
            self.aggregation,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(sentence: usize, start: usize, end: usize, label: u32) -> GoldSpan {
        GoldSpan {
            sentence,
            start,
            end,
            label,
        }
    }

    fn gold(spans: &[GoldSpan]) -> BTreeSet<GoldSpan> {
        spans.iter().copied().collect()
    }

    #[test]
    fn test_start_and_end_match_is_tp() {
        let mut eval = SpanEvaluator::new(5);
        eval.observe(&gold(&[span(0, 1, 2, 1)]), &[vec![0, 1, 1, 0]])
            .unwrap();

        let c = eval.counts()[1];
        assert_eq!((c.occurrences, c.tp, c.fn_count, c.fp), (1, 1, 0, 0));

        let report = eval.report(Aggregation::Micro);
        assert!((report.precision - 1.0).abs() < 1e-9);
        assert!((report.recall - 1.0).abs() < 1e-9);
        assert!((report.f1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_end_mismatch_credits_start_prediction() {
        let mut eval = SpanEvaluator::new(5);
        eval.observe(&gold(&[span(0, 1, 2, 1)]), &[vec![0, 1, 0, 0]])
            .unwrap();
        assert_eq!(eval.counts()[1].fn_count, 1);
        assert_eq!(eval.counts()[1].fp, 1);
    }

    #[test]
    fn test_start_mismatch_is_fp_for_predicted_label() {
        let mut eval = SpanEvaluator::new(5);
        eval.observe(&gold(&[span(0, 1, 2, 1)]), &[vec![0, 2, 1, 0]])
            .unwrap();

        assert_eq!(eval.counts()[1].fn_count, 1);
        assert_eq!(eval.counts()[1].tp, 0);
        assert_eq!(eval.counts()[2].fp, 1);
        assert_eq!(eval.counts()[2].occurrences, 0);
    }

    #[test]
    fn test_interior_tokens_are_ignored() {
        let mut eval = SpanEvaluator::new(5);
        eval.observe(&gold(&[span(0, 0, 3, 3)]), &[vec![3, 0, 4, 3]])
            .unwrap();
        assert_eq!(eval.counts()[3].tp, 1);
    }

    #[test]
    fn test_zero_tp_reports_zero() {
        let mut eval = SpanEvaluator::new(5);
        eval.observe(
            &gold(&[span(0, 0, 0, 1), span(1, 1, 1, 2)]),
            &[vec![0, 0], vec![0, 0]],
        )
        .unwrap();

        for aggregation in [Aggregation::Micro, Aggregation::OccurrenceWeighted] {
            let report = eval.report(aggregation);
            assert_eq!(report.tp, 0);
            assert_eq!(report.precision, 0.0);
            assert_eq!(report.recall, 0.0);
            assert_eq!(report.f1, 0.0);
        }

        let empty = SpanEvaluator::new(5).report(Aggregation::Micro);
        assert_eq!(empty.f1, 0.0);
    }

    #[test]
    fn test_micro_vs_weighted() {
        // PER: 2 gold, 1 tp, 1 fn (start predicted O)
        // LOC: 1 gold, 1 tp
        let mut eval = SpanEvaluator::new(5);
        eval.observe(
            &gold(&[span(0, 0, 0, 1), span(0, 2, 2, 1), span(1, 0, 1, 3)]),
            &[vec![1, 0, 0], vec![3, 3]],
        )
        .unwrap();

        let micro = eval.report(Aggregation::Micro);
        assert_eq!((micro.tp, micro.fp, micro.fn_count), (2, 1, 1));
        assert!((micro.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((micro.recall - 2.0 / 3.0).abs() < 1e-9);

        // tp = 1*2 + 1*1, fn = 1*2, fp lands on O which has no occurrences
        let weighted = eval.report(Aggregation::OccurrenceWeighted);
        assert_eq!((weighted.tp, weighted.fp, weighted.fn_count), (3, 0, 2));
        assert!((weighted.precision - 1.0).abs() < 1e-9);
        assert!((weighted.recall - 3.0 / 5.0).abs() < 1e-9);
        assert!((weighted.f1 - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_counts_accumulate_across_batches() {
        let mut eval = SpanEvaluator::new(5);
        let g = gold(&[span(0, 0, 0, 2)]);
        eval.observe(&g, &[vec![2]]).unwrap();
        eval.observe(&g, &[vec![0]]).unwrap();
        let c = eval.counts()[2];
        assert_eq!((c.occurrences, c.tp, c.fn_count), (2, 1, 1));
        assert_eq!(eval.counts()[0].fp, 1);
    }

    #[test]
    fn test_shape_errors() {
        let mut eval = SpanEvaluator::new(5);
        assert!(eval.observe(&gold(&[span(1, 0, 0, 1)]), &[vec![0]]).is_err());
        assert!(eval.observe(&gold(&[span(0, 0, 3, 1)]), &[vec![0, 1]]).is_err());
        assert!(eval.observe(&gold(&[span(0, 0, 0, 1)]), &[vec![9]]).is_err());
    }

    #[test]
    fn test_aggregation_parse() {
        assert_eq!("micro".parse::<Aggregation>().unwrap(), Aggregation::Micro);
        assert_eq!(
            "Occurrence-Weighted".parse::<Aggregation>().unwrap(),
            Aggregation::OccurrenceWeighted
        );
        assert!("macro".parse::<Aggregation>().is_err());
        assert_eq!(Aggregation::OccurrenceWeighted.to_string(), "occurrence-weighted");
    }

    #[test]
    fn test_report_display() {
        let mut eval = SpanEvaluator::new(2);
        eval.observe(&gold(&[span(0, 0, 0, 1)]), &[vec![1]]).unwrap();
        let text = eval.report(Aggregation::Micro).to_string();
        assert!(text.starts_with("F1: 100.00% Precision: 100.00% Recall: 100.00%"));
    }
}
