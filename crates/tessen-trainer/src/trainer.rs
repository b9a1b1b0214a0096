//! Epoch loop: train on shuffled batches, evaluate on dev after every
//! epoch, evaluate on test once at the end.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use candle_core::Device;
use oorandom::Rand32;
use tessen_core::{Batch, Batcher, EmbeddingTable, EvalReport, LabelSet, SpanEvaluator};
use tracing::{debug, info};

use crate::config::TrainConfig;
use crate::model::NerModel;

/// Results of one training epoch.
#[derive(Debug, Clone)]
pub struct EpochSummary {
    pub epoch: usize,
    /// Mean loss over the epoch's batches.
    pub train_loss: f32,
    /// Mean token accuracy over the epoch's batches.
    pub train_accuracy: f32,
    pub dev: EvalReport,
    pub elapsed: Duration,
}

/// Results of a full run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub epochs: Vec<EpochSummary>,
    pub test: EvalReport,
}

pub struct Trainer {
    config: TrainConfig,
    embeddings: EmbeddingTable,
    labels: LabelSet,
    model: NerModel,
    device: Device,
    rng: Rand32,
}

impl Trainer {
    /// Load the embedding table named by `config` and build the network.
    pub fn new(config: TrainConfig) -> anyhow::Result<Self> {
        let embeddings = EmbeddingTable::load(&config.embedding_path, config.embedding_size)
            .context("failed to load word embeddings")?;
        Self::with_embeddings(config, embeddings)
    }

    /// Build the network around an already loaded embedding table.
    pub fn with_embeddings(
        config: TrainConfig,
        embeddings: EmbeddingTable,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            embeddings.dim() == config.embedding_size,
            "embedding table has dim {}, config expects {}",
            embeddings.dim(),
            config.embedding_size
        );

        let labels = LabelSet::new(config.labels.iter().cloned())?;
        let device = Device::Cpu;
        let model = NerModel::build(config.embedding_size, labels.len(), &config.network, &device)
            .context("failed to build network")?;

        info!("Model summary:");
        for line in model.summary() {
            info!("  {}", line);
        }

        let rng = Rand32::new(config.seed);
        Ok(Self {
            config,
            embeddings,
            labels,
            model,
            device,
            rng,
        })
    }

    /// Batch the corpus at `path` with the configured batch size.
    pub fn load_batches<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<Vec<Batch>> {
        let path = path.as_ref();
        Batcher::new(&self.embeddings, &self.labels, self.device.clone())
            .build_batches(path, self.config.batch_size)
            .with_context(|| format!("failed to batch {}", path.display()))
    }

    /// Run the configured train/dev/test files end to end.
    pub fn train(&mut self) -> anyhow::Result<TrainingOutcome> {
        let train = self.load_batches(&self.config.train_path)?;
        info!(
            "Load {} training batches from {}",
            train.len(),
            self.config.train_path.display()
        );

        let dev = self.load_batches(&self.config.dev_path)?;
        info!(
            "Load {} dev batches from {}",
            dev.len(),
            self.config.dev_path.display()
        );

        let test = self.load_batches(&self.config.test_path)?;
        info!(
            "Load {} test batches from {}",
            test.len(),
            self.config.test_path.display()
        );

        self.fit(&train, &dev, &test)
    }

    /// Train for the configured number of epochs on in-memory batches.
    pub fn fit(
        &mut self,
        train: &[Batch],
        dev: &[Batch],
        test: &[Batch],
    ) -> anyhow::Result<TrainingOutcome> {
        let epochs = self.config.epochs;
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut history = Vec::with_capacity(epochs);
        let start = Instant::now();

        for epoch in 1..=epochs {
            info!("Starting training epoch {}/{}", epoch, epochs);
            let epoch_start = Instant::now();

            shuffle(&mut order, &mut self.rng);
            let (train_loss, train_accuracy) = self.train_epoch(train, &order)?;
            let elapsed = epoch_start.elapsed();
            info!(
                "Epoch {}/{} loss={:.4} accuracy={:.2}%",
                epoch,
                epochs,
                train_loss,
                train_accuracy * 100.0
            );
            info!("Time used for epoch {}: {}", epoch, format_elapsed(elapsed));

            let dev_start = Instant::now();
            info!("Evaluating on dev set after epoch {}/{}:", epoch, epochs);
            let dev_report = self.evaluate(dev)?;
            info!(
                "Time used for evaluate on dev set: {}",
                format_elapsed(dev_start.elapsed())
            );

            history.push(EpochSummary {
                epoch,
                train_loss,
                train_accuracy,
                dev: dev_report,
                elapsed,
            });
        }

        info!("Training finished!");
        info!("Time used for training: {}", format_elapsed(start.elapsed()));

        info!("Evaluating on test set:");
        let test_start = Instant::now();
        let test_report = self.evaluate(test)?;
        info!(
            "Time used for evaluate on test set: {}",
            format_elapsed(test_start.elapsed())
        );

        Ok(TrainingOutcome {
            epochs: history,
            test: test_report,
        })
    }

    fn train_epoch(&mut self, batches: &[Batch], order: &[usize]) -> anyhow::Result<(f32, f32)> {
        let mut loss_sum = 0.0f32;
        let mut acc_sum = 0.0f32;
        let mut steps = 0usize;

        for &idx in order {
            let batch = &batches[idx];
            if batch.max_len() == 0 {
                debug!("Skipping batch {} with no tokens", idx);
                continue;
            }

            let step = self
                .model
                .train_step(&batch.embeddings, &batch.labels)
                .with_context(|| format!("optimizer step failed on batch {idx}"))?;
            loss_sum += step.loss;
            acc_sum += step.accuracy;
            steps += 1;
        }

        if steps == 0 {
            return Ok((0.0, 0.0));
        }
        Ok((loss_sum / steps as f32, acc_sum / steps as f32))
    }

    /// Score arg-max predictions against every batch's gold spans.
    pub fn evaluate(&self, batches: &[Batch]) -> anyhow::Result<EvalReport> {
        let mut evaluator = SpanEvaluator::new(self.labels.len());

        for batch in batches {
            if batch.max_len() == 0 {
                continue;
            }
            let predictions = self
                .model
                .predict(&batch.embeddings)
                .context("inference failed")?;
            evaluator.observe_batch(batch, &predictions)?;
        }

        let report = evaluator.report(self.config.aggregation);
        info!("F1 : {:.2}%", report.f1 * 100.0);
        info!("Precision: {:.2}%", report.precision * 100.0);
        info!("Recall: {:.2}%", report.recall * 100.0);
        for (i, counts) in report.per_label.iter().enumerate() {
            debug!(
                "  {:<6} gold={} tp={} fn={} fp={}",
                self.labels.name(i as u32).unwrap_or("?"),
                counts.occurrences,
                counts.tp,
                counts.fn_count,
                counts.fp
            );
        }

        Ok(report)
    }
}

/// In-place Fisher–Yates shuffle.
pub fn shuffle<T>(items: &mut [T], rng: &mut Rand32) {
    for i in (1..items.len()).rev() {
        let j = rng.rand_range(0..(i as u32 + 1)) as usize;
        items.swap(i, j);
    }
}

/// Formats a duration as whole minutes and seconds, e.g. `"2 m 5 s"`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{} m {} s", secs / 60, secs % 60)
}

/// Load everything named by `config`, train, and report.
pub fn run_training(config: TrainConfig) -> anyhow::Result<TrainingOutcome> {
    let mut trainer = Trainer::new(config)?;
    trainer.train()
}
