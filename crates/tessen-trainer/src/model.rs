//! BiGRU sequence labeller.
//!
//! embeddings → dropout → N × BiGRU → M × (linear → dropout) → linear →
//! softmax over labels, applied per token. Trained with token-level sparse
//! categorical cross-entropy and Adam. Padding positions carry label 0 and
//! are not masked out of the loss.

use candle_core::{D, DType, Device, Module, ModuleT, Result, Tensor};
use candle_nn::rnn::GRUState;
use candle_nn::{
    AdamW, Dropout, GRU, GRUConfig, Linear, Optimizer, ParamsAdamW, RNN, VarBuilder, VarMap,
};

use crate::config::NetworkConfig;

/// Bidirectional GRU; output width is twice the hidden size.
pub struct BiGru {
    fwd: GRU,
    bwd: GRU,
}

impl BiGru {
    pub fn new(in_dim: usize, hidden: usize, vb: VarBuilder) -> Result<Self> {
        let fwd = candle_nn::gru(in_dim, hidden, GRUConfig::default(), vb.pp("forward"))?;
        let bwd = candle_nn::gru(in_dim, hidden, GRUConfig::default(), vb.pp("backward"))?;
        Ok(Self { fwd, bwd })
    }
}

impl Module for BiGru {
    /// `xs`: [batch, seq_len, in_dim] → [batch, seq_len, 2 * hidden]
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let fwd = stack_states(&self.fwd.seq(xs)?)?;

        let reversed = reverse_time(xs)?;
        let bwd = stack_states(&self.bwd.seq(&reversed)?)?;
        let bwd = reverse_time(&bwd)?;

        Tensor::cat(&[&fwd, &bwd], D::Minus1)
    }
}

/// Per-step hidden states → [batch, seq_len, hidden].
///
/// `GRU::states_to_tensor` concatenates along dim 1 and loses the time axis.
fn stack_states(states: &[GRUState]) -> Result<Tensor> {
    let hs: Vec<Tensor> = states.iter().map(|s| s.h().clone()).collect();
    Tensor::stack(&hs, 1)
}

fn reverse_time(xs: &Tensor) -> Result<Tensor> {
    let len = xs.dim(1)? as u32;
    let idx: Vec<u32> = (0..len).rev().collect();
    let idx = Tensor::new(idx.as_slice(), xs.device())?;
    xs.index_select(&idx, 1)
}

/// Per-token label scorer.
pub struct NerNetwork {
    embedding_dropout: Dropout,
    encoders: Vec<BiGru>,
    ffnn: Vec<Linear>,
    hidden_dropout: Dropout,
    scorer: Linear,
}

impl NerNetwork {
    pub fn new(
        embedding_size: usize,
        num_labels: usize,
        config: &NetworkConfig,
        vb: VarBuilder,
    ) -> Result<Self> {
        let mut encoders = Vec::with_capacity(config.gru_layers);
        let mut width = embedding_size;
        for i in 0..config.gru_layers {
            encoders.push(BiGru::new(width, config.hidden_size, vb.pp(format!("gru_{}", i + 1)))?);
            width = 2 * config.hidden_size;
        }

        let mut ffnn = Vec::with_capacity(config.ffnn_layers);
        for i in 0..config.ffnn_layers {
            ffnn.push(candle_nn::linear(
                width,
                config.ffnn_width,
                vb.pp(format!("ffnn_{}", i + 1)),
            )?);
            width = config.ffnn_width;
        }

        let scorer = candle_nn::linear(width, num_labels, vb.pp("ner_scores"))?;

        Ok(Self {
            embedding_dropout: Dropout::new(config.embedding_dropout),
            encoders,
            ffnn,
            hidden_dropout: Dropout::new(config.hidden_dropout),
            scorer,
        })
    }

    /// Label probabilities, [batch, seq_len, num_labels]. Dropout off.
    pub fn score(&self, xs: &Tensor) -> Result<Tensor> {
        let logits = self.forward_t(xs, false)?;
        candle_nn::ops::softmax(&logits, D::Minus1)
    }

    /// Arg-max label index per token.
    pub fn predict(&self, xs: &Tensor) -> Result<Vec<Vec<u32>>> {
        self.score(xs)?.argmax(D::Minus1)?.to_vec2::<u32>()
    }
}

impl ModuleT for NerNetwork {
    /// Unnormalized label scores, [batch, seq_len, num_labels].
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut hidden = self.embedding_dropout.forward_t(xs, train)?;
        for encoder in &self.encoders {
            hidden = encoder.forward(&hidden)?;
        }
        for layer in &self.ffnn {
            hidden = layer.forward(&hidden)?;
            hidden = self.hidden_dropout.forward_t(&hidden, train)?;
        }
        self.scorer.forward(&hidden)
    }
}

/// Token-level cross-entropy against integer labels.
///
/// `logits`: [batch, seq_len, num_labels], `labels`: [batch, seq_len] u32.
pub fn sparse_cross_entropy(logits: &Tensor, labels: &Tensor) -> Result<Tensor> {
    let (batch, seq_len, num_labels) = logits.dims3()?;
    let logits = logits.reshape((batch * seq_len, num_labels))?;
    let labels = labels.reshape(batch * seq_len)?;
    candle_nn::loss::cross_entropy(&logits, &labels)
}

/// Fraction of tokens whose arg-max label equals the gold label.
pub fn token_accuracy(logits: &Tensor, labels: &Tensor) -> Result<f32> {
    logits
        .argmax(D::Minus1)?
        .eq(labels)?
        .to_dtype(DType::F32)?
        .mean_all()?
        .to_scalar::<f32>()
}

/// Loss and accuracy of one optimizer step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub loss: f32,
    pub accuracy: f32,
}

/// Trainable network with its parameters and optimizer.
pub struct NerModel {
    varmap: VarMap,
    network: NerNetwork,
    optimizer: AdamW,
    embedding_size: usize,
    num_labels: usize,
    config: NetworkConfig,
}

impl NerModel {
    /// Build a freshly initialized model on `device`.
    pub fn build(
        embedding_size: usize,
        num_labels: usize,
        config: &NetworkConfig,
        device: &Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let network = NerNetwork::new(embedding_size, num_labels, config, vb)?;

        let optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: config.learning_rate,
                beta1: config.beta1,
                beta2: config.beta2,
                eps: config.eps,
                weight_decay: 0.0,
            },
        )?;

        Ok(Self {
            varmap,
            network,
            optimizer,
            embedding_size,
            num_labels,
            config: config.clone(),
        })
    }

    /// One forward/backward/update pass over a batch.
    pub fn train_step(&mut self, embeddings: &Tensor, labels: &Tensor) -> Result<StepMetrics> {
        let logits = self.network.forward_t(embeddings, true)?;
        let loss = sparse_cross_entropy(&logits, labels)?;
        self.optimizer.backward_step(&loss)?;

        Ok(StepMetrics {
            loss: loss.to_scalar::<f32>()?,
            accuracy: token_accuracy(&logits, labels)?,
        })
    }

    /// Loss without dropout or parameter updates.
    pub fn eval_loss(&self, embeddings: &Tensor, labels: &Tensor) -> Result<f32> {
        let logits = self.network.forward_t(embeddings, false)?;
        sparse_cross_entropy(&logits, labels)?.to_scalar::<f32>()
    }

    pub fn score(&self, embeddings: &Tensor) -> Result<Tensor> {
        self.network.score(embeddings)
    }

    pub fn predict(&self, embeddings: &Tensor) -> Result<Vec<Vec<u32>>> {
        self.network.predict(embeddings)
    }

    /// Total trainable scalar parameters.
    pub fn num_parameters(&self) -> usize {
        self.varmap.all_vars().iter().map(|v| v.elem_count()).sum()
    }

    /// One line per layer, for logging.
    pub fn summary(&self) -> Vec<String> {
        let c = &self.config;
        let mut lines = vec![format!(
            "word_embeddings: [batch, seq_len, {}] dropout={}",
            self.embedding_size, c.embedding_dropout
        )];
        for i in 0..c.gru_layers {
            lines.push(format!(
                "gru_{}: bidirectional GRU({}) -> {}",
                i + 1,
                c.hidden_size,
                2 * c.hidden_size
            ));
        }
        for i in 0..c.ffnn_layers {
            lines.push(format!(
                "ffnn_{}: linear -> {} dropout={}",
                i + 1,
                c.ffnn_width,
                c.hidden_dropout
            ));
        }
        lines.push(format!("ner_scores: linear -> {} softmax", self.num_labels));
        lines.push(format!("trainable parameters: {}", self.num_parameters()));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> NetworkConfig {
        NetworkConfig {
            embedding_dropout: 0.0,
            hidden_size: 4,
            ffnn_width: 6,
            hidden_dropout: 0.0,
            learning_rate: 1e-2,
            ..Default::default()
        }
    }

    fn inputs(device: &Device) -> (Tensor, Tensor) {
        let data: Vec<f32> = (0..2 * 3 * 5).map(|i| ((i % 7) as f32 - 3.0) * 0.3).collect();
        let xs = Tensor::from_vec(data, (2, 3, 5), device).unwrap();
        let labels = Tensor::new(&[[1u32, 0, 2], [0, 3, 0]], device).unwrap();
        (xs, labels)
    }

    #[test]
    fn test_bigru_output_shape() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let gru = BiGru::new(5, 4, vb).unwrap();
        let (xs, _) = inputs(&device);
        assert_eq!(gru.forward(&xs).unwrap().dims(), &[2, 3, 8]);
    }

    #[test]
    fn test_stacked_encoders_keep_time_axis() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let first = BiGru::new(5, 4, vb.pp("gru_1")).unwrap();
        let second = BiGru::new(8, 4, vb.pp("gru_2")).unwrap();
        let (xs, _) = inputs(&device);

        let hidden = first.forward(&xs).unwrap();
        assert_eq!(hidden.dims(), &[2, 3, 8]);
        assert_eq!(second.forward(&hidden).unwrap().dims(), &[2, 3, 8]);
    }

    #[test]
    fn test_dropout_only_in_training() {
        let device = Device::Cpu;
        let config = NetworkConfig {
            embedding_dropout: 0.5,
            hidden_dropout: 0.5,
            ..tiny_config()
        };
        let model = NerModel::build(5, 4, &config, &device).unwrap();
        let (xs, _) = inputs(&device);

        let first = model.score(&xs).unwrap().to_vec3::<f32>().unwrap();
        let second = model.score(&xs).unwrap().to_vec3::<f32>().unwrap();
        assert_eq!(first, second);

        let eval = model.network.forward_t(&xs, false).unwrap();
        let eval_again = model.network.forward_t(&xs, false).unwrap();
        assert_eq!(
            eval.to_vec3::<f32>().unwrap(),
            eval_again.to_vec3::<f32>().unwrap()
        );

        let train = model.network.forward_t(&xs, true).unwrap();
        assert_ne!(
            train.to_vec3::<f32>().unwrap(),
            eval.to_vec3::<f32>().unwrap()
        );
    }

    #[test]
    fn test_reverse_time() {
        let xs = Tensor::new(&[[[1f32], [2.], [3.]]], &Device::Cpu).unwrap();
        let rev = reverse_time(&xs).unwrap().flatten_all().unwrap();
        assert_eq!(rev.to_vec1::<f32>().unwrap(), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_score_is_distribution() {
        let device = Device::Cpu;
        let model = NerModel::build(5, 4, &tiny_config(), &device).unwrap();
        let (xs, _) = inputs(&device);

        let probs = model.score(&xs).unwrap();
        assert_eq!(probs.dims(), &[2, 3, 4]);
        for row in probs.to_vec3::<f32>().unwrap().iter().flatten() {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }

        let preds = model.predict(&xs).unwrap();
        assert_eq!(preds.len(), 2);
        assert!(preds.iter().flatten().all(|&p| p < 4));
    }

    #[test]
    fn test_parameter_count() {
        let cfg = tiny_config();
        let model = NerModel::build(5, 4, &cfg, &Device::Cpu).unwrap();
        // GRU: 3 gates × (h×in + h×h + 2h) per direction
        let gru = |i: usize, h: usize| 2 * 3 * (h * i + h * h + 2 * h);
        let expected = gru(5, 4) + gru(8, 4) + (8 * 6 + 6) + (6 * 6 + 6) + (6 * 4 + 4);
        assert_eq!(model.num_parameters(), expected);
        assert_eq!(model.summary().len(), 1 + 2 + 2 + 2);
    }

    #[test]
    fn test_training_reduces_loss() {
        let device = Device::Cpu;
        let mut model = NerModel::build(5, 4, &tiny_config(), &device).unwrap();
        let (xs, labels) = inputs(&device);

        let before = model.eval_loss(&xs, &labels).unwrap();
        for _ in 0..60 {
            let step = model.train_step(&xs, &labels).unwrap();
            assert!(step.loss.is_finite());
            assert!((0.0..=1.0).contains(&step.accuracy));
        }
        let after = model.eval_loss(&xs, &labels).unwrap();
        assert!(after < before, "loss did not drop: {before} -> {after}");
    }

    #[test]
    fn test_sparse_cross_entropy_uniform() {
        let device = Device::Cpu;
        let logits = Tensor::zeros((1, 2, 4), DType::F32, &device).unwrap();
        let labels = Tensor::new(&[[0u32, 3]], &device).unwrap();
        let loss = sparse_cross_entropy(&logits, &labels)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!((loss - 4f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_token_accuracy() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[[0f32, 1.], [1., 0.], [0., 1.]]], &device).unwrap();
        let labels = Tensor::new(&[[1u32, 0, 0]], &device).unwrap();
        let acc = token_accuracy(&logits, &labels).unwrap();
        assert!((acc - 2.0 / 3.0).abs() < 1e-6);
    }
}
