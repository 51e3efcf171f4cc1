use std::time::Instant;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::dataset::Dataset;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::layers::Mode;
use crate::loss::loss_type::LossType;
use crate::model::regressor::Regressor;
use crate::model::state_dict::StateDict;
use crate::optim::{ExponentialLr, Optimizer};
use crate::train::early_stopping::EarlyStopping;
use crate::train::epoch_stats::{EpochStats, TrainStats, ValidStats};
use crate::train::metrics::MetricAccumulator;
use crate::train::train_config::{Selection, TrainConfig};

/// Result of a completed run, with the best snapshot restored into `model`.
#[derive(Debug)]
pub struct TrainOutcome<M> {
    pub model: M,
    /// Per-epoch mean training loss.
    pub train_loss: Vec<f64>,
    /// Per-epoch mean validation loss.
    pub val_loss: Vec<f64>,
    /// Validation pass of the restored best model.
    pub test: ValidStats,
    pub history: Vec<EpochStats>,
    /// 1-based epoch of the restored snapshot.
    pub best_epoch: usize,
    pub stopped_early: bool,
}

/// Scores of the epoch that produced the current best snapshot.
#[derive(Debug, Clone, Copy)]
struct Best {
    epoch: usize,
    train_accuracy: f64,
    val_accuracy: f64,
    val_loss: f64,
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// Drives one training run of a `Regressor`: mini-batch updates, validation,
/// best-snapshot selection, learning-rate decay and early stopping.
pub struct Trainer<M: Regressor> {
    model: M,
    config: TrainConfig,
    device: Device,
    optimizer: Box<dyn Optimizer>,
    scheduler: ExponentialLr,
    early_stopping: EarlyStopping,
    rng: StdRng,
    best: Option<Best>,
    snapshot: Option<StateDict>,
    history: Vec<EpochStats>,
    stopped_early: bool,
}

impl<M: Regressor> Trainer<M> {
    /// Validates `config`, resolves the device and binds a fresh optimiser,
    /// scheduler and early-stopping state to `model`.
    pub fn new(model: M, config: TrainConfig) -> Result<Self> {
        config.validate()?;
        let device = config.device.resolve()?;
        let optimizer = config.optimizer.build(config.learning_rate);
        let scheduler = ExponentialLr::new(optimizer.as_ref(), config.lr_gamma);
        let early_stopping = EarlyStopping::new(config.patience, config.stop_direction, config.min_delta)?;
        info!(
            "trainer on {}: {} trainable parameters, {:?} optimiser, lr {}, {:?} loss",
            device,
            model.trainable_len(),
            config.optimizer,
            config.learning_rate,
            config.loss
        );
        Ok(Trainer {
            model,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            device,
            optimizer,
            scheduler,
            early_stopping,
            best: None,
            snapshot: None,
            history: Vec::new(),
            stopped_early: false,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn history(&self) -> &[EpochStats] {
        &self.history
    }

    pub fn early_stopping(&self) -> &EarlyStopping {
        &self.early_stopping
    }

    /// Deep copy of the best parameters recorded so far.
    pub fn best_state(&self) -> Option<&StateDict> {
        self.snapshot.as_ref()
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    /// Runs up to `config.epochs` epochs and finalises the run.
    pub fn fit(mut self, train: &Dataset<M::Input>, valid: &Dataset<M::Input>) -> Result<TrainOutcome<M>> {
        if train.is_empty() || valid.is_empty() {
            return Err(Error::Data(format!(
                "training needs non-empty datasets ({} train, {} validation samples)",
                train.len(),
                valid.len()
            )));
        }
        for epoch in 1..=self.config.epochs {
            if self.run_epoch(epoch, train, valid)? {
                break;
            }
        }
        self.finalize(valid)
    }

    /// One full epoch: train, validate, checkpoint decision, LR decay and the
    /// early-stopping check. Returns whether the run should stop.
    pub fn run_epoch(&mut self, epoch: usize, train: &Dataset<M::Input>, valid: &Dataset<M::Input>) -> Result<bool> {
        let t_start = Instant::now();
        let learning_rate = self.optimizer.learning_rate();

        let train_stats = self.train_step(train);
        let valid_stats = self.valid_step(valid);

        let improved = self.is_improvement(&train_stats, &valid_stats);
        if improved {
            self.record_best(epoch, &train_stats, &valid_stats)?;
        }

        self.scheduler.step(self.optimizer.as_mut());
        let stop = self.early_stopping.observe(valid_stats.loss);
        self.stopped_early = stop && epoch < self.config.epochs;

        let elapsed_ms = t_start.elapsed().as_millis() as u64;
        info!(
            "epoch {}/{} ({} ms): train loss {:.4} acc {:.2}% | val loss {:.4} acc {:.2}% mae {:.3} rmse {:.3}{}",
            epoch,
            self.config.epochs,
            elapsed_ms,
            train_stats.loss,
            train_stats.accuracy,
            valid_stats.loss,
            valid_stats.accuracy,
            valid_stats.mae,
            valid_stats.rmse,
            if improved { " *" } else { "" }
        );
        self.history.push(EpochStats {
            epoch,
            total_epochs: self.config.epochs,
            train: train_stats,
            valid: valid_stats,
            learning_rate,
            improved,
            elapsed_ms,
        });
        Ok(stop)
    }

    /// One optimiser step per batch over a (shuffled) pass of `data`.
    pub fn train_step(&mut self, data: &Dataset<M::Input>) -> TrainStats {
        let loss = self.config.loss;
        let mut acc = MetricAccumulator::default();
        let order = data.order(self.config.shuffle, &mut self.rng);

        for batch in order.chunks(self.config.batch_size) {
            self.model.zero_grad();
            let mut predictions = Vec::with_capacity(batch.len());
            let mut targets = Vec::with_capacity(batch.len());
            for &idx in batch {
                let (input, target) = data.get(idx);
                let pred = self.model.forward(input, Mode::Train);
                self.model.backward(loss.sample_gradient(pred, target, batch.len()));
                predictions.push(pred);
                targets.push(target);
            }
            self.optimizer.step(self.model.params_mut());
            acc.add_batch(loss.batch_loss(&predictions, &targets), &predictions, &targets);
        }
        acc.train_stats()
    }

    pub fn valid_step(&mut self, data: &Dataset<M::Input>) -> ValidStats {
        evaluate(&mut self.model, data, self.config.loss, self.config.batch_size)
    }

    fn is_improvement(&self, train: &TrainStats, valid: &ValidStats) -> bool {
        match (self.config.selection, self.best) {
            (Selection::Accuracy, _) if valid.accuracy.is_nan() => false,
            (Selection::ValLoss, _) if valid.loss.is_nan() => false,
            (_, None) => true,
            (Selection::Accuracy, Some(best)) => {
                valid.accuracy > best.val_accuracy
                    || (valid.accuracy == best.val_accuracy && train.accuracy >= best.train_accuracy)
            }
            (Selection::ValLoss, Some(best)) => valid.loss < best.val_loss,
        }
    }

    fn record_best(&mut self, epoch: usize, train: &TrainStats, valid: &ValidStats) -> Result<()> {
        let state = self.model.state_dict();
        if let Some(path) = &self.config.checkpoint_path {
            state.save_json(path)?;
            debug!("checkpoint written to {}", path.display());
        }
        info!(
            "new best at epoch {}: train acc {:.2}%, val acc {:.2}%, mae {:.3}, rmse {:.3}",
            epoch, train.accuracy, valid.accuracy, valid.mae, valid.rmse
        );
        self.snapshot = Some(state);
        self.best = Some(Best {
            epoch,
            train_accuracy: train.accuracy,
            val_accuracy: valid.accuracy,
            val_loss: valid.loss,
        });
        Ok(())
    }

    /// Restores the best snapshot (from the checkpoint file when one is
    /// configured) and re-runs validation on it.
    pub fn finalize(mut self, valid: &Dataset<M::Input>) -> Result<TrainOutcome<M>> {
        let (best, snapshot) = match (self.best, self.snapshot.take()) {
            (Some(best), Some(snapshot)) => (best, snapshot),
            _ => {
                return Err(Error::State(format!(
                    "no best snapshot was recorded after {} epoch(s)",
                    self.history.len()
                )))
            }
        };
        let state = match &self.config.checkpoint_path {
            Some(path) => StateDict::load_json(path).map_err(|e| {
                Error::State(format!("cannot read checkpoint {}: {}", path.display(), e))
            })?,
            None => snapshot,
        };
        self.model.load_state_dict(&state)?;

        let test = self.valid_step(valid);
        info!(
            "best epoch {}: loss {:.4} | accuracy {:.2}% | mae {:.3} | rmse {:.3}",
            best.epoch, test.loss, test.accuracy, test.mae, test.rmse
        );
        Ok(TrainOutcome {
            model: self.model,
            train_loss: self.history.iter().map(|s| s.train.loss).collect(),
            val_loss: self.history.iter().map(|s| s.valid.loss).collect(),
            test,
            history: self.history,
            best_epoch: best.epoch,
            stopped_early: self.stopped_early,
        })
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluation-mode pass over `data` without parameter updates.
pub fn evaluate<M: Regressor>(model: &mut M, data: &Dataset<M::Input>, loss: LossType, batch_size: usize) -> ValidStats {
    let mut acc = MetricAccumulator::default();
    let indices: Vec<usize> = (0..data.len()).collect();
    for batch in indices.chunks(batch_size.max(1)) {
        let mut predictions = Vec::with_capacity(batch.len());
        let mut targets = Vec::with_capacity(batch.len());
        for &idx in batch {
            let (input, target) = data.get(idx);
            predictions.push(model.forward(input, Mode::Eval));
            targets.push(target);
        }
        acc.add_batch(loss.batch_loss(&predictions, &targets), &predictions, &targets);
    }
    acc.valid_stats()
}

/// Evaluates a trained model with a fresh MSE criterion.
pub fn test_model<M: Regressor>(model: &mut M, data: &Dataset<M::Input>) -> ValidStats {
    evaluate(model, data, LossType::Mse, data.len())
}
