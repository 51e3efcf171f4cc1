//! The end-to-end RUL pipelines. Every pipeline validates its configuration
//! and loads all of its data before the first epoch runs.

use std::path::Path;

use log::info;

use crate::config::{DataConfig, FieldSource, OutputConfig, RunConfig};
use crate::data::dataset::Dataset;
use crate::data::images::{load_images, ImageTensor};
use crate::data::provider::{load_sequences, load_targets};
use crate::error::{Error, Result};
use crate::layers::Mode;
use crate::math::matrix::Matrix;
use crate::model::backbone::Backbone;
use crate::model::fusion::FusionHead;
use crate::model::hybrid::{HybridModel, HybridSample};
use crate::model::image::ImageBranch;
use crate::model::recurrent::RecurrentBranch;
use crate::model::regressor::Regressor;
use crate::model::state_dict::StateDict;
use crate::report::{save_history, save_loss_curve};
use crate::train::epoch_stats::{EpochStats, ValidStats};
use crate::train::trainer::{test_model, TrainOutcome, Trainer};

/// Train and test split of one input kind.
pub struct Splits<I> {
    pub train: Dataset<I>,
    pub test: Dataset<I>,
}

/// Result of the hybrid stage. Frozen branches train the fusion head on
/// precomputed features; fine-tuning trains the whole hybrid model.
#[derive(Debug)]
pub enum HybridOutcome {
    Frozen(TrainOutcome<FusionHead>),
    FineTuned(TrainOutcome<HybridModel>),
}

impl HybridOutcome {
    pub fn test(&self) -> &ValidStats {
        match self {
            HybridOutcome::Frozen(o) => &o.test,
            HybridOutcome::FineTuned(o) => &o.test,
        }
    }

    pub fn history(&self) -> &[EpochStats] {
        match self {
            HybridOutcome::Frozen(o) => &o.history,
            HybridOutcome::FineTuned(o) => &o.history,
        }
    }

    pub fn best_epoch(&self) -> usize {
        match self {
            HybridOutcome::Frozen(o) => o.best_epoch,
            HybridOutcome::FineTuned(o) => o.best_epoch,
        }
    }
}

// ---------------------------------------------------------------------------
// Data loading
// ---------------------------------------------------------------------------

/// Sensor histories as `L x F` matrices paired with their RUL targets.
pub fn load_sequence_splits(data: &DataConfig) -> Result<Splits<Matrix>> {
    let load = |seq: &FieldSource, rul: &FieldSource| -> Result<Dataset<Matrix>> {
        let sequences = load_sequences(&seq.path, &seq.field)?.sequences()?;
        let targets = load_targets(&rul.path, &rul.field)?;
        Dataset::new(sequences, targets)
    };
    let splits = Splits {
        train: load(&data.train_sequences, &data.train_rul)?,
        test: load(&data.test_sequences, &data.test_rul)?,
    };
    info!("loaded {} training and {} test sequences", splits.train.len(), splits.test.len());
    Ok(splits)
}

/// Normalised image stacks paired with their RUL targets.
pub fn load_image_splits(data: &DataConfig) -> Result<Splits<ImageTensor>> {
    let splits = Splits {
        train: Dataset::new(
            load_images(&data.train_images, data.image_size)?,
            load_targets(&data.train_image_rul.path, &data.train_image_rul.field)?,
        )?,
        test: Dataset::new(
            load_images(&data.test_images, data.image_size)?,
            load_targets(&data.test_image_rul.path, &data.test_image_rul.field)?,
        )?,
    };
    info!("loaded {} training and {} test images", splits.train.len(), splits.test.len());
    Ok(splits)
}

fn check_sequences(branch: &RecurrentBranch, splits: &Splits<Matrix>) -> Result<()> {
    for seq in splits.train.inputs().iter().chain(splits.test.inputs()) {
        branch.check_input(seq)?;
    }
    Ok(())
}

fn sequence_len(splits: &Splits<Matrix>) -> Result<usize> {
    splits.train.inputs().first()
        .map(|m| m.rows)
        .ok_or_else(|| Error::Data("training sequences are empty".into()))
}

fn build_backbone(config: &RunConfig) -> Result<Backbone> {
    let kind = config.backbone_kind()?;
    match &config.backbone_weights {
        Some(path) => Backbone::load(kind, path),
        None => Ok(Backbone::new(kind)),
    }
}

fn write_reports(stage: &str, outputs: &OutputConfig, history: &[EpochStats]) -> Result<()> {
    let Some(dir) = &outputs.report_dir else {
        return Ok(());
    };
    let train: Vec<f64> = history.iter().map(|s| s.train.loss).collect();
    let val: Vec<f64> = history.iter().map(|s| s.valid.loss).collect();
    save_loss_curve(dir.join(format!("{}_loss.svg", stage)), &train, &val)?;
    save_history(dir.join(format!("{}_history.json", stage)), history)?;
    info!("{} reports written to {}", stage, dir.display());
    Ok(())
}

fn save_model<M: Regressor>(model: &M, dir: &Path, name: &str) -> Result<()> {
    let path = dir.join(name);
    model.state_dict().save_json(&path)?;
    info!("model saved to {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

/// Trains the recurrent branch alone on the sensor histories.
pub fn pretrain_recurrent(config: &RunConfig) -> Result<TrainOutcome<RecurrentBranch>> {
    config.validate()?;
    config.pretrain.device.resolve()?;
    let splits = load_sequence_splits(&config.data)?;
    run_pretraining(config, &splits)
}

fn run_pretraining(config: &RunConfig, splits: &Splits<Matrix>) -> Result<TrainOutcome<RecurrentBranch>> {
    let branch = RecurrentBranch::new(sequence_len(splits)?, &config.recurrent)?;
    check_sequences(&branch, splits)?;

    info!("pretraining recurrent branch");
    let outcome = Trainer::new(branch, config.pretrain.clone())?.fit(&splits.train, &splits.test)?;
    write_reports("recurrent", &config.outputs, &outcome.history)?;
    save_model(&outcome.model, &config.outputs.model_dir, "recurrent.json")?;
    Ok(outcome)
}

/// Trains the regression head of the image branch over a frozen backbone.
pub fn train_image_branch(config: &RunConfig) -> Result<TrainOutcome<ImageBranch>> {
    config.validate()?;
    config.image_train.device.resolve()?;
    let backbone = build_backbone(config)?;
    let splits = load_image_splits(&config.data)?;

    let kind = backbone.kind();
    info!("training image branch on {}", kind);
    let branch = ImageBranch::new(backbone, config.seed);
    let mut outcome = Trainer::new(branch, config.image_train.clone())?.fit(&splits.train, &splits.test)?;

    let test = test_model(&mut outcome.model, &splits.test);
    info!(
        "{} test: loss {:.4} | accuracy {:.2}% | mae {:.3} | rmse {:.3}",
        kind, test.loss, test.accuracy, test.mae, test.rmse
    );
    write_reports(&format!("image_{}", kind), &config.outputs, &outcome.history)?;
    save_model(&outcome.model, &config.outputs.model_dir, &format!("image_{}.json", kind))?;
    Ok(outcome)
}

/// Fuses the recurrent and image embeddings and trains the fusion head.
///
/// Sequences and images are paired by index and use the sequence RUL targets,
/// so both sources must hold the same number of samples.
pub fn train_hybrid(config: &RunConfig) -> Result<HybridOutcome> {
    config.validate()?;
    config.hybrid_train.device.resolve()?;
    let backbone = build_backbone(config)?;
    let sequences = load_sequence_splits(&config.data)?;
    let images = load_image_splits(&config.data)?;
    let pair = |seq: &Dataset<Matrix>, img: &Dataset<ImageTensor>| -> Result<Dataset<HybridSample>> {
        if seq.len() != img.len() {
            return Err(Error::Data(format!(
                "{} sequences cannot be paired with {} images",
                seq.len(),
                img.len()
            )));
        }
        let samples = seq.inputs().iter().zip(img.inputs())
            .map(|(s, i)| HybridSample { sequence: s.clone(), image: i.clone() })
            .collect();
        Dataset::new(samples, seq.targets().to_vec())
    };
    let train = pair(&sequences.train, &images.train)?;
    let test = pair(&sequences.test, &images.test)?;

    let recurrent = match &config.pretrained_recurrent {
        Some(path) => {
            let mut branch = RecurrentBranch::new(sequence_len(&sequences)?, &config.recurrent)?;
            check_sequences(&branch, &sequences)?;
            let state = StateDict::load_json(path)
                .map_err(|e| Error::data_at(path, format!("cannot read recurrent weights: {}", e)))?;
            branch.load_state_dict(&state).map_err(|e| Error::data_at(path, e))?;
            info!("recurrent branch loaded from {}", path.display());
            branch
        }
        None => run_pretraining(config, &sequences)?.model,
    };

    let mut hybrid = HybridModel::new(
        recurrent,
        ImageBranch::new(backbone, config.seed),
        &config.fusion_units,
        config.seed,
        config.fine_tune_recurrent,
    )?;

    if config.fine_tune_recurrent {
        let outcome = Trainer::new(hybrid, config.hybrid_train.clone())?.fit(&train, &test)?;
        write_reports("hybrid", &config.outputs, &outcome.history)?;
        save_model(&outcome.model, &config.outputs.model_dir, "hybrid.json")?;
        return Ok(HybridOutcome::FineTuned(outcome));
    }

    info!("computing fused features for {} + {} samples", train.len(), test.len());
    let fused_train = train.map_inputs(|s| hybrid.features(s, Mode::Eval));
    let fused_test = test.map_inputs(|s| hybrid.features(s, Mode::Eval));
    let head = hybrid.head().clone();
    let outcome = Trainer::new(head, config.hybrid_train.clone())?.fit(&fused_train, &fused_test)?;
    write_reports("hybrid", &config.outputs, &outcome.history)?;
    save_model(&outcome.model, &config.outputs.model_dir, "fusion_head.json")?;
    Ok(HybridOutcome::Frozen(outcome))
}
