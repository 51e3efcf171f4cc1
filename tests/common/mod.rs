#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use hybrid_rul::config::{FieldSource, RunConfig};
use hybrid_rul::model::RecurrentConfig;
use hybrid_rul::optim::OptimizerKind;
use hybrid_rul::{ActivationFunction, Dataset, FusionHead, Regressor, TrainConfig};
use tiff::encoder::{colortype, TiffEncoder};

/// A single linear unit `y = w·x + b`.
pub fn linear_model(input_dim: usize, seed: u64) -> FusionHead {
    FusionHead::new(input_dim, &[], seed).unwrap()
}

/// Sets every weight and bias of `model` to `value`.
pub fn fill_params<M: Regressor>(model: &mut M, value: f64) {
    for (_, p) in model.params_mut() {
        p.value.fill(value);
    }
}

/// `(x, 2x + 1)` pairs for `x = 1..=n`.
pub fn linear_dataset(n: usize) -> Dataset<Vec<f64>> {
    let xs: Vec<Vec<f64>> = (1..=n).map(|i| vec![i as f64]).collect();
    let ys = xs.iter().map(|x| 2.0 * x[0] + 1.0).collect();
    Dataset::new(xs, ys).unwrap()
}

/// SGD configuration that never changes the weights.
pub fn frozen_sgd(epochs: usize, batch_size: usize, patience: usize) -> TrainConfig {
    TrainConfig {
        optimizer: OptimizerKind::Sgd,
        learning_rate: 0.0,
        patience,
        ..TrainConfig::new(epochs, batch_size, 0.0)
    }
}

pub fn tiny_recurrent() -> RecurrentConfig {
    RecurrentConfig {
        input_features: 1,
        lstm_units: vec![4],
        cell_activation: ActivationFunction::Tanh,
        dropout: 0.0,
        dense_units: vec![6],
        embedding_dim: 5,
        seed: 3,
    }
}

/// Writes `{field: rows}` as JSON.
pub fn write_field(path: &Path, field: &str, rows: &[Vec<f64>]) {
    let body = serde_json::json!({ field: rows });
    std::fs::write(path, body.to_string()).unwrap();
}

/// Writes one small RGB page per value into a multi-page TIFF.
pub fn write_tiff(path: &Path, shades: &[u8]) {
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    for &shade in shades {
        let page = vec![shade; 4 * 4 * 3];
        encoder.write_image::<colortype::RGB8>(4, 4, &page).unwrap();
    }
}

/// Sequences of length 4 whose RUL grows linearly with the signal level.
pub fn sequence_rows(n: usize) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let seqs = (0..n)
        .map(|i| {
            let level = i as f64 / n as f64;
            (0..4).map(|t| level + 0.05 * t as f64).collect()
        })
        .collect();
    let rul = (0..n).map(|i| vec![1.0 + 2.0 * i as f64 / n as f64]).collect();
    (seqs, rul)
}

/// A run configuration over JSON/TIFF fixtures written to `dir`, sized for
/// tests: tiny branches, few epochs, outputs under `dir`.
pub fn fixture_config(dir: &Path, samples: usize) -> RunConfig {
    let (seqs, rul) = sequence_rows(samples);
    let shades: Vec<u8> = (0..samples).map(|i| (i * 20) as u8).collect();
    let file = |name: &str| -> PathBuf { dir.join(name) };

    write_field(&file("training_data.json"), "training", &seqs);
    write_field(&file("testing_data.json"), "testing", &seqs);
    write_field(&file("training_rul.json"), "rul", &rul);
    write_field(&file("testing_rul.json"), "rul", &rul);
    write_field(&file("training_targets.json"), "rul", &rul);
    write_field(&file("testing_targets.json"), "rul", &rul);
    write_tiff(&file("training_data.tif"), &shades);
    write_tiff(&file("testing_data.tif"), &shades);

    let mut config = RunConfig::default();
    config.data.train_sequences = FieldSource::new(file("training_data.json"), "training");
    config.data.test_sequences = FieldSource::new(file("testing_data.json"), "testing");
    config.data.train_rul = FieldSource::new(file("training_rul.json"), "rul");
    config.data.test_rul = FieldSource::new(file("testing_rul.json"), "rul");
    config.data.train_images = file("training_data.tif");
    config.data.test_images = file("testing_data.tif");
    config.data.train_image_rul = FieldSource::new(file("training_targets.json"), "rul");
    config.data.test_image_rul = FieldSource::new(file("testing_targets.json"), "rul");
    config.backbone = "resnet18".into();
    config.recurrent = tiny_recurrent();
    config.fusion_units = vec![8, 4];
    for stage in [&mut config.pretrain, &mut config.image_train, &mut config.hybrid_train] {
        stage.epochs = 3;
        stage.batch_size = 4;
        stage.learning_rate = 0.01;
    }
    config.pretrain.checkpoint_path = Some(file("chkpt/checkpoint.json"));
    config.outputs.model_dir = file("result");
    config.outputs.report_dir = Some(file("reports"));
    config
}
