use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::loss::loss_type::LossType;
use crate::model::backbone::BackboneKind;
use crate::model::fusion::FUSION_UNITS;
use crate::model::recurrent::RecurrentConfig;
use crate::train::train_config::{Selection, TrainConfig};

/// A named numeric field inside a `.mat` or `.json` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSource {
    pub path: PathBuf,
    pub field: String,
}

impl FieldSource {
    pub fn new(path: impl Into<PathBuf>, field: impl Into<String>) -> Self {
        FieldSource { path: path.into(), field: field.into() }
    }
}

/// Locations of the sensor histories, image stacks and RUL targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub train_sequences: FieldSource,
    pub test_sequences: FieldSource,
    pub train_rul: FieldSource,
    pub test_rul: FieldSource,
    pub train_images: PathBuf,
    pub test_images: PathBuf,
    pub train_image_rul: FieldSource,
    pub test_image_rul: FieldSource,
    /// Square side every image is resized to; `None` keeps the stored size.
    pub image_size: Option<u32>,
}

impl Default for DataConfig {
    fn default() -> Self {
        let his = Path::new("./Matlab/train_test_his");
        let img = Path::new("./Matlab/train_test_images");
        DataConfig {
            train_sequences: FieldSource::new(his.join("training_data.mat"), "training"),
            test_sequences: FieldSource::new(his.join("testing_data.mat"), "testing"),
            train_rul: FieldSource::new(his.join("training_rul.mat"), "rul"),
            test_rul: FieldSource::new(his.join("testing_rul.mat"), "rul"),
            train_images: img.join("training_data.tif"),
            test_images: img.join("testing_data.tif"),
            train_image_rul: FieldSource::new(img.join("training_targets.mat"), "rul"),
            test_image_rul: FieldSource::new(img.join("testing_targets.mat"), "rul"),
            image_size: None,
        }
    }
}

/// Where trained models and run reports are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for the final model of every stage.
    pub model_dir: PathBuf,
    /// Directory for loss-curve SVGs and history JSON; nothing is written when unset.
    pub report_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig { model_dir: PathBuf::from("./result"), report_dir: None }
    }
}

/// Full configuration of the RUL pipelines, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data: DataConfig,
    /// One of `resnet18, resnet50, resnet152, vgg11, googlenet, alexnet`.
    pub backbone: String,
    /// Backbone weights as a `StateDict` JSON file; seeded weights when unset.
    pub backbone_weights: Option<PathBuf>,
    pub recurrent: RecurrentConfig,
    /// Recurrent branch weights to start the hybrid stage from; the branch is
    /// pretrained first when unset.
    pub pretrained_recurrent: Option<PathBuf>,
    pub fusion_units: Vec<usize>,
    pub fine_tune_recurrent: bool,
    #[serde(deserialize_with = "pretrain_over_defaults")]
    pub pretrain: TrainConfig,
    #[serde(deserialize_with = "image_train_over_defaults")]
    pub image_train: TrainConfig,
    pub hybrid_train: TrainConfig,
    pub outputs: OutputConfig,
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            data: DataConfig::default(),
            backbone: BackboneKind::Alexnet.name().to_string(),
            backbone_weights: None,
            recurrent: RecurrentConfig::default(),
            pretrained_recurrent: None,
            fusion_units: FUSION_UNITS.to_vec(),
            fine_tune_recurrent: false,
            pretrain: default_pretrain(),
            image_train: default_image_train(),
            hybrid_train: TrainConfig::default(),
            outputs: OutputConfig::default(),
            seed: 42,
        }
    }
}

fn default_pretrain() -> TrainConfig {
    TrainConfig {
        loss: LossType::Mape,
        selection: Selection::ValLoss,
        // 0.95 every ten epochs.
        lr_gamma: 0.95f64.powf(0.1),
        checkpoint_path: Some(PathBuf::from("./chkpt/checkpoint.json")),
        ..TrainConfig::default()
    }
}

fn default_image_train() -> TrainConfig {
    TrainConfig {
        batch_size: 1,
        shuffle: false,
        ..TrainConfig::default()
    }
}

/// Reads a stage object as overrides of `base`, so fields the file leaves
/// out keep the stage's own defaults rather than `TrainConfig::default()`.
fn merge_stage<'de, D>(deserializer: D, base: TrainConfig) -> std::result::Result<TrainConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    let mut merged = serde_json::to_value(base).map_err(D::Error::custom)?;
    if let serde_json::Value::Object(fields) = &mut merged {
        fields.extend(overrides);
    }
    serde_json::from_value(merged).map_err(D::Error::custom)
}

fn pretrain_over_defaults<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<TrainConfig, D::Error> {
    merge_stage(d, default_pretrain())
}

fn image_train_over_defaults<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<TrainConfig, D::Error> {
    merge_stage(d, default_image_train())
}

impl RunConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<RunConfig> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("invalid configuration {}: {}", path.display(), e)))
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn backbone_kind(&self) -> Result<BackboneKind> {
        self.backbone.parse()
    }

    /// Checks every value that can be checked without touching the data.
    pub fn validate(&self) -> Result<()> {
        self.backbone_kind()?;
        self.recurrent.validate()?;
        if self.fusion_units.contains(&0) {
            return Err(Error::Config("fusion widths must be positive".into()));
        }
        if self.data.image_size == Some(0) {
            return Err(Error::Config("image_size must be positive".into()));
        }
        self.pretrain.validate()?;
        self.image_train.validate()?;
        self.hybrid_train.validate()
    }
}
