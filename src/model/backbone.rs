use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::data::images::ImageTensor;
use crate::error::{Error, Result};
use crate::layers::{Dense, NamedParam, NamedParamMut};
use crate::model::state_dict::StateDict;

/// Side of the square grid every channel is average-pooled to.
pub const POOL_GRID: usize = 4;

/// Pretrained image backbones the image branch can be built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackboneKind {
    Resnet18,
    Resnet50,
    Resnet152,
    Vgg11,
    Googlenet,
    Alexnet,
}

impl BackboneKind {
    pub const ALL: [BackboneKind; 6] = [
        BackboneKind::Resnet18,
        BackboneKind::Resnet50,
        BackboneKind::Resnet152,
        BackboneKind::Vgg11,
        BackboneKind::Googlenet,
        BackboneKind::Alexnet,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BackboneKind::Resnet18 => "resnet18",
            BackboneKind::Resnet50 => "resnet50",
            BackboneKind::Resnet152 => "resnet152",
            BackboneKind::Vgg11 => "vgg11",
            BackboneKind::Googlenet => "googlenet",
            BackboneKind::Alexnet => "alexnet",
        }
    }

    /// Width of the representation the backbone hands to its classifier.
    pub fn embedding_dim(self) -> usize {
        match self {
            BackboneKind::Resnet18 => 512,
            BackboneKind::Resnet50 | BackboneKind::Resnet152 => 2048,
            BackboneKind::Vgg11 => 25088,
            BackboneKind::Googlenet => 1024,
            BackboneKind::Alexnet => 9216,
        }
    }

    fn seed(self) -> u64 {
        // Stable per-kind seed so two runs see identical frozen weights.
        self.name().bytes().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
            (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
        })
    }
}

impl FromStr for BackboneKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BackboneKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = BackboneKind::ALL.iter().map(|k| k.name()).collect();
                Error::Config(format!("unknown backbone '{}', expected one of {}", s, known.join(", ")))
            })
    }
}

impl fmt::Display for BackboneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Frozen image feature extractor.
///
/// Each channel is adaptive-average-pooled to a `POOL_GRID x POOL_GRID` grid
/// and the pooled vector goes through a ReLU projection to
/// `kind.embedding_dim()` features. Every parameter is frozen.
///
/// All kinds share this architecture: the kind only picks the embedding
/// width and the seed of the projection. No kind runs a convolutional
/// network here; real pretrained features must be exported into a
/// `StateDict` file and passed to `load`.
#[derive(Debug, Clone)]
pub struct Backbone {
    kind: BackboneKind,
    projection: Dense,
}

impl Backbone {
    /// Deterministically initialised backbone for `kind`.
    pub fn new(kind: BackboneKind) -> Backbone {
        let mut rng = StdRng::seed_from_u64(kind.seed());
        let projection = Dense::new(
            "backbone.projection",
            3 * POOL_GRID * POOL_GRID,
            kind.embedding_dim(),
            ActivationFunction::ReLU,
            &mut rng,
        )
        .frozen();
        Backbone { kind, projection }
    }

    /// Backbone for `kind` with weights read from a `StateDict` JSON file.
    pub fn load(kind: BackboneKind, path: impl AsRef<Path>) -> Result<Backbone> {
        let path = path.as_ref();
        let state = StateDict::load_json(path)
            .map_err(|e| Error::data_at(path, format!("cannot read {} weights: {}", kind, e)))?;
        let mut backbone = Backbone::new(kind);
        state.filter_prefix("backbone.")
            .restore_into(backbone.projection.params_mut())
            .map_err(|e| Error::data_at(path, e))?;
        debug!("loaded {} backbone weights from {}", kind, path.display());
        Ok(backbone)
    }

    pub fn kind(&self) -> BackboneKind {
        self.kind
    }

    pub fn embedding_dim(&self) -> usize {
        self.kind.embedding_dim()
    }

    pub fn features(&mut self, image: &ImageTensor) -> Vec<f64> {
        let pooled = adaptive_avg_pool(image, POOL_GRID);
        self.projection.forward(&pooled)
    }

    pub fn params(&self) -> Vec<NamedParam<'_>> {
        self.projection.params()
    }

    pub fn params_mut(&mut self) -> Vec<NamedParamMut<'_>> {
        self.projection.params_mut()
    }
}

/// Averages every channel over a `grid x grid` partition of the image. Cell
/// `i` spans rows `floor(i*H/grid)..ceil((i+1)*H/grid)`, so images smaller
/// than the grid reuse pixels rather than leaving empty cells. Grayscale
/// tensors are replicated to three channels.
fn adaptive_avg_pool(image: &ImageTensor, grid: usize) -> Vec<f64> {
    let (h, w) = (image.height, image.width);
    let mut out = Vec::with_capacity(3 * grid * grid);
    for c in 0..3 {
        let plane = image.channel(c.min(image.channels.saturating_sub(1)));
        for i in 0..grid {
            let (r0, r1) = (i * h / grid, ((i + 1) * h).div_ceil(grid));
            for j in 0..grid {
                let (c0, c1) = (j * w / grid, ((j + 1) * w).div_ceil(grid));
                let mut sum = 0.0;
                for r in r0..r1 {
                    sum += plane[r * w + c0..r * w + c1].iter().sum::<f64>();
                }
                let count = (r1 - r0) * (c1 - c0);
                out.push(if count == 0 { 0.0 } else { sum / count as f64 });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_allowed_name_parses() {
        for kind in BackboneKind::ALL {
            assert_eq!(kind.name().parse::<BackboneKind>().unwrap(), kind);
        }
        assert_eq!("alexnet".parse::<BackboneKind>().unwrap().embedding_dim(), 9216);
        assert_eq!("resnet18".parse::<BackboneKind>().unwrap().embedding_dim(), 512);
    }

    #[test]
    fn unknown_name_is_a_config_error() {
        assert!(matches!("lenet".parse::<BackboneKind>(), Err(Error::Config(_))));
        assert!(matches!("AlexNet".parse::<BackboneKind>(), Err(Error::Config(_))));
    }

    #[test]
    fn pooling_averages_each_cell() {
        let data: Vec<f64> = (0..3 * 8 * 8).map(|i| (i / 64) as f64).collect();
        let img = ImageTensor::new(3, 8, 8, data).unwrap();
        let pooled = adaptive_avg_pool(&img, 4);
        assert_eq!(pooled.len(), 48);
        assert!(pooled[..16].iter().all(|&v| v == 0.0));
        assert!(pooled[32..].iter().all(|&v| v == 2.0));
    }

    #[test]
    fn pooling_handles_images_smaller_than_the_grid() {
        let img = ImageTensor::new(1, 2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let pooled = adaptive_avg_pool(&img, 4);
        assert_eq!(pooled.len(), 48);
        assert_eq!(pooled[0], 1.0);
        assert_eq!(pooled[15], 4.0);
    }

    #[test]
    fn weights_are_frozen_and_seeded_per_kind() {
        let a = Backbone::new(BackboneKind::Resnet18);
        let b = Backbone::new(BackboneKind::Resnet18);
        assert!(a.params().iter().all(|(_, p)| p.frozen));
        assert_eq!(a.params()[0].1.value, b.params()[0].1.value);
        assert_eq!(a.params()[0].1.value.cols, 512);
    }

    #[test]
    fn missing_or_corrupt_weight_file_is_a_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(Backbone::load(BackboneKind::Resnet18, &missing), Err(Error::Data(_))));

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{ not json").unwrap();
        assert!(matches!(Backbone::load(BackboneKind::Resnet18, &corrupt), Err(Error::Data(_))));

        let wrong = dir.path().join("wrong.json");
        StateDict::from_params(Backbone::new(BackboneKind::Resnet50).params()).save_json(&wrong).unwrap();
        assert!(matches!(Backbone::load(BackboneKind::Resnet18, &wrong), Err(Error::Data(_))));
    }

    #[test]
    fn load_restores_saved_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resnet18.json");
        let mut source = Backbone::new(BackboneKind::Resnet18);
        for (_, p) in source.params_mut() {
            p.value.fill(0.5);
        }
        StateDict::from_params(source.params()).save_json(&path).unwrap();

        let loaded = Backbone::load(BackboneKind::Resnet18, &path).unwrap();
        assert!(loaded.params()[0].1.value.flatten().iter().all(|&v| v == 0.5));
        assert!(loaded.params().iter().all(|(_, p)| p.frozen));
    }
}
