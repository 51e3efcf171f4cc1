use log::info;

use crate::data::images::ImageTensor;
use crate::error::Result;
use crate::layers::{Mode, NamedParam, NamedParamMut};
use crate::math::matrix::Matrix;
use crate::model::branch::Branch;
use crate::model::fusion::{concat, FusionHead};
use crate::model::image::ImageBranch;
use crate::model::recurrent::RecurrentBranch;
use crate::model::regressor::Regressor;

/// One engine observation seen by both branches.
#[derive(Debug, Clone)]
pub struct HybridSample {
    pub sequence: Matrix,
    pub image: ImageTensor,
}

/// Recurrent branch + image branch + fusion head, trained as one regressor.
///
/// Both branches are frozen unless `fine_tune_recurrent` is set, in which
/// case the fusion gradient also flows back through the recurrent branch.
/// The image branch always runs in evaluation mode.
#[derive(Debug, Clone)]
pub struct HybridModel {
    recurrent: RecurrentBranch,
    image: ImageBranch,
    head: FusionHead,
    fine_tune_recurrent: bool,
}

impl HybridModel {
    pub fn new(
        mut recurrent: RecurrentBranch,
        mut image: ImageBranch,
        units: &[usize],
        seed: u64,
        fine_tune_recurrent: bool,
    ) -> Result<HybridModel> {
        let head = FusionHead::new(recurrent.embedding_dim() + image.embedding_dim(), units, seed)?;
        recurrent.set_frozen(!fine_tune_recurrent);
        image.set_head_frozen(true);
        info!(
            "hybrid model: {} recurrent + {} image features, recurrent branch {}",
            recurrent.embedding_dim(),
            image.embedding_dim(),
            if fine_tune_recurrent { "fine-tuned" } else { "frozen" }
        );
        Ok(HybridModel { recurrent, image, head, fine_tune_recurrent })
    }

    pub fn recurrent(&self) -> &RecurrentBranch {
        &self.recurrent
    }

    pub fn head(&self) -> &FusionHead {
        &self.head
    }

    /// Concatenated `[recurrent | image]` embedding of one sample.
    pub fn features(&mut self, sample: &HybridSample, mode: Mode) -> Vec<f64> {
        let recurrent_mode = if self.fine_tune_recurrent { mode } else { Mode::Eval };
        let r = self.recurrent.embed(&sample.sequence, recurrent_mode);
        let i = self.image.embed(&sample.image, Mode::Eval);
        concat(&r, &i)
    }
}

impl Regressor for HybridModel {
    type Input = HybridSample;

    fn forward(&mut self, input: &HybridSample, mode: Mode) -> f64 {
        let features = self.features(input, mode);
        self.head.forward_features(&features)
    }

    fn backward(&mut self, d_output: f64) {
        let d_features = self.head.backward_features(d_output);
        if self.fine_tune_recurrent {
            let split = self.recurrent.embedding_dim();
            self.recurrent.backward_embedding(&d_features[..split]);
        }
    }

    fn params(&self) -> Vec<NamedParam<'_>> {
        let mut out = self.recurrent.params();
        out.extend(self.image.params());
        out.extend(self.head.params());
        out
    }

    fn params_mut(&mut self) -> Vec<NamedParamMut<'_>> {
        let mut out = self.recurrent.params_mut();
        out.extend(self.image.params_mut());
        out.extend(self.head.params_mut());
        out
    }
}
