use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::activation::activation::ActivationFunction;
use crate::data::images::ImageTensor;
use crate::layers::{Dense, Mode, NamedParam, NamedParamMut};
use crate::model::backbone::Backbone;
use crate::model::branch::Branch;
use crate::model::regressor::Regressor;

/// Frozen backbone with a trainable single-output regression head.
#[derive(Debug, Clone)]
pub struct ImageBranch {
    backbone: Backbone,
    head: Dense,
}

impl ImageBranch {
    pub fn new(backbone: Backbone, seed: u64) -> ImageBranch {
        let mut rng = StdRng::seed_from_u64(seed);
        let head = Dense::new("head", backbone.embedding_dim(), 1, ActivationFunction::Identity, &mut rng);
        ImageBranch { backbone, head }
    }

    pub fn backbone(&self) -> &Backbone {
        &self.backbone
    }

    /// Freezes or unfreezes the regression head. The backbone stays frozen.
    pub fn set_head_frozen(&mut self, frozen: bool) {
        self.head.set_frozen(frozen);
    }
}

impl Branch for ImageBranch {
    type Input = ImageTensor;

    fn embedding_dim(&self) -> usize {
        self.backbone.embedding_dim()
    }

    fn embed(&mut self, input: &ImageTensor, _mode: Mode) -> Vec<f64> {
        self.backbone.features(input)
    }

    fn predict(&mut self, input: &ImageTensor) -> f64 {
        self.forward(input, Mode::Eval)
    }
}

impl Regressor for ImageBranch {
    type Input = ImageTensor;

    fn forward(&mut self, input: &ImageTensor, _mode: Mode) -> f64 {
        let features = self.backbone.features(input);
        self.head.forward(&features)[0]
    }

    fn backward(&mut self, d_output: f64) {
        // The gradient stops at the head input.
        self.head.backward(&[d_output]);
    }

    fn params(&self) -> Vec<NamedParam<'_>> {
        let mut out = self.backbone.params();
        out.extend(self.head.params());
        out
    }

    fn params_mut(&mut self) -> Vec<NamedParamMut<'_>> {
        let mut out = self.backbone.params_mut();
        out.extend(self.head.params_mut());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::backbone::BackboneKind;

    fn image(value: f64) -> ImageTensor {
        ImageTensor::new(3, 4, 4, vec![value; 48]).unwrap()
    }

    #[test]
    fn only_the_head_is_trainable() {
        let branch = ImageBranch::new(Backbone::new(BackboneKind::Resnet18), 3);
        assert_eq!(branch.trainable_len(), 512 + 1);
    }

    #[test]
    fn backward_leaves_backbone_gradients_untouched() {
        let mut branch = ImageBranch::new(Backbone::new(BackboneKind::Resnet18), 3);
        branch.forward(&image(0.7), Mode::Train);
        branch.backward(1.0);
        let params = branch.params();
        let (_, backbone_w) = &params[0];
        assert!(backbone_w.grad.flatten().iter().all(|&g| g == 0.0));
        let (name, head_b) = &params[3];
        assert_eq!(name, "head.biases");
        assert_eq!(head_b.grad.data[0][0], 1.0);
    }

    #[test]
    fn embedding_has_backbone_width_and_is_deterministic() {
        let mut branch = ImageBranch::new(Backbone::new(BackboneKind::Googlenet), 3);
        let a = branch.embed(&image(0.2), Mode::Eval);
        assert_eq!(a.len(), 1024);
        assert_eq!(a, branch.embed(&image(0.2), Mode::Eval));
        assert_eq!(branch.predict(&image(0.2)), branch.predict(&image(0.2)));
    }
}
