use crate::math::matrix::Matrix;

/// A trainable tensor together with its accumulated gradient.
///
/// Frozen parameters keep their value for the whole run: optimizers skip them
/// and layers do not accumulate gradients into them.
#[derive(Debug, Clone)]
pub struct Param {
    pub value: Matrix,
    pub grad: Matrix,
    pub frozen: bool,
}

/// `(qualified name, parameter)` pairs exposed by models.
pub type NamedParam<'a> = (String, &'a Param);
pub type NamedParamMut<'a> = (String, &'a mut Param);

impl Param {
    pub fn new(value: Matrix) -> Param {
        let grad = Matrix::zeros(value.rows, value.cols);
        Param { value, grad, frozen: false }
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    pub fn is_trainable(&self) -> bool {
        !self.frozen
    }
}
