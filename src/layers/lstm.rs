use rand::Rng;

use crate::activation::activation::{sigmoid, ActivationFunction};
use crate::layers::param::{NamedParam, NamedParamMut, Param};
use crate::math::matrix::Matrix;

/// Cached values of one time step, kept for backpropagation through time.
#[derive(Debug, Clone)]
struct Step {
    x: Vec<f64>,
    h_prev: Vec<f64>,
    c_prev: Vec<f64>,
    i: Vec<f64>,
    f: Vec<f64>,
    g: Vec<f64>,
    g_pre: Vec<f64>,
    o: Vec<f64>,
    c: Vec<f64>,
}

/// Long short-term memory layer returning the full hidden sequence.
///
/// Gates are laid out `[input, forget, cell, output]` along the columns of the
/// weight tensors. Gates use the sigmoid; the cell candidate and the cell
/// output use `activation` (tanh in the textbook cell, ReLU in the RUL setup).
#[derive(Debug, Clone)]
pub struct Lstm {
    name: String,
    hidden: usize,
    activation: ActivationFunction,
    pub w_input: Param,      // (input_size, 4H)
    pub w_recurrent: Param,  // (H, 4H)
    pub bias: Param,         // (1, 4H)
    steps: Vec<Step>,
}

impl Lstm {
    pub fn new<R: Rng + ?Sized>(
        name: impl Into<String>,
        input_size: usize,
        hidden: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Lstm {
        let mut bias = Matrix::zeros(1, 4 * hidden);
        // Forget-gate bias starts at 1.
        for j in hidden..2 * hidden {
            bias.data[0][j] = 1.0;
        }
        Lstm {
            name: name.into(),
            hidden,
            activation,
            w_input: Param::new(Matrix::xavier(input_size, 4 * hidden, rng)),
            w_recurrent: Param::new(Matrix::xavier(hidden, 4 * hidden, rng)),
            bias: Param::new(bias),
            steps: Vec::new(),
        }
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden
    }

    pub fn input_size(&self) -> usize {
        self.w_input.value.rows
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.w_input.frozen = frozen;
        self.w_recurrent.frozen = frozen;
        self.bias.frozen = frozen;
    }

    /// Runs the cell over every row of `sequence` (`L x input_size`) and
    /// returns the hidden states as an `L x H` matrix.
    pub fn forward(&mut self, sequence: &Matrix) -> Matrix {
        assert_eq!(sequence.cols, self.input_size(), "LSTM input width mismatch");
        let hd = self.hidden;
        let mut h = vec![0.0; hd];
        let mut c = vec![0.0; hd];
        let mut outputs = Vec::with_capacity(sequence.rows);
        self.steps.clear();

        for x in sequence.data.iter() {
            let mut z = self.w_input.value.left_mul(x);
            let zr = self.w_recurrent.value.left_mul(&h);
            for ((zi, r), b) in z.iter_mut().zip(zr.iter()).zip(self.bias.value.data[0].iter()) {
                *zi += r + b;
            }

            let i: Vec<f64> = z[..hd].iter().map(|&v| sigmoid(v)).collect();
            let f: Vec<f64> = z[hd..2 * hd].iter().map(|&v| sigmoid(v)).collect();
            let g_pre = z[2 * hd..3 * hd].to_vec();
            let g: Vec<f64> = g_pre.iter().map(|&v| self.activation.function(v)).collect();
            let o: Vec<f64> = z[3 * hd..].iter().map(|&v| sigmoid(v)).collect();

            let c_new: Vec<f64> = (0..hd).map(|j| f[j] * c[j] + i[j] * g[j]).collect();
            let h_new: Vec<f64> = (0..hd)
                .map(|j| o[j] * self.activation.function(c_new[j]))
                .collect();

            self.steps.push(Step {
                x: x.clone(),
                h_prev: std::mem::replace(&mut h, h_new.clone()),
                c_prev: std::mem::replace(&mut c, c_new.clone()),
                i, f, g, g_pre, o,
                c: c_new,
            });
            outputs.push(h_new);
        }

        Matrix { rows: outputs.len(), cols: hd, data: outputs }
    }

    /// Backpropagation through time. `d_hidden` is ∂L/∂h for every step
    /// (`L x H`); returns ∂L/∂x (`L x input_size`).
    pub fn backward(&mut self, d_hidden: &Matrix) -> Matrix {
        assert_eq!(d_hidden.rows, self.steps.len(), "LSTM::backward called without a matching forward");
        let hd = self.hidden;
        let trainable = !self.w_input.frozen;
        let mut dh_next = vec![0.0; hd];
        let mut dc_next = vec![0.0; hd];
        let mut d_inputs = vec![Vec::new(); self.steps.len()];

        for (t, step) in self.steps.iter().enumerate().rev() {
            let mut dz = vec![0.0; 4 * hd];
            for j in 0..hd {
                let dh = d_hidden.data[t][j] + dh_next[j];
                let act_c = self.activation.function(step.c[j]);
                let d_o = dh * act_c;
                let dc = dh * step.o[j] * self.activation.derivative(step.c[j]) + dc_next[j];
                let d_f = dc * step.c_prev[j];
                let d_i = dc * step.g[j];
                let d_g = dc * step.i[j];
                dc_next[j] = dc * step.f[j];

                dz[j] = d_i * step.i[j] * (1.0 - step.i[j]);
                dz[hd + j] = d_f * step.f[j] * (1.0 - step.f[j]);
                dz[2 * hd + j] = d_g * self.activation.derivative(step.g_pre[j]);
                dz[3 * hd + j] = d_o * step.o[j] * (1.0 - step.o[j]);
            }

            if trainable {
                self.w_input.grad.add_outer(&step.x, &dz);
                self.w_recurrent.grad.add_outer(&step.h_prev, &dz);
                self.bias.grad.add_row(&dz);
            }
            d_inputs[t] = self.w_input.value.right_mul(&dz);
            dh_next = self.w_recurrent.value.right_mul(&dz);
        }

        Matrix::from_data(d_inputs)
    }

    pub fn params(&self) -> Vec<NamedParam<'_>> {
        vec![
            (format!("{}.w_input", self.name), &self.w_input),
            (format!("{}.w_recurrent", self.name), &self.w_recurrent),
            (format!("{}.bias", self.name), &self.bias),
        ]
    }

    pub fn params_mut(&mut self) -> Vec<NamedParamMut<'_>> {
        vec![
            (format!("{}.w_input", self.name), &mut self.w_input),
            (format!("{}.w_recurrent", self.name), &mut self.w_recurrent),
            (format!("{}.bias", self.name), &mut self.bias),
        ]
    }
}
