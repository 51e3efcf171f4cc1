use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;
use std::ops::{Add, Sub, Mul};

/// Dense row-major matrix used for every weight tensor in the crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows],
        }
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![value; cols]; rows],
        }
    }

    /// Uniform samples in `[-limit, limit]`.
    pub fn uniform<R: Rng + ?Sized>(rows: usize, cols: usize, limit: f64, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        for row in res.data.iter_mut() {
            for v in row.iter_mut() {
                *v = (rng.gen::<f64>() * 2.0 - 1.0) * limit;
            }
        }
        res
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Both uniforms on (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn normal<R: Rng + ?Sized>(rows: usize, cols: usize, std_dev: f64, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        for row in res.data.iter_mut() {
            for v in row.iter_mut() {
                *v = Matrix::sample_standard_normal(rng) * std_dev;
            }
        }
        res
    }

    /// He initialization: N(0, sqrt(2 / rows)), where `rows` is the fan-in.
    ///
    /// Use before ReLU layers.
    pub fn he<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (2.0 / rows.max(1) as f64).sqrt(), rng)
    }

    /// Xavier (Glorot) initialization: N(0, sqrt(1 / rows)), where `rows` is the fan-in.
    ///
    /// Use before Sigmoid/Tanh/Identity layers.
    pub fn xavier<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (1.0 / rows.max(1) as f64).sqrt(), rng)
    }

    /// Builds a matrix from rows. All rows must have the same length.
    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        let cols = data.first().map(|r| r.len()).unwrap_or(0);
        assert!(
            data.iter().all(|r| r.len() == cols),
            "Matrix rows must all have the same length"
        );
        Matrix {
            rows: data.len(),
            cols,
            data,
        }
    }

    /// A `1 x n` matrix.
    pub fn row_vector(values: Vec<f64>) -> Matrix {
        Matrix::from_data(vec![values])
    }

    /// An `n x 1` matrix.
    pub fn column(values: &[f64]) -> Matrix {
        Matrix::from_data(values.iter().map(|&v| vec![v]).collect())
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of scalar entries.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `data` really holds `rows` rows of `cols` values. Only a
    /// deserialized matrix can break this.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.rows && self.data.iter().all(|r| r.len() == self.cols)
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i]
    }

    /// Row-major copy of every entry.
    pub fn flatten(&self) -> Vec<f64> {
        self.data.iter().flat_map(|r| r.iter().copied()).collect()
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);
        for (i, row) in self.data.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                res.data[j][i] = v;
            }
        }
        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data
                .iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect(),
        }
    }

    pub fn fill(&mut self, value: f64) {
        for row in self.data.iter_mut() {
            row.iter_mut().for_each(|v| *v = value);
        }
    }

    /// `x · self` for a row vector `x` of length `self.rows`.
    pub fn left_mul(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.rows, "Matrices are of incorrect sizes");
        let mut out = vec![0.0; self.cols];
        for (xi, row) in x.iter().zip(self.data.iter()) {
            if *xi == 0.0 {
                continue;
            }
            for (o, w) in out.iter_mut().zip(row.iter()) {
                *o += xi * w;
            }
        }
        out
    }

    /// `self · d` for a column vector `d` of length `self.cols`
    /// (equivalently `d · selfᵀ`), used to push gradients back through a weight.
    pub fn right_mul(&self, d: &[f64]) -> Vec<f64> {
        assert_eq!(d.len(), self.cols, "Matrices are of incorrect sizes");
        self.data
            .iter()
            .map(|row| row.iter().zip(d.iter()).map(|(w, g)| w * g).sum())
            .collect()
    }

    /// `self += xᵀ · d` (outer product accumulation for weight gradients).
    pub fn add_outer(&mut self, x: &[f64], d: &[f64]) {
        assert_eq!(x.len(), self.rows, "Matrices are of incorrect sizes");
        assert_eq!(d.len(), self.cols, "Matrices are of incorrect sizes");
        for (xi, row) in x.iter().zip(self.data.iter_mut()) {
            if *xi == 0.0 {
                continue;
            }
            for (r, g) in row.iter_mut().zip(d.iter()) {
                *r += xi * g;
            }
        }
    }

    /// Adds `d` to the single row of a `1 x n` matrix.
    pub fn add_row(&mut self, d: &[f64]) {
        assert_eq!(self.rows, 1, "add_row expects a 1 x n matrix");
        for (r, g) in self.data[0].iter_mut().zip(d.iter()) {
            *r += g;
        }
    }

    /// Element-wise (Hadamard) product of two same-shape matrices.
    pub fn hadamard(&self, other: &Matrix) -> Matrix {
        assert_eq!(self.shape(), other.shape(), "Matrices are of incorrect sizes");
        let data = self.data.iter().zip(other.data.iter())
            .map(|(a, b)| a.iter().zip(b.iter()).map(|(x, y)| x * y).collect())
            .collect();
        Matrix { rows: self.rows, cols: self.cols, data }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Add for &Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Matrix {
        if self.shape() != rhs.shape() {
            panic!("Matrices are of incorrect sizes")
        }
        let mut res = self.clone();
        for (row, other) in res.data.iter_mut().zip(rhs.data.iter()) {
            for (a, b) in row.iter_mut().zip(other.iter()) {
                *a += b;
            }
        }
        res
    }
}

impl Sub for &Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Matrix {
        if self.shape() != rhs.shape() {
            panic!("Matrices are of incorrect sizes")
        }
        let mut res = self.clone();
        for (row, other) in res.data.iter_mut().zip(rhs.data.iter()) {
            for (a, b) in row.iter_mut().zip(other.iter()) {
                *a -= b;
            }
        }
        res
    }
}

impl Mul for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Matrix {
        if self.cols != rhs.rows {
            panic!("Matrices are of incorrect sizes")
        }
        let data = self.data.iter().map(|row| rhs.left_mul(row)).collect();
        Matrix { rows: self.rows, cols: rhs.cols, data }
    }
}
