use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// An n-dimensional numeric array in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NumericArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<NumericArray> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::Data(format!(
                "shape {:?} needs {} values, got {}",
                shape, expected, data.len()
            )));
        }
        Ok(NumericArray { shape, data })
    }

    /// Builds an array from column-major storage (MATLAB's layout).
    pub fn from_column_major(shape: Vec<usize>, data: Vec<f64>) -> Result<NumericArray> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::Data(format!(
                "shape {:?} needs {} values, got {}",
                shape, expected, data.len()
            )));
        }
        if shape.len() < 2 {
            return NumericArray::new(shape, data);
        }

        // Column-major strides: the first index moves fastest.
        let mut strides = vec![1usize; shape.len()];
        for d in 1..shape.len() {
            strides[d] = strides[d - 1] * shape[d - 1];
        }

        let mut row_major = Vec::with_capacity(data.len());
        let mut index = vec![0usize; shape.len()];
        for _ in 0..data.len() {
            let offset: usize = index.iter().zip(strides.iter()).map(|(i, s)| i * s).sum();
            row_major.push(data[offset]);
            // Row-major increment: the last index moves fastest.
            for d in (0..shape.len()).rev() {
                index[d] += 1;
                if index[d] < shape[d] {
                    break;
                }
                index[d] = 0;
            }
        }
        NumericArray::new(shape, row_major)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Size of the leading (sample) axis.
    pub fn len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reshape(self, shape: Vec<usize>) -> Result<NumericArray> {
        NumericArray::new(shape, self.data)
    }

    /// Splits an `(N, L, F)` array into `N` matrices of shape `L x F`.
    pub fn sequences(&self) -> Result<Vec<Matrix>> {
        let (n, l, f) = match self.shape.as_slice() {
            [n, l, f] => (*n, *l, *f),
            other => {
                return Err(Error::Data(format!(
                    "expected a (samples, steps, features) array, got shape {:?}",
                    other
                )))
            }
        };
        Ok((0..n)
            .map(|s| {
                let rows = (0..l)
                    .map(|t| {
                        let start = (s * l + t) * f;
                        self.data[start..start + f].to_vec()
                    })
                    .collect();
                Matrix { rows: l, cols: f, data: rows }
            })
            .collect())
    }
}
