//! Linear Algebra
//!
//! Dense square matrices sized for structure learning, where the dimension is the
//! number of variables (a few hundred at most). Only the handful of operations the
//! learner and the effect estimator need are implemented.
use crate::constants::EXPM_TAYLOR_TERMS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Row major dense square matrix of `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatrixRepr")]
pub struct SquareMatrix {
    n: usize,
    data: Vec<f64>,
}

/// Serialized layout, checked before it becomes a [`SquareMatrix`].
#[derive(Deserialize)]
struct MatrixRepr {
    n: usize,
    data: Vec<f64>,
}

impl TryFrom<MatrixRepr> for SquareMatrix {
    type Error = String;

    fn try_from(repr: MatrixRepr) -> Result<Self, Self::Error> {
        match repr.n.checked_mul(repr.n) {
            Some(len) if len == repr.data.len() => Ok(SquareMatrix {
                n: repr.n,
                data: repr.data,
            }),
            _ => Err(format!(
                "{} values for a {} by {} matrix",
                repr.data.len(),
                repr.n,
                repr.n
            )),
        }
    }
}

impl SquareMatrix {
    /// Create an `n` by `n` matrix of zeros.
    pub fn zeros(n: usize) -> Self {
        SquareMatrix {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// Create an `n` by `n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Create a matrix from row major data.
    ///
    /// * `n` - The dimension of the matrix.
    /// * `data` - Row major values, must have length `n * n`.
    pub fn from_vec(n: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), n * n, "Data length must equal n * n");
        SquareMatrix { n, data }
    }

    /// Create a matrix from a list of rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for r in rows {
            assert_eq!(r.len(), n, "Every row must have length n");
            data.extend_from_slice(r);
        }
        SquareMatrix { n, data }
    }

    /// Dimension of the matrix.
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Row major view of the values.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable row major view of the values.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Get a row of the matrix.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    pub fn transpose(&self) -> Self {
        let n = self.n;
        let mut t = Self::zeros(n);
        for i in 0..n {
            for j in 0..n {
                t.data[j * n + i] = self.data[i * n + j];
            }
        }
        t
    }

    /// Matrix product `self * other`.
    pub fn matmul(&self, other: &SquareMatrix) -> Self {
        assert_eq!(self.n, other.n, "Matrix dimensions must agree");
        let n = self.n;
        let mut out = Self::zeros(n);
        for i in 0..n {
            let out_row = &mut out.data[i * n..(i + 1) * n];
            for k in 0..n {
                let a = self.data[i * n + k];
                if a == 0.0 {
                    continue;
                }
                let other_row = &other.data[k * n..(k + 1) * n];
                out_row.iter_mut().zip(other_row).for_each(|(o, b)| *o += a * b);
            }
        }
        out
    }

    /// Element wise (Hadamard) product.
    pub fn hadamard(&self, other: &SquareMatrix) -> Self {
        assert_eq!(self.n, other.n, "Matrix dimensions must agree");
        SquareMatrix {
            n: self.n,
            data: self.data.iter().zip(other.data.iter()).map(|(a, b)| a * b).collect(),
        }
    }

    pub fn scale(&self, factor: f64) -> Self {
        SquareMatrix {
            n: self.n,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    /// Add `factor * other` to the matrix in place.
    pub fn add_scaled(&mut self, other: &SquareMatrix, factor: f64) {
        assert_eq!(self.n, other.n, "Matrix dimensions must agree");
        self.data.iter_mut().zip(other.data.iter()).for_each(|(a, b)| *a += factor * b);
    }

    pub fn trace(&self) -> f64 {
        (0..self.n).map(|i| self.data[i * self.n + i]).sum()
    }

    /// Maximum absolute column sum.
    pub fn norm_1(&self) -> f64 {
        let n = self.n;
        (0..n)
            .map(|j| (0..n).map(|i| self.data[i * n + j].abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }

    /// Largest absolute entry.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }

    /// Number of entries that are not exactly zero.
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|v| **v != 0.0).count()
    }

    /// Integer power by repeated squaring.
    pub fn powi(&self, mut k: usize) -> Self {
        let mut base = self.clone();
        let mut result = Self::identity(self.n);
        while k > 0 {
            if k & 1 == 1 {
                result = result.matmul(&base);
            }
            k >>= 1;
            if k > 0 {
                base = base.matmul(&base);
            }
        }
        result
    }

    /// Matrix exponential by scaling and squaring of a truncated Taylor series.
    ///
    /// The matrix is scaled by `2^-s` so its 1-norm is at most one half, the series is
    /// summed, and the result is squared `s` times. Non-finite input yields a matrix of
    /// infinities, which callers treat as an infeasible point.
    pub fn expm(&self) -> Self {
        let n = self.n;
        let norm = self.norm_1();
        if !norm.is_finite() {
            return SquareMatrix {
                n,
                data: vec![f64::INFINITY; n * n],
            };
        }
        let squarings = if norm > 0.5 { (norm / 0.5).log2().ceil() as i32 } else { 0 };
        let scaled = self.scale(0.5_f64.powi(squarings));

        let mut result = Self::identity(n);
        let mut term = Self::identity(n);
        for k in 1..=EXPM_TAYLOR_TERMS {
            term = term.matmul(&scaled).scale(1.0 / k as f64);
            result.add_scaled(&term, 1.0);
            if term.max_abs() < f64::EPSILON * result.max_abs() {
                break;
            }
        }
        for _ in 0..squarings {
            result = result.matmul(&result);
        }
        result
    }

    /// Solve `self * x = b` for a symmetric positive definite matrix via Cholesky.
    ///
    /// Returns `None` when the matrix is not numerically positive definite.
    pub fn solve_spd(&self, b: &[f64]) -> Option<Vec<f64>> {
        let n = self.n;
        assert_eq!(b.len(), n, "Right hand side must have length n");
        // Lower triangular factor, row major.
        let mut l = vec![0.0; n * n];
        let scale = self.max_abs().max(1.0);
        for i in 0..n {
            for j in 0..=i {
                let mut sum = self.data[i * n + j];
                for k in 0..j {
                    sum -= l[i * n + k] * l[j * n + k];
                }
                if i == j {
                    if sum <= f64::EPSILON * scale * n as f64 {
                        return None;
                    }
                    l[i * n + i] = sum.sqrt();
                } else {
                    l[i * n + j] = sum / l[j * n + j];
                }
            }
        }
        // Forward substitution, L y = b.
        let mut y = vec![0.0; n];
        for i in 0..n {
            let s: f64 = (0..i).map(|k| l[i * n + k] * y[k]).sum();
            y[i] = (b[i] - s) / l[i * n + i];
        }
        // Back substitution, L^T x = y.
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let s: f64 = (i + 1..n).map(|k| l[k * n + i] * x[k]).sum();
            x[i] = (y[i] - s) / l[i * n + i];
        }
        Some(x)
    }
}

impl Index<(usize, usize)> for SquareMatrix {
    type Output = f64;
    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.n + j]
    }
}

impl IndexMut<(usize, usize)> for SquareMatrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.n + j]
    }
}

impl fmt::Display for SquareMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.n {
            let row: Vec<String> = self.row(i).iter().map(|v| format!("{:>9.4}", v)).collect();
            writeln!(f, "{}", row.join(" "))?;
        }
        Ok(())
    }
}
