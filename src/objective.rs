//! Objective
//!
//! The augmented Lagrangian minimised by the structure learner at fixed penalty `rho`
//! and multiplier `alpha`:
//!
//! $$ F(W) = \frac{1}{2N}\|X - XW\|_F^2 + \lambda_1 \|W\|_1 + \frac{\rho}{2} h(W)^2 + \alpha h(W) $$
//!
//! The reconstruction term only depends on the covariance `S = X^T X / N`, so it is
//! evaluated as `tr((I - W)^T S (I - W)) / 2` in `O(d^3)` whatever the sample size.
//!
//! `W` is split into nonnegative parts, `W = W+ - W-`, which makes the L1 term linear
//! and turns the problem into a smooth bound constrained one. The parameter vector is
//! `[W+ row major, W- row major]`.
use crate::acyclicity::Acyclicity;
use crate::linalg::SquareMatrix;

/// A smooth function of a flat parameter vector.
pub trait SmoothObjective: Send + Sync {
    /// Value and gradient at `x`.
    fn value_and_gradient(&self, x: &[f64]) -> (f64, Vec<f64>);
    /// Value at `x`.
    fn value(&self, x: &[f64]) -> f64 {
        self.value_and_gradient(x).0
    }
}

/// Augmented Lagrangian of the linear NOTEARS problem.
#[derive(Debug, Clone)]
pub struct NotearsObjective {
    /// Empirical covariance of the centred data.
    pub covariance: SquareMatrix,
    /// L1 penalty strength.
    pub lambda1: f64,
    /// Quadratic penalty on `h(W)`.
    pub rho: f64,
    /// Lagrange multiplier of `h(W) = 0`.
    pub alpha: f64,
    pub acyclicity: Acyclicity,
}

impl NotearsObjective {
    pub fn new(covariance: SquareMatrix, lambda1: f64, acyclicity: Acyclicity) -> Self {
        NotearsObjective {
            covariance,
            lambda1,
            rho: 1.0,
            alpha: 0.0,
            acyclicity,
        }
    }

    /// Number of variables.
    pub fn dim(&self) -> usize {
        self.covariance.dim()
    }

    /// Length of the parameter vector.
    pub fn n_params(&self) -> usize {
        2 * self.dim() * self.dim()
    }

    /// Collapse `[W+, W-]` into `W`.
    pub fn to_weights(&self, x: &[f64]) -> SquareMatrix {
        let dd = self.dim() * self.dim();
        let data = x[..dd].iter().zip(x[dd..].iter()).map(|(p, n)| p - n).collect();
        SquareMatrix::from_vec(self.dim(), data)
    }

    /// Residual product `S (I - W)` shared by the loss and its gradient.
    fn residual(&self, w: &SquareMatrix) -> (SquareMatrix, SquareMatrix) {
        let mut i_minus_w = SquareMatrix::identity(self.dim());
        i_minus_w.add_scaled(w, -1.0);
        let r = self.covariance.matmul(&i_minus_w);
        (i_minus_w, r)
    }

    /// Least squares reconstruction loss `||X - XW||^2 / 2N`.
    pub fn loss(&self, w: &SquareMatrix) -> f64 {
        let (i_minus_w, r) = self.residual(w);
        0.5 * i_minus_w
            .as_slice()
            .iter()
            .zip(r.as_slice())
            .map(|(a, b)| a * b)
            .sum::<f64>()
    }

    /// Penalised score without the constraint terms.
    pub fn score(&self, w: &SquareMatrix) -> f64 {
        self.loss(w) + self.lambda1 * w.as_slice().iter().map(|v| v.abs()).sum::<f64>()
    }
}

impl SmoothObjective for NotearsObjective {
    fn value_and_gradient(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let w = self.to_weights(x);
        let (i_minus_w, r) = self.residual(&w);
        let loss = 0.5
            * i_minus_w
                .as_slice()
                .iter()
                .zip(r.as_slice())
                .map(|(a, b)| a * b)
                .sum::<f64>();
        let (h, grad_h) = self.acyclicity.value_and_gradient(&w);
        let l1: f64 = x.iter().sum();
        let value = loss + self.lambda1 * l1 + 0.5 * self.rho * h * h + self.alpha * h;

        // dF/dW = -S (I - W) + (rho h + alpha) dh/dW
        let mut grad_w = r.scale(-1.0);
        grad_w.add_scaled(&grad_h, self.rho * h + self.alpha);

        let mut grad = Vec::with_capacity(x.len());
        grad.extend(grad_w.as_slice().iter().map(|g| g + self.lambda1));
        grad.extend(grad_w.as_slice().iter().map(|g| -g + self.lambda1));
        (value, grad)
    }
}
