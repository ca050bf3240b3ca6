//! NOTEARS Structure Learner
//!
//! Learns a linear structural equation model `X = XW + E` whose coefficient matrix `W`
//! is the weighted adjacency matrix of a DAG. Acyclicity is imposed as the smooth
//! equality constraint `h(W) = 0` and enforced with an augmented Lagrangian:
//!
//! 1. Minimise `score(W) + rho/2 h(W)^2 + alpha h(W)` over the bound constrained split
//!    `W = W+ - W-` with the spectral projected gradient method.
//! 2. If `h` did not shrink below `h_progress` times its previous value, grow `rho` and
//!    solve again from the same start.
//! 3. Update the multiplier `alpha += rho h`, and stop once `h <= h_tol`.
//!
//! The learned matrix is then pruned at the caller supplied threshold.
use crate::acyclicity::cyclic_components;
use crate::config::NotearsConfig;
use crate::constants::MAX_VARIABLES;
use crate::data::Dataset;
use crate::errors::{DataError, StructureError};
use crate::linalg::SquareMatrix;
use crate::objective::NotearsObjective;
use crate::optimizer::{Bounds, ProjectedGradient, Termination};
use crate::structure::StructureModel;
use log::{debug, info, warn};
use std::time::Instant;

/// `W[(i, j)]` is the linear effect of variable `i` on variable `j`.
pub type WeightMatrix = SquareMatrix;

/// Diagnostics of a successful fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// `h(W)` of the unpruned solution.
    pub h: f64,
    /// Outer iterations used.
    pub iterations: usize,
    /// Total inner solver iterations.
    pub inner_iterations: usize,
    /// Final quadratic penalty.
    pub rho: f64,
    /// Final Lagrange multiplier.
    pub alpha: f64,
    /// Least squares loss plus L1 penalty of the unpruned solution.
    pub score: f64,
    /// Weight matrix before thresholding.
    pub unpruned: WeightMatrix,
}

/// Learn a thresholded weight matrix with default options.
///
/// * `data` - Observations, at least two non constant columns.
/// * `lambda1` - L1 sparsity penalty, nonnegative.
/// * `threshold` - Entries with an absolute value strictly below this are set to zero.
pub fn fit(data: &Dataset, lambda1: f64, threshold: f64) -> Result<WeightMatrix, StructureError> {
    let cfg = NotearsConfig::default().set_lambda1(lambda1).set_w_threshold(threshold);
    StructureLearner::new(cfg)?.fit(data)
}

/// Zero every entry whose absolute value is strictly below `threshold`.
///
/// Entries equal to the threshold are kept, so pruning twice is the same as pruning once.
pub fn threshold_weights(w: &WeightMatrix, threshold: f64) -> WeightMatrix {
    let mut out = w.clone();
    out.as_mut_slice().iter_mut().for_each(|v| {
        if v.abs() < threshold {
            *v = 0.0
        }
    });
    out
}

/// Remove the weakest edge inside each remaining cyclic component until none is left.
///
/// A fit that meets `h_tol` can still carry a cycle through entries of order
/// `sqrt(h_tol)` when the threshold is below that scale.
pub(crate) fn break_cycles(w: &mut WeightMatrix) -> usize {
    let mut removed = 0;
    while let Some(component) = cyclic_components(w).into_iter().next() {
        let (src, dst) = component
            .iter()
            .flat_map(|&i| component.iter().map(move |&j| (i, j)))
            .filter(|&e| w[e] != 0.0)
            .min_by(|a, b| w[*a].abs().total_cmp(&w[*b].abs()))
            .unwrap_or((component[0], component[0]));
        debug!("removing edge {} -> {} with weight {:e} to break a cycle", src, dst, w[(src, dst)]);
        w[(src, dst)] = 0.0;
        removed += 1;
    }
    removed
}

/// NOTEARS structure learner.
#[derive(Debug, Clone, Default)]
pub struct StructureLearner {
    pub cfg: NotearsConfig,
}

impl StructureLearner {
    /// Create a learner, validating the configuration.
    pub fn new(cfg: NotearsConfig) -> Result<Self, StructureError> {
        cfg.validate()?;
        Ok(StructureLearner { cfg })
    }

    fn check_data(&self, data: &Dataset) -> Result<(), DataError> {
        let d = data.cols();
        if d < 2 {
            return Err(DataError::TooFewVariables(d));
        }
        if d > MAX_VARIABLES {
            return Err(DataError::TooManyVariables(d, MAX_VARIABLES));
        }
        data.check_variance()
    }

    /// Bounds of `[W+, W-]`: nonnegative, with the diagonal and every tabu entry pinned to zero.
    fn bounds(&self, data: &Dataset) -> Result<Bounds, DataError> {
        let d = data.cols();
        let dd = d * d;
        let mut bounds = Bounds::nonnegative(2 * dd);
        let mut forbid = |i: usize, j: usize| {
            bounds.fix_zero(i * d + j);
            bounds.fix_zero(dd + i * d + j);
        };
        for i in 0..d {
            forbid(i, i);
        }
        for (src, dst) in &self.cfg.tabu_edges {
            forbid(data.index_of(src)?, data.index_of(dst)?);
        }
        for parent in &self.cfg.tabu_parent_nodes {
            let i = data.index_of(parent)?;
            (0..d).for_each(|j| forbid(i, j));
        }
        for child in &self.cfg.tabu_child_nodes {
            let j = data.index_of(child)?;
            (0..d).for_each(|i| forbid(i, j));
        }
        Ok(bounds)
    }

    fn covariance(&self, data: &Dataset) -> Result<SquareMatrix, StructureError> {
        match self.cfg.num_threads {
            Some(num_threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .map_err(|e| {
                        StructureError::InvalidParameter(
                            "num_threads".to_string(),
                            "a thread count the pool can be built with".to_string(),
                            e.to_string(),
                        )
                    })?;
                Ok(pool.install(|| data.covariance(self.cfg.standardize)))
            }
            None => Ok(data.covariance(self.cfg.standardize)),
        }
    }

    /// Fit and return the thresholded weight matrix.
    pub fn fit(&self, data: &Dataset) -> Result<WeightMatrix, StructureError> {
        self.fit_with_report(data).map(|(w, _)| w)
    }

    /// Fit and wrap the thresholded matrix with the column names.
    pub fn fit_structure(&self, data: &Dataset) -> Result<StructureModel, StructureError> {
        let w = self.fit(data)?;
        Ok(StructureModel::new(data.names().to_vec(), w)?)
    }

    /// Fit and return the thresholded weight matrix along with fitting diagnostics.
    pub fn fit_with_report(&self, data: &Dataset) -> Result<(WeightMatrix, FitReport), StructureError> {
        let start = Instant::now();
        self.check_data(data)?;
        let bounds = self.bounds(data)?;
        let cfg = &self.cfg;

        let mut objective = NotearsObjective::new(self.covariance(data)?, cfg.lambda1, cfg.acyclicity);
        objective.rho = cfg.rho_init;
        objective.alpha = 0.0;
        let solver = ProjectedGradient::new(cfg.max_inner_iter, cfg.inner_tol);

        let mut x = vec![0.0; objective.n_params()];
        let mut h = f64::INFINITY;
        let mut iterations = 0;
        let mut inner_iterations = 0;

        for i in 0..cfg.max_iter {
            iterations = i + 1;
            let (x_new, h_new) = loop {
                let sol = solver.minimize(&objective, &x, &bounds);
                inner_iterations += sol.iterations;
                debug!(
                    "rho {:e}: {} inner iterations, objective {:.6}, projected gradient {:e}, {:?}",
                    objective.rho, sol.iterations, sol.value, sol.projected_gradient, sol.termination
                );
                if sol.termination == Termination::NonFinite {
                    return Err(StructureError::Convergence { h, iterations });
                }
                let h_new = objective.acyclicity.value(&objective.to_weights(&sol.x));
                if h_new > cfg.h_progress * h {
                    objective.rho *= cfg.rho_growth;
                    if objective.rho >= cfg.rho_max {
                        break (sol.x, h_new);
                    }
                } else {
                    break (sol.x, h_new);
                }
            };
            if !h_new.is_finite() {
                return Err(StructureError::Convergence { h: h_new, iterations });
            }
            x = x_new;
            h = h_new;
            objective.alpha += objective.rho * h;

            if cfg.log_iterations > 0 && i % cfg.log_iterations == 0 {
                info!(
                    "iteration {}, h: {:e}, rho: {:e}, alpha: {:e}, score: {:.6}",
                    i,
                    h,
                    objective.rho,
                    objective.alpha,
                    objective.score(&objective.to_weights(&x)),
                );
            }
            if h <= cfg.h_tol || objective.rho >= cfg.rho_max {
                break;
            }
        }

        if h > cfg.h_tol {
            warn!(
                "Acyclicity tolerance {:e} not reached after {} iterations, h: {:e}. Try to increase max_iter or relax h_tol.",
                cfg.h_tol, iterations, h
            );
            return Err(StructureError::Convergence { h, iterations });
        }

        let mut unpruned = objective.to_weights(&x);
        for k in 0..unpruned.dim() {
            unpruned[(k, k)] = 0.0;
        }
        let mut w = threshold_weights(&unpruned, cfg.w_threshold);
        let removed = break_cycles(&mut w);
        if removed > 0 {
            info!("Removed {} residual edges closing a cycle below the pruning threshold.", removed);
        }

        let report = FitReport {
            h,
            iterations,
            inner_iterations,
            rho: objective.rho,
            alpha: objective.alpha,
            score: objective.score(&unpruned),
            unpruned,
        };
        if cfg.log_iterations > 0 {
            info!(
                "Finished learning a structure with {} edges in {} iterations and {:.3} seconds.",
                w.count_nonzero(),
                iterations,
                start.elapsed().as_secs_f32()
            );
        }
        Ok((w, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acyclicity::{is_acyclic, Acyclicity};
    use crate::synthetic::{chain_dataset, linear_sem};
    use approx::assert_relative_eq;

    fn assert_chain_recovered(w: &WeightMatrix) {
        assert_relative_eq!(w[(0, 1)], 2.0, epsilon = 0.3);
        assert_relative_eq!(w[(1, 2)], -1.5, epsilon = 0.3);
        for i in 0..3 {
            for j in 0..3 {
                if (i, j) != (0, 1) && (i, j) != (1, 2) {
                    assert_eq!(w[(i, j)], 0.0, "unexpected edge {} -> {}: {}", i, j, w[(i, j)]);
                }
            }
        }
    }

    #[test]
    fn test_recovers_chain() {
        let data = chain_dataset(1000, 42).unwrap();
        let w = fit(&data, 0.0, 0.5).unwrap();
        assert_chain_recovered(&w);
        assert!(is_acyclic(&w));
    }

    #[test]
    fn test_recovers_chain_polynomial() {
        let data = chain_dataset(1000, 7).unwrap();
        let learner = StructureLearner::new(
            NotearsConfig::default()
                .set_w_threshold(0.5)
                .set_acyclicity(Acyclicity::Polynomial),
        )
        .unwrap();
        let (w, report) = learner.fit_with_report(&data).unwrap();
        assert_chain_recovered(&w);
        assert!(report.h <= 1e-8);
    }

    #[test]
    fn test_output_is_acyclic_without_threshold() {
        for seed in 0..3 {
            let data = chain_dataset(500, seed).unwrap();
            let w = fit(&data, 0.0, 0.0).unwrap();
            assert!(is_acyclic(&w));
            for k in 0..3 {
                assert_eq!(w[(k, k)], 0.0);
            }
        }
    }

    #[test]
    fn test_report() {
        let data = chain_dataset(1000, 1).unwrap();
        let learner = StructureLearner::new(NotearsConfig::default().set_w_threshold(0.5)).unwrap();
        let (w, report) = learner.fit_with_report(&data).unwrap();
        assert!(report.h <= 1e-8);
        assert!(report.iterations >= 1);
        assert!(report.unpruned.count_nonzero() >= w.count_nonzero());
        assert_eq!(threshold_weights(&report.unpruned, 0.5), w);
    }

    #[test]
    fn test_threshold_is_idempotent_and_inclusive() {
        let w = SquareMatrix::from_rows(&[vec![0.0, 0.5, -0.49], vec![0.2, 0.0, -1.5], vec![0.0, 0.51, 0.0]]);
        let once = threshold_weights(&w, 0.5);
        assert_eq!(threshold_weights(&once, 0.5), once);
        assert_eq!(once[(0, 1)], 0.5);
        assert_eq!(once[(0, 2)], 0.0);
        assert_eq!(once[(1, 0)], 0.0);
        assert_eq!(once[(1, 2)], -1.5);
    }

    #[test]
    fn test_constant_column_is_data_error() {
        let mut data = chain_dataset(100, 0).unwrap();
        data = data.with_column("K", vec![3.0; 100]).unwrap();
        let err = fit(&data, 0.0, 0.5).unwrap_err();
        assert!(matches!(err, StructureError::Data(DataError::ConstantColumn(ref c)) if c == "K"));
    }

    #[test]
    fn test_constant_column_with_large_offset() {
        let data = chain_dataset(100, 0).unwrap().with_column("K", vec![1e9 + 0.1; 100]).unwrap();
        let err = fit(&data, 0.0, 0.5).unwrap_err();
        assert!(matches!(err, StructureError::Data(DataError::ConstantColumn(ref c)) if c == "K"));
    }

    #[test]
    fn test_small_scale_data_is_fitted() {
        let data = chain_dataset(500, 11).unwrap();
        let scaled: Vec<(String, Vec<f64>)> = data
            .names()
            .iter()
            .enumerate()
            .map(|(j, n)| (n.clone(), data.column(j).iter().map(|v| v * 1e-7).collect()))
            .collect();
        let small = Dataset::new(scaled).unwrap();
        assert!(small.check_variance().is_ok());
        assert!(!matches!(
            fit(&small, 0.0, 0.5),
            Err(StructureError::Data(DataError::ConstantColumn(_)))
        ));
    }

    #[test]
    fn test_infinite_lambda1_is_rejected() {
        let data = chain_dataset(100, 0).unwrap();
        assert!(matches!(
            fit(&data, f64::INFINITY, 0.5),
            Err(StructureError::InvalidParameter(ref p, _, _)) if p == "lambda1"
        ));
        assert!(matches!(
            fit(&data, 0.0, f64::INFINITY),
            Err(StructureError::InvalidParameter(ref p, _, _)) if p == "w_threshold"
        ));
    }

    #[test]
    fn test_single_variable_is_data_error() {
        let data = Dataset::new(vec![("A", vec![1.0, 2.0, 3.0])]).unwrap();
        let err = fit(&data, 0.0, 0.5).unwrap_err();
        assert!(matches!(err, StructureError::Data(DataError::TooFewVariables(1))));
    }

    #[test]
    fn test_convergence_error_on_tiny_budget() {
        let data = chain_dataset(300, 3).unwrap();
        let learner = StructureLearner::new(NotearsConfig::default().set_max_iter(1)).unwrap();
        match learner.fit(&data) {
            Err(StructureError::Convergence { h, iterations }) => {
                assert!(h > 1e-8);
                assert_eq!(iterations, 1);
            }
            other => panic!("expected a convergence error, got {:?}", other.map(|w| w.count_nonzero())),
        }
    }

    #[test]
    fn test_lambda1_does_not_add_edges() {
        let lambdas = [0.0, 0.05, 0.2, 0.5];
        let mut violations = 0;
        for seed in 0..3 {
            let data = chain_dataset(500, seed).unwrap();
            let counts: Vec<usize> = lambdas
                .iter()
                .map(|l| {
                    let learner = StructureLearner::new(NotearsConfig::default().set_lambda1(*l)).unwrap();
                    let (_, report) = learner.fit_with_report(&data).unwrap();
                    report.unpruned.count_nonzero()
                })
                .collect();
            assert!(counts[lambdas.len() - 1] <= counts[0]);
            violations += counts.windows(2).filter(|c| c[1] > c[0]).count();
        }
        assert!(violations <= 1, "sparsity increased with lambda1 {} times", violations);
    }

    #[test]
    fn test_tabu_edges_are_respected() {
        let data = chain_dataset(1000, 42).unwrap();
        let learner = StructureLearner::new(
            NotearsConfig::default()
                .set_w_threshold(0.3)
                .set_tabu_edges(vec![("A", "B")])
                .set_tabu_child_nodes(vec!["A"]),
        )
        .unwrap();
        let w = learner.fit(&data).unwrap();
        assert_eq!(w[(0, 1)], 0.0);
        assert_eq!(w[(1, 0)], 0.0);
        assert_eq!(w[(2, 0)], 0.0);
        assert!(is_acyclic(&w));
    }

    #[test]
    fn test_tabu_parent_node() {
        let data = chain_dataset(500, 5).unwrap();
        let learner =
            StructureLearner::new(NotearsConfig::default().set_tabu_parent_nodes(vec!["C"])).unwrap();
        let w = learner.fit(&data).unwrap();
        assert!(w.row(2).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_unknown_tabu_node() {
        let data = chain_dataset(100, 0).unwrap();
        let learner = StructureLearner::new(NotearsConfig::default().set_tabu_child_nodes(vec!["Z"])).unwrap();
        assert!(matches!(
            learner.fit(&data),
            Err(StructureError::Data(DataError::UnknownColumn(_)))
        ));
    }

    #[test]
    fn test_larger_random_dag() {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3, 3 -> 4
        let mut truth = SquareMatrix::zeros(5);
        truth[(0, 1)] = 1.5;
        truth[(0, 2)] = -1.2;
        truth[(1, 3)] = 1.0;
        truth[(2, 3)] = 0.8;
        truth[(3, 4)] = -1.3;
        let data = linear_sem(&truth, &["v0", "v1", "v2", "v3", "v4"], &[1.0; 5], 2000, 11).unwrap();
        let learner = StructureLearner::new(NotearsConfig::default().set_lambda1(0.01).set_w_threshold(0.3)).unwrap();
        let w = learner.fit(&data).unwrap();
        assert!(is_acyclic(&w));
        assert_relative_eq!(w[(3, 4)], -1.3, epsilon = 0.3);
    }

    #[test]
    fn test_num_threads_matches_global_pool() {
        let data = chain_dataset(400, 9).unwrap();
        let a = StructureLearner::new(NotearsConfig::default().set_w_threshold(0.5)).unwrap().fit(&data).unwrap();
        let b = StructureLearner::new(NotearsConfig::default().set_w_threshold(0.5).set_num_threads(Some(2)))
            .unwrap()
            .fit(&data)
            .unwrap();
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert_relative_eq!(x, y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_break_cycles() {
        let mut w = SquareMatrix::from_rows(&[vec![0.0, 2.0, 0.0], vec![0.0, 0.0, 1.0], vec![0.01, 0.0, 0.0]]);
        assert_eq!(break_cycles(&mut w), 1);
        assert_eq!(w[(2, 0)], 0.0);
        assert_eq!(w[(0, 1)], 2.0);
    }

    #[test]
    fn test_break_cycles_disjoint() {
        // 0 <-> 1 and 2 -> 3 -> 4 -> 2, plus an acyclic 1 -> 2 link.
        let mut w = SquareMatrix::zeros(5);
        w[(0, 1)] = 1.0;
        w[(1, 0)] = 0.05;
        w[(1, 2)] = 0.01;
        w[(2, 3)] = 0.8;
        w[(3, 4)] = 0.02;
        w[(4, 2)] = 0.9;
        assert_eq!(break_cycles(&mut w), 2);
        assert!(is_acyclic(&w));
        assert_eq!(w[(1, 0)], 0.0);
        assert_eq!(w[(3, 4)], 0.0);
        assert_eq!(w[(1, 2)], 0.01);
        assert_eq!(w.count_nonzero(), 4);
    }
}
