//! Learner Configuration
//!
//! Options recognised by the structure learner, with serde defaults so partial JSON
//! configs load, a JSON IO trait shared with [`crate::structure::StructureModel`], and
//! builder style setters.
use crate::acyclicity::Acyclicity;
use crate::constants::{H_PROGRESS, H_TOL, MAX_INNER_ITER, MAX_ITER, INNER_TOL, RHO_GROWTH, RHO_INIT, RHO_MAX};
use crate::errors::StructureError;
use crate::utils::{validate_float_parameter, validate_nonzero_parameter, validate_positive_float_parameter};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_max_iter() -> usize {
    MAX_ITER
}
fn default_h_tol() -> f64 {
    H_TOL
}
fn default_rho_init() -> f64 {
    RHO_INIT
}
fn default_rho_max() -> f64 {
    RHO_MAX
}
fn default_rho_growth() -> f64 {
    RHO_GROWTH
}
fn default_h_progress() -> f64 {
    H_PROGRESS
}
fn default_max_inner_iter() -> usize {
    MAX_INNER_ITER
}
fn default_inner_tol() -> f64 {
    INNER_TOL
}

/// Configuration for [`crate::notears::StructureLearner`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotearsConfig {
    /// L1 sparsity penalty strength.
    #[serde(default)]
    pub lambda1: f64,
    /// Entries with an absolute value strictly below this are pruned after fitting.
    #[serde(default)]
    pub w_threshold: f64,
    /// Maximum number of augmented Lagrangian (outer) iterations.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// Fitting succeeds once `h(W)` is at or below this value.
    #[serde(default = "default_h_tol")]
    pub h_tol: f64,
    /// Starting quadratic penalty.
    #[serde(default = "default_rho_init")]
    pub rho_init: f64,
    /// Quadratic penalty ceiling.
    #[serde(default = "default_rho_max")]
    pub rho_max: f64,
    /// Factor applied to the penalty when `h(W)` does not shrink enough.
    #[serde(default = "default_rho_growth")]
    pub rho_growth: f64,
    /// Required ratio `h_new / h_old` for the penalty to stay put.
    #[serde(default = "default_h_progress")]
    pub h_progress: f64,
    /// Iteration budget of each inner solve.
    #[serde(default = "default_max_inner_iter")]
    pub max_inner_iter: usize,
    /// Projected gradient tolerance of each inner solve.
    #[serde(default = "default_inner_tol")]
    pub inner_tol: f64,
    #[serde(default)]
    pub acyclicity: Acyclicity,
    /// Scale columns to unit variance as well as centring them.
    #[serde(default)]
    pub standardize: bool,
    /// `(source, target)` pairs that may not become edges.
    #[serde(default)]
    pub tabu_edges: Vec<(String, String)>,
    /// Nodes that may not have outgoing edges.
    #[serde(default)]
    pub tabu_parent_nodes: Vec<String>,
    /// Nodes that may not have incoming edges.
    #[serde(default)]
    pub tabu_child_nodes: Vec<String>,
    /// Log progress every N outer iterations, zero disables it.
    #[serde(default)]
    pub log_iterations: usize,
    /// Number of threads for the parallel parts, the global rayon pool when unset.
    #[serde(default)]
    pub num_threads: Option<usize>,
}

impl Default for NotearsConfig {
    fn default() -> Self {
        NotearsConfig {
            lambda1: 0.0,
            w_threshold: 0.0,
            max_iter: MAX_ITER,
            h_tol: H_TOL,
            rho_init: RHO_INIT,
            rho_max: RHO_MAX,
            rho_growth: RHO_GROWTH,
            h_progress: H_PROGRESS,
            max_inner_iter: MAX_INNER_ITER,
            inner_tol: INNER_TOL,
            acyclicity: Acyclicity::Exponential,
            standardize: false,
            tabu_edges: Vec::new(),
            tabu_parent_nodes: Vec::new(),
            tabu_child_nodes: Vec::new(),
            log_iterations: 0,
            num_threads: None,
        }
    }
}

impl NotearsConfig {
    /// Check every numeric option is in range.
    pub fn validate(&self) -> Result<(), StructureError> {
        validate_positive_float_parameter(self.lambda1, "lambda1")?;
        validate_positive_float_parameter(self.w_threshold, "w_threshold")?;
        validate_positive_float_parameter(self.h_tol, "h_tol")?;
        validate_float_parameter(self.rho_init, f64::MIN_POSITIVE, f64::MAX, "rho_init")?;
        validate_float_parameter(self.rho_max, self.rho_init, f64::MAX, "rho_max")?;
        validate_float_parameter(self.rho_growth, 1.0 + f64::EPSILON, f64::MAX, "rho_growth")?;
        validate_float_parameter(self.h_progress, 0.0, 1.0, "h_progress")?;
        validate_positive_float_parameter(self.inner_tol, "inner_tol")?;
        validate_nonzero_parameter(self.max_iter, "max_iter")?;
        validate_nonzero_parameter(self.max_inner_iter, "max_inner_iter")?;
        if let Some(t) = self.num_threads {
            validate_nonzero_parameter(t, "num_threads")?;
        }
        Ok(())
    }

    // Set methods for parameters

    /// Set the L1 penalty.
    pub fn set_lambda1(mut self, lambda1: f64) -> Self {
        self.lambda1 = lambda1;
        self
    }

    /// Set the pruning threshold.
    pub fn set_w_threshold(mut self, w_threshold: f64) -> Self {
        self.w_threshold = w_threshold;
        self
    }

    pub fn set_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn set_h_tol(mut self, h_tol: f64) -> Self {
        self.h_tol = h_tol;
        self
    }

    /// Set the starting and maximal quadratic penalty.
    pub fn set_rho_bounds(mut self, rho_init: f64, rho_max: f64) -> Self {
        self.rho_init = rho_init;
        self.rho_max = rho_max;
        self
    }

    pub fn set_max_inner_iter(mut self, max_inner_iter: usize) -> Self {
        self.max_inner_iter = max_inner_iter;
        self
    }

    pub fn set_acyclicity(mut self, acyclicity: Acyclicity) -> Self {
        self.acyclicity = acyclicity;
        self
    }

    pub fn set_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    /// Forbid the listed `(source, target)` edges.
    pub fn set_tabu_edges<S: Into<String>>(mut self, tabu_edges: Vec<(S, S)>) -> Self {
        self.tabu_edges = tabu_edges.into_iter().map(|(a, b)| (a.into(), b.into())).collect();
        self
    }

    /// Forbid outgoing edges from the listed nodes.
    pub fn set_tabu_parent_nodes<S: Into<String>>(mut self, nodes: Vec<S>) -> Self {
        self.tabu_parent_nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Forbid incoming edges into the listed nodes.
    pub fn set_tabu_child_nodes<S: Into<String>>(mut self, nodes: Vec<S>) -> Self {
        self.tabu_child_nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_log_iterations(mut self, log_iterations: usize) -> Self {
        self.log_iterations = log_iterations;
        self
    }

    pub fn set_num_threads(mut self, num_threads: Option<usize>) -> Self {
        self.num_threads = num_threads;
        self
    }
}

/// JSON persistence.
pub trait JsonIO: Serialize + DeserializeOwned + Sized {
    /// Save as a json object to a file.
    ///
    /// * `path` - Path to save to.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StructureError> {
        fs::write(path, self.json_dump()?).map_err(|e| StructureError::UnableToWrite(e.to_string()))
    }

    /// Dump as a json string.
    fn json_dump(&self) -> Result<String, StructureError> {
        serde_json::to_string(self).map_err(|e| StructureError::UnableToWrite(e.to_string()))
    }

    /// Load from a json string.
    fn from_json(json_str: &str) -> Result<Self, StructureError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| StructureError::UnableToRead(e.to_string()))
    }

    /// Load from a path to a json file.
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, StructureError> {
        let json_str = fs::read_to_string(path).map_err(|e| StructureError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl JsonIO for NotearsConfig {}
