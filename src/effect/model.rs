use crate::data::Dataset;
use crate::errors::{DataError, StructureError};
use crate::linalg::SquareMatrix;
use crate::utils::fmt_vec_output;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Treatment, outcome and the common causes declared to drive both.
#[derive(Debug, Clone)]
pub struct CausalModel<'a> {
    pub(crate) data: &'a Dataset,
    pub(crate) treatment: String,
    pub(crate) outcome: String,
    pub(crate) common_causes: Vec<String>,
}

/// Backdoor estimand, the adjustment set that blocks every path from treatment to
/// outcome through the common causes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedEstimand {
    pub treatment: String,
    pub outcome: String,
    pub backdoor_variables: Vec<String>,
}

/// Linear regression estimate of the average treatment effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalEstimate {
    /// Treatment coefficient.
    pub value: f64,
    pub std_error: f64,
    /// Intercept, treatment, then one coefficient per backdoor variable.
    pub coefficients: Vec<f64>,
    pub n_obs: usize,
}

impl<'a> CausalModel<'a> {
    /// Declare a causal model over `data`.
    ///
    /// * `treatment` - Column whose effect is estimated.
    /// * `outcome` - Column the effect is measured on.
    /// * `common_causes` - Columns that influence both treatment and outcome.
    pub fn new<S: AsRef<str>>(
        data: &'a Dataset,
        treatment: &str,
        outcome: &str,
        common_causes: &[S],
    ) -> Result<Self, StructureError> {
        data.index_of(treatment)?;
        data.index_of(outcome)?;
        if treatment == outcome {
            return Err(StructureError::InvalidParameter(
                "outcome".to_string(),
                "a column other than the treatment".to_string(),
                outcome.to_string(),
            ));
        }
        let mut causes: Vec<String> = Vec::with_capacity(common_causes.len());
        for c in common_causes {
            let c = c.as_ref();
            data.index_of(c)?;
            if c == treatment || c == outcome || causes.iter().any(|x| x == c) {
                return Err(StructureError::InvalidParameter(
                    "common_causes".to_string(),
                    "distinct columns other than treatment and outcome".to_string(),
                    c.to_string(),
                ));
            }
            causes.push(c.to_string());
        }
        Ok(CausalModel {
            data,
            treatment: treatment.to_string(),
            outcome: outcome.to_string(),
            common_causes: causes,
        })
    }

    pub fn treatment(&self) -> &str {
        &self.treatment
    }

    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    pub fn common_causes(&self) -> &[String] {
        &self.common_causes
    }

    /// Backdoor identification, adjusting for every declared common cause.
    pub fn identify_effect(&self) -> IdentifiedEstimand {
        IdentifiedEstimand {
            treatment: self.treatment.clone(),
            outcome: self.outcome.clone(),
            backdoor_variables: self.common_causes.clone(),
        }
    }

    /// Regress the outcome on an intercept, the treatment and the backdoor variables.
    pub fn estimate_effect(&self, estimand: &IdentifiedEstimand) -> Result<CausalEstimate, StructureError> {
        let (y, regressors) = self.design(estimand)?;
        let estimate = linear_regression(y, &regressors)?;
        debug!(
            "Estimated effect of {} on {}: {} (se {}), coefficients [{}]",
            estimand.treatment,
            estimand.outcome,
            estimate.value,
            estimate.std_error,
            fmt_vec_output(&estimate.coefficients)
        );
        Ok(estimate)
    }

    /// Outcome column and the treatment followed by the backdoor columns.
    pub(crate) fn design(&self, estimand: &IdentifiedEstimand) -> Result<(&'a [f64], Vec<&'a [f64]>), DataError> {
        let data = self.data;
        let y = data.column_by_name(&estimand.outcome)?;
        let mut regressors = Vec::with_capacity(estimand.backdoor_variables.len() + 1);
        regressors.push(data.column_by_name(&estimand.treatment)?);
        for v in &estimand.backdoor_variables {
            regressors.push(data.column_by_name(v)?);
        }
        Ok((y, regressors))
    }
}

/// Ordinary least squares of `y` on `[1, regressors...]` through the normal equations.
///
/// The first regressor is the treatment, its coefficient is the reported effect.
pub(crate) fn linear_regression(y: &[f64], regressors: &[&[f64]]) -> Result<CausalEstimate, DataError> {
    let n = y.len();
    let p = regressors.len() + 1;
    if n <= p {
        return Err(DataError::SingularDesign(format!("{} observations for {} coefficients", n, p)));
    }
    let x = |r: usize, j: usize| if j == 0 { 1.0 } else { regressors[j - 1][r] };

    let mut xtx = SquareMatrix::zeros(p);
    let mut xty = vec![0.0; p];
    for r in 0..n {
        for i in 0..p {
            let xi = x(r, i);
            xty[i] += xi * y[r];
            for j in i..p {
                xtx[(i, j)] += xi * x(r, j);
            }
        }
    }
    for i in 0..p {
        for j in 0..i {
            xtx[(i, j)] = xtx[(j, i)];
        }
    }

    let singular = || DataError::SingularDesign("regressors are collinear".to_string());
    let beta = xtx.solve_spd(&xty).ok_or_else(singular)?;

    let rss: f64 = (0..n)
        .map(|r| {
            let fitted: f64 = (0..p).map(|j| beta[j] * x(r, j)).sum();
            (y[r] - fitted).powi(2)
        })
        .sum();
    let sigma2 = rss / (n - p) as f64;
    let mut e1 = vec![0.0; p];
    e1[1] = 1.0;
    let inv_col = xtx.solve_spd(&e1).ok_or_else(singular)?;

    Ok(CausalEstimate {
        value: beta[1],
        std_error: (sigma2 * inv_col[1]).max(0.0).sqrt(),
        coefficients: beta,
        n_obs: n,
    })
}

impl fmt::Display for IdentifiedEstimand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expr = if self.backdoor_variables.is_empty() {
            format!("d/d[{}] (E[{}])", self.treatment, self.outcome)
        } else {
            format!(
                "d/d[{}] (E[{} | {}])",
                self.treatment,
                self.outcome,
                self.backdoor_variables.join(",")
            )
        };
        writeln!(f, "Estimand type: nonparametric-ate")?;
        writeln!(f)?;
        writeln!(f, "### Estimand : 1")?;
        writeln!(f, "Estimand name: backdoor")?;
        writeln!(f, "Estimand expression:")?;
        writeln!(f, "{}", expr)?;
        let given: Vec<&str> = std::iter::once(self.treatment.as_str())
            .chain(self.backdoor_variables.iter().map(|s| s.as_str()))
            .collect();
        write!(
            f,
            "Estimand assumption 1, Unconfoundedness: If U->{{{t}}} and U->{o} then P({o}|{g},U) = P({o}|{g})",
            t = self.treatment,
            o = self.outcome,
            g = given.join(",")
        )
    }
}

impl fmt::Display for CausalEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Realized estimand: b: linear regression")?;
        writeln!(f, "Mean value: {}", self.value)?;
        write!(f, "Standard error: {}", self.std_error)
    }
}
