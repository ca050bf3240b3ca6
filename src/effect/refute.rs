use crate::constants::REFUTE_SEED_SALT;
use crate::effect::model::{linear_regression, CausalEstimate, CausalModel, IdentifiedEstimand};
use crate::errors::{DataError, StructureError};
use crate::synthetic::normal_vec;
use crate::utils::validate_nonzero_parameter;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;

/// Outcome of re-estimating an effect under a perturbation of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refutation {
    pub refuter: String,
    pub estimated_effect: f64,
    /// Mean effect over the simulations.
    pub new_effect: f64,
    /// Two sided p-value of the estimated effect under a normal fit of the simulated
    /// effects.
    pub p_value: f64,
    pub simulated_effects: Vec<f64>,
    /// Simulations dropped because the drawn covariate made the design singular.
    pub skipped_simulations: usize,
}

impl<'a> CausalModel<'a> {
    /// Add an independent N(0, 1) variable as an extra common cause and re-estimate.
    ///
    /// Per simulation seeds are drawn up front from a generator seeded with `seed` mixed
    /// with a fixed salt, so the result does not depend on the rayon pool size. A
    /// simulation whose design turns out singular is skipped; the refutation fails only
    /// when every simulation is. An unbiased estimate should barely move.
    pub fn refute_random_common_cause(
        &self,
        estimand: &IdentifiedEstimand,
        estimate: &CausalEstimate,
        num_simulations: usize,
        seed: u64,
    ) -> Result<Refutation, StructureError> {
        validate_nonzero_parameter(num_simulations, "num_simulations")?;
        let (y, regressors) = self.design(estimand)?;
        let n = y.len();

        let mut seeds = StdRng::seed_from_u64(seed ^ REFUTE_SEED_SALT);
        let seeds: Vec<u64> = (0..num_simulations).map(|_| seeds.gen()).collect();

        let outcomes = seeds
            .par_iter()
            .map(|&s| {
                let mut rng = StdRng::seed_from_u64(s);
                let w = normal_vec(&mut rng, n, 0.0, 1.0);
                effect_with_covariate(y, &regressors, &w)
            })
            .collect::<Result<Vec<Option<f64>>, DataError>>()?;
        let simulated_effects: Vec<f64> = outcomes.into_iter().flatten().collect();
        let skipped_simulations = num_simulations - simulated_effects.len();
        if simulated_effects.is_empty() {
            return Err(DataError::SingularDesign(format!(
                "all {} random common cause simulations",
                num_simulations
            ))
            .into());
        }
        if skipped_simulations > 0 {
            warn!(
                "Skipped {} of {} simulations with a singular design.",
                skipped_simulations, num_simulations
            );
        }

        let (mean, std) = mean_std(&simulated_effects);
        let p_value = match Normal::new(mean, std) {
            Ok(fit) => {
                let c = fit.cdf(estimate.value);
                (2.0 * c.min(1.0 - c)).min(1.0)
            }
            // No spread in the simulated effects.
            Err(_) => 1.0,
        };
        info!(
            "Random common cause refutation over {} simulations: new effect {}, p value {}",
            simulated_effects.len(),
            mean,
            p_value
        );
        Ok(Refutation {
            refuter: "Add a random common cause".to_string(),
            estimated_effect: estimate.value,
            new_effect: mean,
            p_value,
            simulated_effects,
            skipped_simulations,
        })
    }
}

/// Treatment effect with `extra` appended to the regressors, `None` when the design is
/// singular.
fn effect_with_covariate(y: &[f64], regressors: &[&[f64]], extra: &[f64]) -> Result<Option<f64>, DataError> {
    let mut with_extra: Vec<&[f64]> = regressors.to_vec();
    with_extra.push(extra);
    match linear_regression(y, &with_extra) {
        Ok(e) => Ok(Some(e.value)),
        Err(DataError::SingularDesign(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Mean and sample standard deviation.
fn mean_std(v: &[f64]) -> (f64, f64) {
    let n = v.len() as f64;
    let mean = v.iter().sum::<f64>() / n;
    if v.len() < 2 {
        return (mean, 0.0);
    }
    let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

impl fmt::Display for Refutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Refute: {}", self.refuter)?;
        writeln!(f, "Estimated effect:{}", self.estimated_effect)?;
        writeln!(f, "New effect:{}", self.new_effect)?;
        write!(f, "p value:{}", self.p_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_collinear_covariate_is_skipped() {
        // Nine rows with integer column sums divisible by three keep the Cholesky pivots exact.
        let t = vec![0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let c = vec![1.0, -2.0, 3.0, 0.0, -1.0, 2.0, 1.0, -1.0, 0.0];
        let y: Vec<f64> = t.iter().zip(c.iter()).map(|(t, c)| 1.0 - 2.0 * t + c).collect();
        let regressors = [t.as_slice(), c.as_slice()];
        assert_eq!(effect_with_covariate(&y, &regressors, &[1.0; 9]).unwrap(), None);

        let extra = vec![1.0, 0.0, -1.0, 2.0, 0.0, -2.0, 1.0, 3.0, -1.0];
        let effect = effect_with_covariate(&y, &regressors, &extra).unwrap().unwrap();
        assert_relative_eq!(effect, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mean_std() {
        let (m, s) = mean_std(&[1.0, 2.0, 3.0]);
        assert_relative_eq!(m, 2.0);
        assert_relative_eq!(s, 1.0);
        assert_eq!(mean_std(&[4.0]), (4.0, 0.0));
    }
}
