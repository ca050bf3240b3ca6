//! Synthetic data
//!
//! Seeded generators for linear structural equation models, including the two small
//! datasets used by the demos: the `A -> B -> C` chain and a confounded binary
//! treatment.
use crate::acyclicity::to_digraph;
use crate::data::Dataset;
use crate::errors::StructureError;
use crate::linalg::SquareMatrix;
use crate::utils::odds;
use petgraph::algo::toposort;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, StandardNormal};

/// `n` draws from N(mean, scale^2).
pub fn normal_vec<R: Rng + ?Sized>(rng: &mut R, n: usize, mean: f64, scale: f64) -> Vec<f64> {
    (0..n)
        .map(|_| mean + scale * rng.sample::<f64, _>(StandardNormal))
        .collect()
}

/// Topological order of the nonzero pattern of `w`, `None` when it has a cycle.
pub(crate) fn topological_order(w: &SquareMatrix) -> Option<Vec<usize>> {
    toposort(&to_digraph(w), None)
        .ok()
        .map(|order| order.into_iter().map(|n| n.index()).collect())
}

/// Sample a linear structural equation model `X_j = sum_i W[i][j] X_i + e_j`.
///
/// * `weights` - Acyclic coefficient matrix, `weights[(i, j)]` is the effect of `i` on `j`.
/// * `names` - One column name per variable.
/// * `noise_scale` - Standard deviation of the Gaussian noise of each variable.
/// * `n` - Number of observations.
/// * `seed` - Seed of the random number generator.
pub fn linear_sem<S: AsRef<str>>(
    weights: &SquareMatrix,
    names: &[S],
    noise_scale: &[f64],
    n: usize,
    seed: u64,
) -> Result<Dataset, StructureError> {
    let d = weights.dim();
    if names.len() != d || noise_scale.len() != d {
        return Err(StructureError::InvalidParameter(
            "names, noise_scale".to_string(),
            format!("{} entries each", d),
            format!("{} and {}", names.len(), noise_scale.len()),
        ));
    }
    let order = topological_order(weights).ok_or_else(|| {
        StructureError::InvalidParameter(
            "weights".to_string(),
            "an acyclic matrix".to_string(),
            "a matrix with a cycle".to_string(),
        )
    })?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); d];
    for &j in &order {
        let mut col = normal_vec(&mut rng, n, 0.0, noise_scale[j]);
        for i in 0..d {
            let w = weights[(i, j)];
            if w != 0.0 {
                col.iter_mut().zip(columns[i].iter()).for_each(|(c, p)| *c += w * p);
            }
        }
        columns[j] = col;
    }
    let named: Vec<(String, Vec<f64>)> = names.iter().map(|s| s.as_ref().to_string()).zip(columns).collect();
    Ok(Dataset::new(named)?)
}

/// Chain `A -> B -> C` with `B = 2A + e` and `C = -1.5B + e`, noise N(0, 0.5^2).
pub fn chain_dataset(n: usize, seed: u64) -> Result<Dataset, StructureError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let a = normal_vec(&mut rng, n, 0.0, 1.0);
    let b: Vec<f64> = a
        .iter()
        .map(|a| 2.0 * a + 0.5 * rng.sample::<f64, _>(StandardNormal))
        .collect();
    let c: Vec<f64> = b
        .iter()
        .map(|b| -1.5 * b + 0.5 * rng.sample::<f64, _>(StandardNormal))
        .collect();
    Ok(Dataset::new(vec![("A", a), ("B", b), ("C", c)])?)
}

/// A confounder drives both a binary treatment and the outcome.
///
/// * `confounder` ~ N(0, 1)
/// * `treatment` ~ Bernoulli(sigmoid(confounder))
/// * `outcome` = -5 treatment + 2 confounder + N(0, 1)
/// * `confounder_bin` = 1 when the confounder is positive
pub fn confounded_treatment_dataset(n: usize, seed: u64) -> Result<Dataset, StructureError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let confounder = normal_vec(&mut rng, n, 0.0, 1.0);
    let mut treatment = Vec::with_capacity(n);
    for c in &confounder {
        let assign = Bernoulli::new(odds(*c)).map_err(|e| {
            StructureError::InvalidParameter("confounder".to_string(), "a finite value".to_string(), e.to_string())
        })?;
        treatment.push(if rng.sample(assign) { 1.0 } else { 0.0 });
    }
    let outcome: Vec<f64> = treatment
        .iter()
        .zip(confounder.iter())
        .map(|(t, c)| -5.0 * t + 2.0 * c + rng.sample::<f64, _>(StandardNormal))
        .collect();
    let confounder_bin: Vec<f64> = confounder.iter().map(|c| if *c > 0.0 { 1.0 } else { 0.0 }).collect();
    Ok(Dataset::new(vec![
        ("treatment", treatment),
        ("outcome", outcome),
        ("confounder", confounder),
        ("confounder_bin", confounder_bin),
    ])?)
}
