#![allow(dead_code)]
use dagfit::linalg::SquareMatrix;
use rand::distributions::Uniform;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Random upper triangular coefficient matrix, so the graph is acyclic in index order.
pub(crate) fn random_dag(n_nodes: usize, edge_prob: f64) -> SquareMatrix {
    // reproducible seed
    let mut rng = StdRng::seed_from_u64(1903);
    let magnitude = Uniform::new(0.5, 2.0);

    let mut w = SquareMatrix::zeros(n_nodes);
    for i in 0..n_nodes {
        for j in (i + 1)..n_nodes {
            if rng.gen::<f64>() < edge_prob {
                let sign = if rng.gen::<bool>() { 1.0 } else { -1.0 };
                w[(i, j)] = sign * rng.sample(magnitude);
            }
        }
    }
    w
}

pub(crate) fn node_names(n_nodes: usize) -> Vec<String> {
    (0..n_nodes).map(|i| format!("x{}", i)).collect()
}
