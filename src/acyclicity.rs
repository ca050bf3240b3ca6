//! Acyclicity
//!
//! Smooth measures `h(W)` over a weighted adjacency matrix that are zero exactly when
//! the graph of nonzero entries has no directed cycle, and that grow with the total
//! weight of the cycles present.
use crate::linalg::SquareMatrix;
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

/// Acyclicity measure used as the equality constraint of the learner.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Default)]
pub enum Acyclicity {
    /// `h(W) = tr(exp(W ∘ W)) - d`.
    #[default]
    Exponential,
    /// `h(W) = tr((I + W ∘ W / d)^d) - d`, cheaper and numerically tamer for larger `d`.
    Polynomial,
}

impl Acyclicity {
    /// Value of `h(W)` and its gradient with respect to `W`.
    pub fn value_and_gradient(&self, w: &SquareMatrix) -> (f64, SquareMatrix) {
        let d = w.dim();
        let m = w.hadamard(w);
        // dh/dM for each variant; the chain rule through M = W ∘ W gives 2 W ∘ dh/dM.
        let (h, dh_dm) = match self {
            Acyclicity::Exponential => {
                let e = m.expm();
                (e.trace() - d as f64, e.transpose())
            }
            Acyclicity::Polynomial => {
                let mut base = SquareMatrix::identity(d);
                base.add_scaled(&m, 1.0 / d as f64);
                let p = base.powi(d.saturating_sub(1));
                let full = p.matmul(&base);
                (full.trace() - d as f64, p.transpose())
            }
        };
        (h, dh_dm.hadamard(w).scale(2.0))
    }

    pub fn value(&self, w: &SquareMatrix) -> f64 {
        let d = w.dim();
        let m = w.hadamard(w);
        match self {
            Acyclicity::Exponential => m.expm().trace() - d as f64,
            Acyclicity::Polynomial => {
                let mut base = SquareMatrix::identity(d);
                base.add_scaled(&m, 1.0 / d as f64);
                base.powi(d).trace() - d as f64
            }
        }
    }
}

/// Directed graph over the nonzero entries of `w`. Node `i` has index `i` and carries
/// `i` as its weight, edges carry the matrix entry.
pub fn to_digraph(w: &SquareMatrix) -> DiGraph<usize, f64> {
    let d = w.dim();
    let mut graph = DiGraph::with_capacity(d, w.count_nonzero());
    let nodes: Vec<NodeIndex> = (0..d).map(|i| graph.add_node(i)).collect();
    for i in 0..d {
        for j in 0..d {
            let v = w[(i, j)];
            if v != 0.0 {
                graph.add_edge(nodes[i], nodes[j], v);
            }
        }
    }
    graph
}

/// Exact cycle check over the nonzero entries of `w`.
pub fn is_acyclic(w: &SquareMatrix) -> bool {
    !is_cyclic_directed(&to_digraph(w))
}

/// Strongly connected components of the nonzero pattern that hold a directed cycle,
/// as sorted node indices.
///
/// Every edge between two nodes of such a component lies on a cycle.
pub fn cyclic_components(w: &SquareMatrix) -> Vec<Vec<usize>> {
    tarjan_scc(&to_digraph(w))
        .into_iter()
        .filter(|c| c.len() > 1 || w[(c[0].index(), c[0].index())] != 0.0)
        .map(|c| {
            let mut nodes: Vec<usize> = c.iter().map(|n| n.index()).collect();
            nodes.sort_unstable();
            nodes
        })
        .collect()
}
