//! Structure Model
//!
//! A learned weight matrix with named nodes. Nonzero entries are directed edges,
//! `weight(source, target)` being the estimated linear effect of `source` on `target`.
use crate::acyclicity::is_acyclic;
use crate::config::JsonIO;
use crate::errors::{DataError, StructureError};
use crate::linalg::SquareMatrix;
use crate::notears::threshold_weights;
use hashbrown::HashMap;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A directed, weighted edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

/// Weighted directed graph over named variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureModel {
    nodes: Vec<String>,
    adjacency: SquareMatrix,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl StructureModel {
    /// Create a structure model.
    ///
    /// * `nodes` - Node names, in the row (and column) order of `adjacency`.
    /// * `adjacency` - Weight matrix, `adjacency[(i, j)]` is the weight of `nodes[i] -> nodes[j]`.
    pub fn new(nodes: Vec<String>, adjacency: SquareMatrix) -> Result<Self, DataError> {
        if nodes.len() != adjacency.dim() {
            return Err(DataError::LengthMismatch(
                "nodes".to_string(),
                adjacency.dim(),
                nodes.len(),
            ));
        }
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, n) in nodes.iter().enumerate() {
            if index.insert(n.clone(), i).is_some() {
                return Err(DataError::DuplicateColumn(n.clone()));
            }
        }
        Ok(StructureModel { nodes, adjacency, index })
    }

    fn rebuild_index(&mut self) {
        self.index = self.nodes.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect();
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// The weighted adjacency matrix.
    pub fn adjacency(&self) -> &SquareMatrix {
        &self.adjacency
    }

    /// Position of a node.
    pub fn index_of(&self, node: &str) -> Result<usize, DataError> {
        self.index
            .get(node)
            .copied()
            .ok_or_else(|| DataError::UnknownColumn(node.to_string()))
    }

    /// Weight of `source -> target`, zero when there is no edge.
    pub fn weight(&self, source: &str, target: &str) -> Result<f64, DataError> {
        Ok(self.adjacency[(self.index_of(source)?, self.index_of(target)?)])
    }

    /// All edges, in row major order of the adjacency matrix.
    pub fn edges(&self) -> Vec<Edge> {
        let d = self.nodes.len();
        (0..d)
            .flat_map(|i| (0..d).map(move |j| (i, j)))
            .filter(|&(i, j)| self.adjacency[(i, j)] != 0.0)
            .map(|(i, j)| Edge {
                source: self.nodes[i].clone(),
                target: self.nodes[j].clone(),
                weight: self.adjacency[(i, j)],
            })
            .collect()
    }

    pub fn n_edges(&self) -> usize {
        self.adjacency.count_nonzero()
    }

    /// Names of the direct parents of `node`.
    pub fn parents(&self, node: &str) -> Result<Vec<String>, DataError> {
        let j = self.index_of(node)?;
        Ok((0..self.nodes.len())
            .filter(|&i| self.adjacency[(i, j)] != 0.0)
            .map(|i| self.nodes[i].clone())
            .collect())
    }

    /// Names of the direct children of `node`.
    pub fn children(&self, node: &str) -> Result<Vec<String>, DataError> {
        let i = self.index_of(node)?;
        Ok((0..self.nodes.len())
            .filter(|&j| self.adjacency[(i, j)] != 0.0)
            .map(|j| self.nodes[j].clone())
            .collect())
    }

    /// Drop every edge whose absolute weight is strictly below `threshold`.
    pub fn remove_edges_below_threshold(&mut self, threshold: f64) {
        self.adjacency = threshold_weights(&self.adjacency, threshold);
    }

    pub fn is_dag(&self) -> bool {
        is_acyclic(&self.adjacency)
    }

    /// Remove the weakest edges, one at a time, until the graph is acyclic.
    ///
    /// Returns the smallest absolute weight still present, which is the threshold that
    /// would have produced the same graph.
    pub fn threshold_till_dag(&mut self) -> f64 {
        while !self.is_dag() {
            let weakest = self
                .adjacency
                .as_slice()
                .iter()
                .filter(|v| **v != 0.0)
                .map(|v| v.abs())
                .fold(f64::INFINITY, f64::min);
            self.remove_edges_below_threshold(weakest + f64::MIN_POSITIVE.max(weakest * f64::EPSILON));
        }
        self.adjacency
            .as_slice()
            .iter()
            .filter(|v| **v != 0.0)
            .map(|v| v.abs())
            .fold(f64::INFINITY, f64::min)
    }

    /// Weakly connected component label of every node.
    fn components(&self) -> UnionFind<usize> {
        let d = self.nodes.len();
        let mut uf = UnionFind::new(d);
        for i in 0..d {
            for j in 0..d {
                if self.adjacency[(i, j)] != 0.0 {
                    uf.union(i, j);
                }
            }
        }
        uf
    }

    fn subgraph(&self, mut members: Vec<usize>) -> StructureModel {
        members.sort_unstable();
        let k = members.len();
        let mut adjacency = SquareMatrix::zeros(k);
        for (a, &i) in members.iter().enumerate() {
            for (b, &j) in members.iter().enumerate() {
                adjacency[(a, b)] = self.adjacency[(i, j)];
            }
        }
        let mut sm = StructureModel {
            nodes: members.iter().map(|&i| self.nodes[i].clone()).collect(),
            adjacency,
            index: HashMap::new(),
        };
        sm.rebuild_index();
        sm
    }

    /// The largest weakly connected component. Ties go to the component holding the
    /// earliest node.
    pub fn largest_subgraph(&self) -> StructureModel {
        let d = self.nodes.len();
        let labels = self.components().into_labeling();
        let mut sizes: HashMap<usize, usize> = HashMap::new();
        for &l in &labels {
            *sizes.entry(l).or_insert(0) += 1;
        }
        // First node of the first largest component.
        let best = (0..d).fold(None, |best: Option<usize>, i| match best {
            Some(b) if sizes[&labels[b]] >= sizes[&labels[i]] => Some(b),
            _ => Some(i),
        });
        match best {
            Some(b) => self.subgraph((0..d).filter(|&i| labels[i] == labels[b]).collect()),
            None => self.subgraph(Vec::new()),
        }
    }

    /// The weakly connected component containing `node`.
    pub fn target_subgraph(&self, node: &str) -> Result<StructureModel, DataError> {
        let start = self.index_of(node)?;
        let uf = self.components();
        let members = (0..self.nodes.len()).filter(|&i| uf.equiv(start, i)).collect();
        Ok(self.subgraph(members))
    }
}

impl JsonIO for StructureModel {
    fn from_json(json_str: &str) -> Result<Self, StructureError> {
        let sm: StructureModel =
            serde_json::from_str(json_str).map_err(|e| StructureError::UnableToRead(e.to_string()))?;
        if sm.nodes.len() != sm.adjacency.dim() {
            return Err(StructureError::UnableToRead(format!(
                "{} nodes for a {} by {} adjacency matrix",
                sm.nodes.len(),
                sm.adjacency.dim(),
                sm.adjacency.dim()
            )));
        }
        StructureModel::new(sm.nodes, sm.adjacency).map_err(|e| StructureError::UnableToRead(e.to_string()))
    }
}

impl fmt::Display for StructureModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.nodes.iter().map(|n| n.len()).max().unwrap_or(0).max(9);
        write!(f, "{:width$}", "", width = width)?;
        for n in &self.nodes {
            write!(f, " {:>width$}", n, width = width)?;
        }
        writeln!(f)?;
        for (i, n) in self.nodes.iter().enumerate() {
            write!(f, "{:<width$}", n, width = width)?;
            for v in self.adjacency.row(i) {
                write!(f, " {:>width$.6}", v, width = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn model() -> StructureModel {
        // A -> B -> C, D -> E, weak C -> A closing a cycle.
        let mut w = SquareMatrix::zeros(5);
        w[(0, 1)] = 2.0;
        w[(1, 2)] = -1.5;
        w[(2, 0)] = 0.1;
        w[(3, 4)] = 0.7;
        StructureModel::new(names(&["A", "B", "C", "D", "E"]), w).unwrap()
    }

    #[test]
    fn test_edges_and_weights() {
        let sm = model();
        assert_eq!(sm.n_edges(), 4);
        assert_eq!(sm.weight("A", "B").unwrap(), 2.0);
        assert_eq!(sm.weight("B", "A").unwrap(), 0.0);
        assert!(sm.weight("A", "Z").is_err());
        let edges = sm.edges();
        assert_eq!(
            edges[0],
            Edge {
                source: "A".to_string(),
                target: "B".to_string(),
                weight: 2.0
            }
        );
        assert_eq!(sm.parents("C").unwrap(), vec!["B".to_string()]);
        assert_eq!(sm.children("B").unwrap(), vec!["C".to_string()]);
    }

    #[test]
    fn test_new_validates() {
        assert!(StructureModel::new(names(&["A"]), SquareMatrix::zeros(2)).is_err());
        assert!(StructureModel::new(names(&["A", "A"]), SquareMatrix::zeros(2)).is_err());
    }

    #[test]
    fn test_remove_edges_below_threshold() {
        let mut sm = model();
        assert!(!sm.is_dag());
        sm.remove_edges_below_threshold(0.7);
        assert!(sm.is_dag());
        assert_eq!(sm.n_edges(), 3);
        assert_eq!(sm.weight("D", "E").unwrap(), 0.7);
    }

    #[test]
    fn test_threshold_till_dag() {
        let mut sm = model();
        let t = sm.threshold_till_dag();
        assert!(sm.is_dag());
        assert_eq!(t, 0.7);
        assert_eq!(sm.weight("C", "A").unwrap(), 0.0);
        assert_eq!(sm.n_edges(), 3);
    }

    #[test]
    fn test_subgraphs() {
        let sm = model();
        let largest = sm.largest_subgraph();
        assert_eq!(largest.nodes(), &names(&["A", "B", "C"]));
        assert_eq!(largest.weight("B", "C").unwrap(), -1.5);
        let target = sm.target_subgraph("E").unwrap();
        assert_eq!(target.nodes(), &names(&["D", "E"]));
        assert_eq!(target.weight("D", "E").unwrap(), 0.7);
        assert!(sm.target_subgraph("Z").is_err());
    }

    #[test]
    fn test_display() {
        let sm = model();
        let s = sm.to_string();
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with('A'));
        assert!(lines[1].contains("2.000000"));
        assert!(lines[2].contains("-1.500000"));
    }

    #[test]
    fn test_json_io() {
        let sm = model();
        let json = sm.json_dump().unwrap();
        let sm2 = StructureModel::from_json(&json).unwrap();
        assert_eq!(sm2.weight("C", "A").unwrap(), 0.1);
        assert_eq!(sm2.nodes(), sm.nodes());

        let dir = tempdir().unwrap();
        let path = dir.path().join("structure.json");
        sm.save(&path).unwrap();
        let sm3 = StructureModel::load(&path).unwrap();
        assert_eq!(sm3.edges(), sm.edges());
    }

    #[test]
    fn test_json_rejects_malformed_adjacency() {
        let short = r#"{"nodes":["A","B"],"adjacency":{"n":2,"data":[1.0]}}"#;
        assert!(matches!(StructureModel::from_json(short), Err(StructureError::UnableToRead(_))));
        let mismatched = r#"{"nodes":["A"],"adjacency":{"n":2,"data":[0.0,1.0,0.0,0.0]}}"#;
        assert!(matches!(StructureModel::from_json(mismatched), Err(StructureError::UnableToRead(_))));
        let duplicate = r#"{"nodes":["A","A"],"adjacency":{"n":2,"data":[0.0,1.0,0.0,0.0]}}"#;
        assert!(matches!(StructureModel::from_json(duplicate), Err(StructureError::UnableToRead(_))));
    }
}
