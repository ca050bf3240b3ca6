//! Data
//!
//! Named, column oriented observational data consumed by the structure learner and
//! the effect estimator.
use crate::errors::DataError;
use crate::linalg::SquareMatrix;
use hashbrown::HashMap;
use rayon::prelude::*;

/// Ordered collection of named numeric columns of equal length.
///
/// Columns are stored separately, so selecting or appending a column does not touch the
/// others. Every value is finite and names are unique.
#[derive(Debug, Clone)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    index: HashMap<String, usize>,
    rows: usize,
}

impl Dataset {
    /// Create a new dataset from `(name, values)` pairs.
    ///
    /// * `columns` - Columns in the order they should appear in the learned matrix.
    pub fn new<S: Into<String>>(columns: Vec<(S, Vec<f64>)>) -> Result<Self, DataError> {
        let mut ds = Dataset {
            names: Vec::with_capacity(columns.len()),
            columns: Vec::with_capacity(columns.len()),
            index: HashMap::with_capacity(columns.len()),
            rows: 0,
        };
        for (name, values) in columns {
            ds.push_column(name.into(), values)?;
        }
        Ok(ds)
    }

    /// Create a dataset from a column major buffer, the layout used by most numeric
    /// libraries for tabular data.
    ///
    /// * `names` - One name per column.
    /// * `data` - Column major values, `rows * names.len()` long.
    /// * `rows` - Number of observations.
    pub fn from_column_major<S: AsRef<str>>(names: &[S], data: &[f64], rows: usize) -> Result<Self, DataError> {
        if data.len() != rows * names.len() {
            return Err(DataError::LengthMismatch(
                "<buffer>".to_string(),
                rows * names.len(),
                data.len(),
            ));
        }
        let columns: Vec<(String, Vec<f64>)> = names
            .iter()
            .enumerate()
            .map(|(j, n)| (n.as_ref().to_string(), data[j * rows..(j + 1) * rows].to_vec()))
            .collect();
        Self::new(columns)
    }

    fn push_column(&mut self, name: String, values: Vec<f64>) -> Result<(), DataError> {
        if self.index.contains_key(&name) {
            return Err(DataError::DuplicateColumn(name));
        }
        if self.columns.is_empty() {
            if values.is_empty() {
                return Err(DataError::Empty);
            }
            self.rows = values.len();
        } else if values.len() != self.rows {
            return Err(DataError::LengthMismatch(name, self.rows, values.len()));
        }
        if let Some(row) = values.iter().position(|v| !v.is_finite()) {
            return Err(DataError::NonFinite(name, row));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Return a new dataset with an extra column appended.
    pub fn with_column<S: Into<String>>(&self, name: S, values: Vec<f64>) -> Result<Self, DataError> {
        let mut ds = self.clone();
        ds.push_column(name.into(), values)?;
        Ok(ds)
    }

    /// Return a new dataset with only the named columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, DataError> {
        let columns: Vec<(String, Vec<f64>)> = names
            .iter()
            .map(|n| Ok((n.as_ref().to_string(), self.column_by_name(n.as_ref())?.to_vec())))
            .collect::<Result<Vec<_>, DataError>>()?;
        Self::new(columns)
    }

    /// Number of observations.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of variables.
    pub fn cols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Get an entire column.
    ///
    /// * `col` - The index of the column to get.
    pub fn column(&self, col: usize) -> &[f64] {
        &self.columns[col]
    }

    /// Position of a named column.
    pub fn index_of(&self, name: &str) -> Result<usize, DataError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| DataError::UnknownColumn(name.to_string()))
    }

    pub fn column_by_name(&self, name: &str) -> Result<&[f64], DataError> {
        Ok(self.column(self.index_of(name)?))
    }

    /// Get a row of the data as a vector.
    pub fn row(&self, row: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[row]).collect()
    }

    pub fn mean(&self, col: usize) -> f64 {
        mean(&self.columns[col])
    }

    /// Population variance of a column.
    pub fn variance(&self, col: usize) -> f64 {
        variance(&self.columns[col])
    }

    /// Fail with [`DataError::ConstantColumn`] on the first column whose values are all equal.
    ///
    /// Exact comparison, so neither the magnitude nor the spread of a column matters.
    pub fn check_variance(&self) -> Result<(), DataError> {
        match (0..self.cols()).find(|&j| self.columns[j].windows(2).all(|p| p[0] == p[1])) {
            Some(j) => Err(DataError::ConstantColumn(self.names[j].clone())),
            None => Ok(()),
        }
    }

    /// Columns shifted to zero mean, and scaled to unit variance when `standardize` is set.
    pub fn centered(&self, standardize: bool) -> Vec<Vec<f64>> {
        self.columns
            .par_iter()
            .map(|c| {
                let m = mean(c);
                let s = if standardize { variance(c).sqrt() } else { 1.0 };
                let s = if s > 0.0 { s } else { 1.0 };
                c.iter().map(|v| (v - m) / s).collect()
            })
            .collect()
    }

    /// Empirical second moment `X^T X / N` of the centred (optionally standardised) data.
    ///
    /// Entry `(i, j)` is the covariance of columns `i` and `j`. Pairs are computed in
    /// parallel on the current rayon pool.
    pub fn covariance(&self, standardize: bool) -> SquareMatrix {
        let x = self.centered(standardize);
        let d = x.len();
        let n = self.rows as f64;
        let pairs: Vec<(usize, usize)> = (0..d).flat_map(|i| (i..d).map(move |j| (i, j))).collect();
        let values: Vec<f64> = pairs
            .par_iter()
            .map(|&(i, j)| x[i].iter().zip(x[j].iter()).map(|(a, b)| a * b).sum::<f64>() / n)
            .collect();
        let mut s = SquareMatrix::zeros(d);
        for (&(i, j), v) in pairs.iter().zip(values) {
            s[(i, j)] = v;
            s[(j, i)] = v;
        }
        s
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dataset_new() {
        let ds = Dataset::new(vec![("a", vec![1.0, 2.0, 3.0]), ("b", vec![2.0, 4.0, 7.0])]).unwrap();
        assert_eq!(ds.rows(), 3);
        assert_eq!(ds.cols(), 2);
        assert_eq!(ds.index_of("b").unwrap(), 1);
        assert_eq!(ds.column_by_name("a").unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(ds.row(1), vec![2.0, 4.0]);
        assert_eq!(ds.index_of("c"), Err(DataError::UnknownColumn("c".to_string())));
    }

    #[test]
    fn test_from_column_major() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let ds = Dataset::from_column_major(&["x", "y"], &data, 3).unwrap();
        assert_eq!(ds.column(1), &[4.0, 5.0, 6.0]);
        assert!(matches!(
            Dataset::from_column_major(&["x", "y"], &data, 2),
            Err(DataError::LengthMismatch(..))
        ));
    }

    #[test]
    fn test_dataset_validation() {
        assert_eq!(
            Dataset::new(vec![("a", vec![1.0, 2.0]), ("b", vec![1.0])]).unwrap_err(),
            DataError::LengthMismatch("b".to_string(), 2, 1)
        );
        assert_eq!(
            Dataset::new(vec![("a", vec![1.0, f64::NAN])]).unwrap_err(),
            DataError::NonFinite("a".to_string(), 1)
        );
        assert_eq!(
            Dataset::new(vec![("a", vec![1.0]), ("a", vec![2.0])]).unwrap_err(),
            DataError::DuplicateColumn("a".to_string())
        );
        assert_eq!(Dataset::new(vec![("a", vec![])]).unwrap_err(), DataError::Empty);
    }

    #[test]
    fn test_check_variance() {
        let ds = Dataset::new(vec![("a", vec![1.0, 2.0]), ("k", vec![3.0, 3.0])]).unwrap();
        assert_eq!(ds.check_variance(), Err(DataError::ConstantColumn("k".to_string())));

        let offset = Dataset::new(vec![("a", vec![1.0, 2.0, 3.0]), ("big", vec![1e9 + 0.1; 3])]).unwrap();
        assert_eq!(offset.check_variance(), Err(DataError::ConstantColumn("big".to_string())));

        let tiny = Dataset::new(vec![("a", vec![1e-7, -2e-7, 3e-7]), ("b", vec![0.0, 1e-9, 0.0])]).unwrap();
        assert!(tiny.variance(0) < 1e-12);
        assert_eq!(tiny.check_variance(), Ok(()));
    }

    #[test]
    fn test_covariance() {
        let ds = Dataset::new(vec![("a", vec![1.0, 2.0, 3.0, 4.0]), ("b", vec![2.0, 4.0, 6.0, 8.0])]).unwrap();
        let s = ds.covariance(false);
        assert_relative_eq!(s[(0, 0)], 1.25, epsilon = 1e-12);
        assert_relative_eq!(s[(0, 1)], 2.5, epsilon = 1e-12);
        assert_relative_eq!(s[(1, 0)], 2.5, epsilon = 1e-12);
        assert_relative_eq!(s[(1, 1)], 5.0, epsilon = 1e-12);

        let s = ds.covariance(true);
        assert_relative_eq!(s[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(s[(0, 1)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_with_column_and_select() {
        let ds = Dataset::new(vec![("a", vec![1.0, 2.0])]).unwrap();
        let ds2 = ds.with_column("b", vec![0.0, 1.0]).unwrap();
        assert_eq!(ds.cols(), 1);
        assert_eq!(ds2.names(), &["a".to_string(), "b".to_string()]);
        let sel = ds2.select(&["b"]).unwrap();
        assert_eq!(sel.cols(), 1);
        assert_eq!(sel.column(0), &[0.0, 1.0]);
    }
}
