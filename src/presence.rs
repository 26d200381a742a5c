//! Neighbour x artifact presence matrix.
//!
//! Rows `0..neighbours` are the nearest training projects, the last row is the
//! target project. Columns are artifacts in first-appearance order: each
//! neighbour's (sorted) dependencies in similarity order, then the target's
//! visible dependencies.
use std::collections::{BTreeSet, HashMap};

use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::sparse::{SparseMatrix, SparseVector};

use log::{debug, warn};

pub const PRESENT: f64 = 1.0;
pub const ABSENT: f64 = 0.0;
/// Target-row marker for an artifact to predict.
pub const UNKNOWN: f64 = -1.0;

#[derive(Debug, Clone)]
pub struct PresenceMatrix {
    matrix: DenseMatrix<f64>,
    columns: Vec<String>,
    neighbours: usize,
}

impl PresenceMatrix {
    /// Builds the matrix; `None` when there is no artifact to place in a column.
    pub fn build(neighbour_libraries: &[&BTreeSet<String>], visible: &BTreeSet<String>) -> Option<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        for libs in neighbour_libraries.iter().copied().chain(std::iter::once(visible)) {
            for lib in libs {
                if !position.contains_key(lib.as_str()) {
                    position.insert(lib.as_str(), columns.len());
                    columns.push(lib.clone());
                }
            }
        }
        if columns.is_empty() {
            debug!("Presence matrix has no columns");
            return None;
        }

        let mut rows: Vec<Vec<f64>> = neighbour_libraries
            .iter()
            .map(|libs| columns.iter().map(|c| if libs.contains(c) { PRESENT } else { ABSENT }).collect())
            .collect();
        rows.push(columns.iter().map(|c| if visible.contains(c) { PRESENT } else { UNKNOWN }).collect());

        let matrix = match DenseMatrix::from_2d_vec(&rows) {
            Ok(m) => m,
            Err(e) => {
                warn!("Cannot assemble presence matrix: {}", e);
                return None;
            }
        };
        debug!("Presence matrix: {} neighbours x {} artifacts", neighbour_libraries.len(), columns.len());
        Some(Self { matrix, columns, neighbours: neighbour_libraries.len() })
    }

    #[inline]
    pub fn neighbours(&self) -> usize {
        self.neighbours
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        *self.matrix.get((row, col))
    }

    /// Value of the target row at `col`.
    #[inline]
    pub fn target(&self, col: usize) -> f64 {
        self.get(self.neighbours, col)
    }

    #[inline]
    pub fn is_unknown(&self, col: usize) -> bool {
        self.target(col) == UNKNOWN
    }

    pub fn unknown_columns(&self) -> Vec<usize> {
        (0..self.ncols()).filter(|&j| self.is_unknown(j)).collect()
    }

    /// Mean presence of neighbour `row` over every column.
    pub fn row_mean(&self, row: usize) -> f64 {
        let n = self.ncols();
        if n == 0 {
            return 0.0;
        }
        (0..n).map(|j| self.get(row, j)).sum::<f64>() / n as f64
    }

    /// Mean presence of artifact `col` across the neighbour rows.
    pub fn mean_presence(&self, col: usize) -> f64 {
        if self.neighbours == 0 {
            return 0.0;
        }
        (0..self.neighbours).map(|k| self.get(k, col)).sum::<f64>() / self.neighbours as f64
    }

    /// Neighbour rows only, without the target.
    pub fn neighbour_block(&self) -> SparseMatrix {
        let mut block = SparseMatrix::new(self.neighbours, self.ncols());
        for k in 0..self.neighbours {
            for j in 0..self.ncols() {
                block.put(k, j, self.get(k, j));
            }
        }
        block
    }

    /// Every column restricted to the neighbour rows, read through a CSC copy.
    pub fn neighbour_columns(&self) -> Vec<SparseVector> {
        let csc = self.neighbour_block().to_csc();
        (0..self.ncols())
            .map(|j| {
                let mut col = SparseVector::new(self.neighbours);
                if let Some(view) = csc.outer_view(j) {
                    for (k, &v) in view.iter() {
                        col.put(k, v);
                    }
                }
                col
            })
            .collect()
    }
}
