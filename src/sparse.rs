//! Fixed-size sparse containers.
//!
//! [`SparseVector`] stores only non-zero entries in index order, so iteration and
//! every reduction is deterministic. [`SparseMatrix`] is a stack of sparse rows with
//! a fixed column count and converts to a `sprs` compressed matrix when column
//! access is needed.
use std::collections::BTreeMap;
use std::fmt;

use sprs::{CsMat, TriMat};

/// A sparse vector with a fixed logical size.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector {
    size: usize,
    entries: BTreeMap<usize, f64>,
}

impl SparseVector {
    #[inline]
    pub fn new(size: usize) -> Self {
        Self { size, entries: BTreeMap::new() }
    }

    /// Builds a vector from a dense slice, keeping non-zero values only.
    ///
    /// # Examples
    ///
    /// ```
    /// use crossrec::sparse::SparseVector;
    /// let v = SparseVector::from_dense(&[0.0, 2.0, 0.0, 1.0]);
    /// assert_eq!(v.size(), 4);
    /// assert_eq!(v.nnz(), 2);
    /// ```
    pub fn from_dense(values: &[f64]) -> Self {
        let mut v = Self::new(values.len());
        for (i, &x) in values.iter().enumerate() {
            v.put(i, x);
        }
        v
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of stored (non-zero) entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Sets entry `i`. Writing zero removes the entry.
    ///
    /// # Panics
    ///
    /// Panics if `i` is outside the vector.
    #[inline]
    pub fn put(&mut self, i: usize, value: f64) {
        assert!(i < self.size, "Index out of bounds: {} for vector of size {}", i, self.size);
        if value == 0.0 {
            self.entries.remove(&i);
        } else {
            self.entries.insert(i, value);
        }
    }

    /// # Panics
    ///
    /// Panics if `i` is outside the vector.
    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        assert!(i < self.size, "Index out of bounds: {} for vector of size {}", i, self.size);
        self.entries.get(&i).copied().unwrap_or(0.0)
    }

    /// Non-zero entries in ascending index order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().map(|(&i, &v)| (i, v))
    }

    /// Dot product, walking the smaller operand.
    ///
    /// # Panics
    ///
    /// Panics if the sizes differ.
    ///
    /// # Examples
    ///
    /// ```
    /// use crossrec::sparse::SparseVector;
    /// let a = SparseVector::from_dense(&[1.0, 2.0, 3.0]);
    /// let b = SparseVector::from_dense(&[4.0, 5.0, 6.0]);
    /// assert_eq!(a.dot(&b), 32.0);
    /// ```
    #[inline]
    pub fn dot(&self, other: &SparseVector) -> f64 {
        assert_eq!(self.size, other.size, "Dimension mismatch");
        let (small, large) = if self.nnz() <= other.nnz() { (self, other) } else { (other, self) };
        small
            .entries
            .iter()
            .filter_map(|(i, a)| large.entries.get(i).map(|b| a * b))
            .sum()
    }

    #[inline]
    pub fn norm(&self) -> f64 {
        self.entries.values().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Multiplies every entry by `alpha` and returns the result.
    pub fn scale(&self, alpha: f64) -> SparseVector {
        let mut out = SparseVector::new(self.size);
        if alpha == 0.0 {
            return out;
        }
        for (i, v) in self.iter() {
            out.entries.insert(i, v * alpha);
        }
        out
    }

    /// Element-wise sum. Entries that cancel to zero are dropped.
    ///
    /// # Panics
    ///
    /// Panics if the sizes differ.
    pub fn plus(&self, other: &SparseVector) -> SparseVector {
        assert_eq!(self.size, other.size, "Dimension mismatch");
        let mut out = self.clone();
        for (i, v) in other.iter() {
            let sum = out.get(i) + v;
            out.put(i, sum);
        }
        out
    }

    /// Cosine similarity, `0.0` when either vector has zero norm.
    ///
    /// # Panics
    ///
    /// Panics if the sizes differ.
    ///
    /// # Examples
    ///
    /// ```
    /// use crossrec::sparse::SparseVector;
    /// let a = SparseVector::from_dense(&[1.0, 0.0]);
    /// let b = SparseVector::from_dense(&[0.0, 1.0]);
    /// assert!((a.cosine_similarity(&b) - 0.0).abs() < 1e-12);
    /// assert!((a.cosine_similarity(&a) - 1.0).abs() < 1e-12);
    /// ```
    #[inline]
    pub fn cosine_similarity(&self, other: &SparseVector) -> f64 {
        let denom = self.norm() * other.norm();
        if denom > 0.0 { self.dot(other) / denom } else { 0.0 }
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.size];
        for (i, v) in self.iter() {
            out[i] = v;
        }
        out
    }
}

impl fmt::Display for SparseVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SparseVector(size={}, nnz={}) [", self.size, self.nnz())?;
        for (n, (i, v)) in self.iter().enumerate() {
            if n > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({}, {:.4})", i, v)?;
        }
        write!(f, "]")
    }
}

/// A row-major sparse matrix with fixed dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    rows: Vec<SparseVector>,
}

impl SparseMatrix {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self { nrows, ncols, rows: (0..nrows).map(|_| SparseVector::new(ncols)).collect() }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(SparseVector::nnz).sum()
    }

    /// # Panics
    ///
    /// Panics if `(i, j)` is outside the matrix.
    #[inline]
    pub fn put(&mut self, i: usize, j: usize, value: f64) {
        assert!(
            i < self.nrows && j < self.ncols,
            "Index out of bounds: ({}, {}) for {}x{} matrix",
            i,
            j,
            self.nrows,
            self.ncols
        );
        self.rows[i].put(j, value);
    }

    /// # Panics
    ///
    /// Panics if `(i, j)` is outside the matrix.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(
            i < self.nrows && j < self.ncols,
            "Index out of bounds: ({}, {}) for {}x{} matrix",
            i,
            j,
            self.nrows,
            self.ncols
        );
        self.rows[i].get(j)
    }

    /// # Panics
    ///
    /// Panics if `i` is not a row of the matrix.
    #[inline]
    pub fn row(&self, i: usize) -> &SparseVector {
        assert!(i < self.nrows, "Row index out of bounds");
        &self.rows[i]
    }

    /// Matrix-vector product `A x`.
    ///
    /// # Panics
    ///
    /// Panics if `x.size()` differs from the column count.
    pub fn times(&self, x: &SparseVector) -> SparseVector {
        assert_eq!(self.ncols, x.size(), "Dimension mismatch");
        let mut out = SparseVector::new(self.nrows);
        for (i, row) in self.rows.iter().enumerate() {
            out.put(i, row.dot(x));
        }
        out
    }

    /// # Panics
    ///
    /// Panics if the shapes differ.
    pub fn plus(&self, other: &SparseMatrix) -> SparseMatrix {
        assert_eq!(self.shape(), other.shape(), "Dimension mismatch");
        SparseMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            rows: self.rows.iter().zip(other.rows.iter()).map(|(a, b)| a.plus(b)).collect(),
        }
    }

    /// Copies column `j` out as a vector of size `nrows`.
    pub fn column(&self, j: usize) -> SparseVector {
        assert!(j < self.ncols, "Column index out of bounds");
        let mut out = SparseVector::new(self.nrows);
        for (i, row) in self.rows.iter().enumerate() {
            out.put(i, row.get(j));
        }
        out
    }

    /// Compressed sparse row copy, assembled from triplets.
    pub fn to_csr(&self) -> CsMat<f64> {
        let mut triplets = TriMat::new((self.nrows, self.ncols));
        for (i, row) in self.rows.iter().enumerate() {
            for (j, v) in row.iter() {
                triplets.add_triplet(i, j, v);
            }
        }
        triplets.to_csr()
    }

    /// Compressed sparse column copy; `outer_view(j)` walks column `j`.
    pub fn to_csc(&self) -> CsMat<f64> {
        let mut triplets = TriMat::new((self.nrows, self.ncols));
        for (i, row) in self.rows.iter().enumerate() {
            for (j, v) in row.iter() {
                triplets.add_triplet(i, j, v);
            }
        }
        triplets.to_csc()
    }
}

impl fmt::Display for SparseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SparseMatrix({}x{}, nnz={})", self.nrows, self.ncols, self.nnz())?;
        for row in &self.rows {
            writeln!(f, "  {}", row)?;
        }
        Ok(())
    }
}
