use approx::assert_relative_eq;
use proptest::prelude::*;

use crate::sparse::{SparseMatrix, SparseVector};

fn dense(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(prop_oneof![Just(0.0), -10.0f64..10.0], len)
}

proptest! {
    #[test]
    fn cosine_is_symmetric((a, b) in (1usize..12).prop_flat_map(|n| (dense(n), dense(n)))) {
        let a = SparseVector::from_dense(&a);
        let b = SparseVector::from_dense(&b);
        prop_assert!((a.cosine_similarity(&b) - b.cosine_similarity(&a)).abs() < 1e-12);
    }

    #[test]
    fn cosine_with_itself_is_one_or_zero(values in dense(8)) {
        let v = SparseVector::from_dense(&values);
        let c = v.cosine_similarity(&v);
        if v.nnz() == 0 {
            prop_assert_eq!(c, 0.0);
        } else {
            prop_assert!((c - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn cosine_stays_in_unit_range((a, b) in (1usize..12).prop_flat_map(|n| (dense(n), dense(n)))) {
        let c = SparseVector::from_dense(&a).cosine_similarity(&SparseVector::from_dense(&b));
        prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&c));
    }
}

#[test]
fn test_scale_and_plus() {
    let a = SparseVector::from_dense(&[1.0, 0.0, -2.0]);
    let b = SparseVector::from_dense(&[-1.0, 3.0, 0.0]);

    let sum = a.plus(&b);
    assert_eq!(sum.nnz(), 2);
    assert_eq!(sum.to_dense(), vec![0.0, 3.0, -2.0]);

    assert_eq!(a.scale(0.0).nnz(), 0);
    assert_eq!(a.scale(2.0).to_dense(), vec![2.0, 0.0, -4.0]);
    assert_relative_eq!(a.norm(), 5.0f64.sqrt(), epsilon = 1e-12);
}

#[test]
fn test_matrix_times_counts_rows() {
    let mut m = SparseMatrix::new(3, 2);
    m.put(0, 0, 1.0);
    m.put(0, 1, 1.0);
    m.put(2, 1, 1.0);

    let ones = SparseVector::from_dense(&[1.0, 1.0]);
    let y = m.times(&ones);
    assert_eq!(y.to_dense(), vec![2.0, 0.0, 1.0]);
    assert_eq!(m.column(1).to_dense(), vec![1.0, 0.0, 1.0]);
    assert_eq!(m.nnz(), 3);
}

#[test]
fn test_csc_columns_match_dense() {
    let mut m = SparseMatrix::new(2, 3);
    m.put(0, 1, 4.0);
    m.put(1, 1, 5.0);
    m.put(1, 2, 6.0);

    let csc = m.to_csc();
    let col: Vec<(usize, f64)> = csc.outer_view(1).unwrap().iter().map(|(i, &v)| (i, v)).collect();
    assert_eq!(col, vec![(0, 4.0), (1, 5.0)]);
    assert_eq!(csc.outer_view(0).unwrap().nnz(), 0);
}

#[test]
fn test_matrix_plus_drops_cancelled_cells() {
    let mut a = SparseMatrix::new(2, 2);
    let mut b = SparseMatrix::new(2, 2);
    a.put(0, 0, 1.0);
    b.put(0, 0, -1.0);
    b.put(1, 1, 2.0);

    let c = a.plus(&b);
    assert_eq!(c.nnz(), 1);
    assert_eq!(c.get(1, 1), 2.0);
}

#[test]
#[should_panic(expected = "Index out of bounds")]
fn test_matrix_put_out_of_range_panics() {
    let mut m = SparseMatrix::new(2, 2);
    m.put(2, 0, 1.0);
}
