use std::collections::BTreeSet;

use approx::assert_relative_eq;

use crate::presence::{ABSENT, PRESENT, PresenceMatrix, UNKNOWN};
use crate::tests::test_data::{dep, deps};

fn neighbourhood() -> (Vec<BTreeSet<String>>, BTreeSet<String>) {
    (vec![deps(&["X", "Y"]), deps(&["X", "Z"]), deps(&["Y", "Z"])], deps(&["X"]))
}

#[test]
fn test_columns_in_first_appearance_order() {
    let (libs, visible) = neighbourhood();
    let refs: Vec<&BTreeSet<String>> = libs.iter().collect();
    let m = PresenceMatrix::build(&refs, &visible).unwrap();

    assert_eq!(m.columns(), &[dep("X"), dep("Y"), dep("Z")]);
    assert_eq!(m.neighbours(), 3);
    assert_eq!(m.get(0, 2), ABSENT);
    assert_eq!(m.get(1, 2), PRESENT);
    assert_eq!(m.target(0), PRESENT);
    assert_eq!(m.target(1), UNKNOWN);
    assert_eq!(m.unknown_columns(), vec![1, 2]);
}

#[test]
fn test_visible_only_artifacts_get_a_column() {
    let libs = deps(&["A"]);
    let visible = deps(&["B"]);
    let m = PresenceMatrix::build(&[&libs], &visible).unwrap();
    assert_eq!(m.columns(), &[dep("A"), dep("B")]);
    assert_eq!(m.get(0, 1), ABSENT);
    assert_eq!(m.unknown_columns(), vec![0]);
}

#[test]
fn test_means() {
    let (libs, visible) = neighbourhood();
    let refs: Vec<&BTreeSet<String>> = libs.iter().collect();
    let m = PresenceMatrix::build(&refs, &visible).unwrap();

    assert_relative_eq!(m.row_mean(0), 2.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(m.mean_presence(0), 2.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(m.mean_presence(2), 2.0 / 3.0, epsilon = 1e-12);
}

#[test]
fn test_neighbour_columns_exclude_target() {
    let (libs, visible) = neighbourhood();
    let refs: Vec<&BTreeSet<String>> = libs.iter().collect();
    let m = PresenceMatrix::build(&refs, &visible).unwrap();

    let cols = m.neighbour_columns();
    assert_eq!(cols.len(), 3);
    assert_eq!(cols[0].to_dense(), vec![1.0, 1.0, 0.0]);
    assert_eq!(cols[1].to_dense(), vec![1.0, 0.0, 1.0]);
    assert_eq!(m.neighbour_block().nnz(), 6);
}

#[test]
fn test_empty_neighbourhood_has_no_matrix() {
    let empty = BTreeSet::new();
    assert!(PresenceMatrix::build(&[], &empty).is_none());
    assert!(PresenceMatrix::build(&[&empty], &empty).is_none());
}
