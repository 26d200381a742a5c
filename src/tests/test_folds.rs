use crate::folds::{Fold, folds};

#[test]
fn test_folds_partition_positions() {
    let f = folds(57, 10);
    assert_eq!(f.len(), 10);

    let sizes: Vec<usize> = f.iter().map(Fold::testing_len).collect();
    assert_eq!(sizes, vec![6, 6, 6, 6, 6, 6, 6, 5, 5, 5]);

    let mut next = 1;
    for (i, fold) in f.iter().enumerate() {
        assert_eq!(fold.index, i + 1);
        assert_eq!(fold.testing_start, next);
        next = fold.testing_end + 1;
    }
    assert_eq!(next, 58);
}

#[test]
fn test_training_ranges_cover_the_rest() {
    for fold in folds(23, 4) {
        let mut covered: Vec<usize> = fold.training_ranges().into_iter().flat_map(|(s, e)| s..=e).collect();
        covered.extend(fold.testing_start..=fold.testing_end);
        covered.sort_unstable();
        assert_eq!(covered, (1..=23).collect::<Vec<_>>());
        assert!((1..=23).filter(|&p| fold.is_testing(p)).count() == fold.testing_len());
    }
}

#[test]
fn test_edge_folds_have_one_training_range() {
    let f = folds(10, 5);
    assert_eq!(f[0].training_ranges(), vec![(3, 10)]);
    assert_eq!(f[4].training_ranges(), vec![(1, 8)]);
    assert_eq!(f[2].training_ranges(), vec![(1, 4), (7, 10)]);
    assert_eq!(f[2].to_string(), "Round3: test [5, 6] train [1, 4] train [7, 10]");
}

#[test]
fn test_fewer_projects_than_folds() {
    let f = folds(3, 5);
    assert_eq!(f.len(), 3);
    assert!(f.iter().all(|fold| fold.testing_len() == 1));
    assert!(folds(0, 5).is_empty());
    assert!(folds(5, 0).is_empty());
}
