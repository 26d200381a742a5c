use std::fs;
use std::path::Path;

use crate::classifier::ScoredTopic;
use crate::store::{self, GroundTruthSplit, IDENTITY_ORDINAL, Project, ProjectDictionary, ProjectStore};
use crate::tests::init;
use crate::tests::test_data::{PREFIX, dep, deps, small_dataset};

fn project_dict(n_deps: usize, users: &[&str]) -> ProjectDictionary {
    let mut d = ProjectDictionary::new();
    d.insert(IDENTITY_ORDINAL, "git://github.com/a/t");
    let mut ordinal = 2;
    for u in users {
        d.insert(ordinal, *u);
        ordinal += 1;
    }
    for i in 0..n_deps {
        d.insert(ordinal, dep(&format!("lib{}", i)));
        ordinal += 1;
    }
    d
}

#[test]
fn test_split_half_sizes() {
    for n in [0usize, 1, 2, 5, 8] {
        let split = GroundTruthSplit::split_half(&project_dict(n, &[]), false);
        assert_eq!(split.held_out.len(), n / 2, "held out for {} deps", n);
        assert_eq!(split.visible_dependencies().len(), n - n / 2);
        assert_eq!(split.visible.identity(), Some("git://github.com/a/t"));

        let visible = split.visible_dependencies();
        assert!(split.held_out.dependency_tags().is_disjoint(&visible));
    }
}

#[test]
fn test_split_half_holds_out_leading_entries() {
    let split = GroundTruthSplit::split_half(&project_dict(4, &[]), false);
    assert_eq!(split.held_out.dependency_tags(), deps(&["lib0", "lib1"]));
    assert_eq!(split.visible_dependencies(), deps(&["lib2", "lib3"]));
}

#[test]
fn test_split_half_users_only_when_asked() {
    let d = project_dict(2, &["alice", "bob"]);
    let without = GroundTruthSplit::split_half(&d, false);
    assert_eq!(without.visible.len(), 2);

    let with = GroundTruthSplit::split_half(&d, true);
    assert_eq!(with.visible.len(), 4);
    assert_eq!(with.visible.get(2), Some("alice"));
    assert_eq!(with.held_out.len(), 1);
}

#[test]
fn test_split_top_n_seeds_ranked_topics() {
    let d = project_dict(3, &[]);
    let topics = vec![ScoredTopic::new("low", 0.1), ScoredTopic::new("high", 0.9), ScoredTopic::new("mid", 0.5)];
    let split = GroundTruthSplit::split_top_n("git://github.com/a/t", &d, &topics, 2);

    assert_eq!(split.visible.get(1), Some("git://github.com/a/t"));
    assert_eq!(split.visible.get(2), Some(dep("high").as_str()));
    assert_eq!(split.visible.get(3), Some(dep("mid").as_str()));
    assert_eq!(split.visible.len(), 3);
    assert_eq!(split.held_out.len(), 3);
}

#[test]
fn test_dictionary_keeps_file_order_on_replace() {
    let mut d = ProjectDictionary::new();
    d.insert(5, "b");
    d.insert(2, "a");
    d.insert(5, "c");
    let entries: Vec<(usize, &str)> = d.iter().collect();
    assert_eq!(entries, vec![(5, "c"), (2, "a")]);
}

#[test]
fn test_dictionary_skips_malformed_lines() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dicth_x");
    fs::write(&path, "1\tgit://github.com/a/x\nabc\t#DEP# bad\n3\n\n4\t#DEP# good\n").unwrap();

    let d = ProjectDictionary::load_filtered(&path, |_, _| true);
    assert_eq!(d.len(), 2);
    assert_eq!(d.get(4), Some("#DEP# good"));
}

#[test]
fn test_store_reads_fixture() {
    init();
    let data = small_dataset();
    let store = data.store();
    assert_eq!(store.len(), 4);
    assert_eq!(store.projects()[0], Project::new(1, "git://github.com/a/t"));
    assert_eq!(store.stem("git://github.com/a/t"), "a__t");
    assert_eq!(store.classifier_key("git://github.com/a/t"), "a/t");

    let t = data.project(1);
    assert_eq!(store.libraries(&t), deps(&["X", "Y"]));
    let d = store.read_dictionary(&t);
    assert_eq!(d.dependencies().map(|(_, tag)| tag.to_string()).collect::<Vec<_>>(), vec![dep("Y"), dep("X")]);
    assert_eq!(store.load_graph(&t, None).num_edges(), 2);
}

#[test]
fn test_project_range_is_clipped() {
    let projects: Vec<Project> = (1..=5).map(|i| Project::new(i, format!("{}o/p{}", PREFIX, i))).collect();
    let store = ProjectStore::from_projects(".", PREFIX, projects);

    assert_eq!(store.read_project_range(2, 3).iter().map(|p| p.ordinal).collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(store.read_project_range(4, 99).len(), 2);
    assert!(store.read_project_range(0, 3).is_empty());
    assert!(store.read_project_range(4, 3).is_empty());
    assert!(store.read_project_range(6, 9).is_empty());
}

#[test]
fn test_missing_files_read_as_empty() {
    init();
    let missing = Path::new("/nonexistent/file");
    assert!(store::read_project_list(missing).is_empty());
    assert!(store::read_similarities(missing, 10).is_empty());
    assert!(store::read_recommendations(missing, 10).is_empty());
    assert!(store::read_ground_truth(missing).is_empty());
    assert!(store::read_metric_rows(missing).is_empty());
}

#[test]
fn test_writers_round_trip_through_readers() {
    init();
    let dir = tempfile::tempdir().unwrap();

    let sims = dir.path().join("Similarities").join("a__t");
    store::write_similarities(
        &sims,
        "git://github.com/a/t",
        &[("git://github.com/a/p1".to_string(), 0.5), ("git://github.com/a/p2".to_string(), 0.25)],
    )
    .unwrap();
    let read = store::read_similarities(&sims, 1);
    assert_eq!(read, vec![("git://github.com/a/p1".to_string(), 0.5)]);

    let recs = dir.path().join("Recommendations").join("a__t");
    store::write_recommendations(&recs, &[(dep("Y"), 0.75), (dep("Z"), 0.0), (dep("W"), 0.5)]).unwrap();
    assert_eq!(store::read_recommendations(&recs, 2), vec![dep("Y"), dep("Z")]);
    assert_eq!(store::read_nonzero_recommendations(&recs), vec![dep("Y"), dep("W")]);

    let gt = dir.path().join("GroundTruth").join("a__t");
    let held: ProjectDictionary = vec![(2, dep("Y")), (5, dep("Q"))].into_iter().collect();
    store::write_ground_truth(&gt, &held).unwrap();
    assert_eq!(store::read_ground_truth(&gt), deps(&["Q", "Y"]));
}

#[test]
fn test_writers_truncate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out");
    store::write_lines(&path, ["a", "b", "c"]).unwrap();
    store::write_lines(&path, ["d"]).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "d\n");
}

#[test]
fn test_rated_ground_truth_and_long_tail() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let rated = dir.path().join("rated");
    fs::write(&rated, "2\t#DEP# Y%4\n3\t#DEP# Z%2.5\n4\tnorating\n").unwrap();
    let ratings = store::read_ground_truth_scores(&rated);
    assert_eq!(ratings.len(), 2);
    assert_eq!(ratings[&dep("Z")], 2.5);

    let tail = dir.path().join("tail");
    fs::write(&tail, "#DEP# Z\t3\n#DEP# W\n").unwrap();
    let set = store::read_long_tail(&tail);
    assert!(set.contains(&dep("Z")) && set.contains(&dep("W")));

    let metric = dir.path().join("metric");
    fs::write(&metric, "1\t0.5\t0.25\n2\tx\n3\t1\t1\n").unwrap();
    assert_eq!(store::read_metric_rows(&metric), vec![vec![1.0, 0.5, 0.25], vec![3.0, 1.0, 1.0]]);

}

#[test]
fn test_project_ordinals_follow_line_numbers() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("projects.txt");
    fs::write(&path, format!("{p}a/one,1\n\n{p}a/three,3\n  \n{p}a/five\n", p = PREFIX)).unwrap();

    let projects = store::read_project_list(&path);
    let ordinals: Vec<usize> = projects.iter().map(|p| p.ordinal).collect();
    assert_eq!(ordinals, vec![1, 3, 5]);
    assert_eq!(projects[1].uri, format!("{}a/three", PREFIX));

    let store = ProjectStore::from_projects(dir.path(), PREFIX, projects);
    assert_eq!(store.len(), 3);
    assert_eq!(store.positions(), 5);
    assert_eq!(store.read_project_range(3, 3), vec![Project::new(3, format!("{}a/three", PREFIX))]);
    assert!(store.read_project_range(2, 2).is_empty());
    assert_eq!(store.read_project_range(2, 4).len(), 1);
    assert_eq!(store.read_project_range(1, 99).len(), 3);
}
