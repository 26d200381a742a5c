use std::fs;

use crate::builder::EvaluationBuilder;
use crate::classifier::RankedTopicFile;
use crate::config::{EvaluationConfig, SeedingMode};
use crate::error::RecError;
use crate::recommend::PredictionStrategy;
use crate::tests::init;
use crate::tests::test_data::{dep, small_dataset, strings};

fn recommendations(dir: &std::path::Path, round: usize, stem: &str) -> String {
    fs::read_to_string(dir.join(format!("Round{}", round)).join("Recommendations").join(stem)).unwrap()
}

#[test]
fn test_full_run_writes_every_fold() {
    init();
    let data = small_dataset();
    let runner = EvaluationBuilder::new(data.config.clone()).build().unwrap();
    assert_eq!(runner.folds().len(), 4);

    let reports = runner.run().unwrap();
    assert_eq!(reports.len(), 4);
    for r in &reports {
        assert_eq!(r.training_projects, 3);
        assert_eq!(r.similarity.processed, 1);
        assert_eq!(r.similarity.failed, 0);
        assert_eq!(r.recommendation.processed, 1);
        assert_eq!(r.metrics.projects, 1);
    }

    // the hidden Y is the top recommendation for a/t
    let recs = recommendations(data.dir.path(), 1, "a__t");
    assert!(recs.lines().next().unwrap().starts_with(&format!("{}\t", dep("Y"))));
    assert_eq!(reports[0].metrics.precision[0], 1.0);
    assert_eq!(reports[0].metrics.recall_rate, 1.0);

    let results = data.config.results_path();
    assert!(results.join("PRC_Round4").exists());
    assert!(results.join("PRC_Mean").exists());
    assert!(results.join("Recall_Mean").exists());
}

#[test]
fn test_runs_are_deterministic() {
    init();
    let data = small_dataset();
    let config = data.config.clone().with_strategy(PredictionStrategy::UserBased);

    let first = EvaluationBuilder::new(config.clone()).build().unwrap().run().unwrap();
    let snapshot: Vec<String> = (1..=4)
        .flat_map(|r| ["a__t", "a__p1", "a__p2", "a__p3"].map(|s| (r, s)))
        .filter_map(|(r, s)| fs::read_to_string(data.dir.path().join(format!("Round{}/Recommendations/{}", r, s))).ok())
        .collect();
    assert_eq!(snapshot.len(), 4);

    let second = EvaluationBuilder::new(config).build().unwrap().run().unwrap();
    let again: Vec<String> = (1..=4)
        .flat_map(|r| ["a__t", "a__p1", "a__p2", "a__p3"].map(|s| (r, s)))
        .filter_map(|(r, s)| fs::read_to_string(data.dir.path().join(format!("Round{}/Recommendations/{}", r, s))).ok())
        .collect();

    assert_eq!(snapshot, again);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.fold, b.fold);
        assert_eq!(a.metrics.precision, b.metrics.precision);
        assert_eq!(a.metrics.recall, b.metrics.recall);
        assert_eq!(a.metrics.ndcg, b.metrics.ndcg);
    }
}

#[test]
fn test_item_based_runs_are_deterministic() {
    init();
    let data = small_dataset();
    let config = data.config.clone().with_strategy(PredictionStrategy::ItemBased);
    let items = |text: &str| -> Vec<String> {
        text.lines().filter_map(|l| l.split('\t').next()).map(str::to_string).collect()
    };

    EvaluationBuilder::new(config.clone()).build().unwrap().run().unwrap();
    let first = recommendations(data.dir.path(), 1, "a__t");
    EvaluationBuilder::new(config).build().unwrap().run().unwrap();
    let second = recommendations(data.dir.path(), 1, "a__t");

    // Y and Z are both unknown to a/t; their order must not depend on hashing
    let ranked = items(&first);
    assert_eq!(ranked.len(), 2);
    assert!(ranked.contains(&dep("Y")) && ranked.contains(&dep("Z")));
    assert_eq!(ranked, items(&second));
    assert_eq!(first, second);
}

#[test]
fn test_classifier_seeded_run_prepends_topics() {
    init();
    let data = small_dataset();
    let config = data.config.clone().with_seeding(SeedingMode::ClassifierSeeded).with_classifier_topics(1);
    let classifier = RankedTopicFile::from_rankings([("a/t".to_string(), strings(&["X"]))]);

    let runner = EvaluationBuilder::new(config).with_classifier(Box::new(classifier)).build().unwrap();
    let reports = runner.run().unwrap();
    assert_eq!(reports.len(), 4);

    let recs = recommendations(data.dir.path(), 1, "a__t");
    assert_eq!(recs.lines().next(), Some(format!("{}\t2", dep("X")).as_str()));

    let baseline = runner.evaluate_classifier().unwrap().unwrap();
    assert_eq!(baseline.projects, 1);
    assert_eq!(baseline.precision[0], 1.0);
}

#[test]
fn test_cancelled_runner_stops() {
    init();
    let data = small_dataset();
    let runner = EvaluationBuilder::new(data.config.clone()).build().unwrap();
    runner.cancellation_token().cancel();

    assert!(matches!(runner.run(), Err(RecError::Cancelled)));
    assert!(!data.dir.path().join("Round1").exists());
}

#[test]
fn test_empty_project_list() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let config = EvaluationConfig::default().with_source_dir(dir.path());
    let runner = EvaluationBuilder::new(config).build().unwrap();

    assert!(runner.folds().is_empty());
    assert!(runner.run().unwrap().is_empty());
    assert!(runner.evaluate_classifier().unwrap().is_none());
}

#[test]
fn test_builder_rejects_invalid_config() {
    let config = EvaluationConfig::default().with_neighbours(0);
    assert!(matches!(EvaluationBuilder::new(config).build(), Err(RecError::Config(_))));
}

#[test]
fn test_failed_similarity_write_leaves_project_unscored() {
    init();
    let data = small_dataset();
    // a directory where the similarity file should go makes the write fail
    fs::create_dir_all(data.dir.path().join("Round1").join("Similarities").join("a__t")).unwrap();

    let reports = EvaluationBuilder::new(data.config.clone()).build().unwrap().run().unwrap();
    assert_eq!(reports.len(), 4);

    let first = &reports[0];
    assert_eq!(first.similarity.processed, 0);
    assert_eq!(first.similarity.failed, 1);
    assert_eq!(first.recommendation.processed, 0);
    assert_eq!(first.metrics.projects, 0);
    assert!(!data.dir.path().join("Round1").join("Recommendations").join("a__t").exists());
    assert!(!data.dir.path().join("Round1").join("PrecisionRecall").join("a__t").exists());

    assert!(reports[1..].iter().all(|r| r.similarity.failed == 0 && r.metrics.projects == 1));
}

#[test]
fn test_failed_recommendation_write_leaves_project_unscored() {
    init();
    let data = small_dataset();
    let recs = data.dir.path().join("Round1").join("Recommendations").join("a__t");
    fs::create_dir_all(&recs).unwrap();

    let runner = EvaluationBuilder::new(data.config.clone()).build().unwrap();
    let report = runner.run_fold(&runner.folds()[0]).unwrap();

    assert_eq!(report.similarity.processed, 1);
    assert_eq!(report.recommendation.failed, 1);
    assert_eq!(report.metrics.projects, 0);
    assert!(report.metrics.precision.iter().all(|&p| p == 0.0));
}

#[test]
fn test_resumed_run_matches_fresh_run() {
    init();
    let data = small_dataset();
    let fresh = EvaluationBuilder::new(data.config.clone()).build().unwrap().run().unwrap();
    let recs = recommendations(data.dir.path(), 1, "a__t");

    let config = data.config.clone().with_resume(true);
    assert!(config.resume);
    let resumed = EvaluationBuilder::new(config).build().unwrap().run().unwrap();

    assert_eq!(recommendations(data.dir.path(), 1, "a__t"), recs);
    for (a, b) in fresh.iter().zip(&resumed) {
        assert_eq!(b.similarity.failed, 0);
        assert_eq!(a.metrics.precision, b.metrics.precision);
        assert_eq!(a.metrics.recall, b.metrics.recall);
    }
}
