//! Cross-validation orchestration.
//!
//! Each fold runs three stages, joined at the stage boundary: similarities (which
//! also persist the ground truth), recommendations, then evaluation. Within a stage
//! test projects are independent tasks. A project whose output cannot be written
//! is logged and counted as failed; the fold carries on without it.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::classifier::TopicClassifier;
use crate::config::{EvaluationConfig, SeedingMode};
use crate::error::{RecError, Result};
use crate::folds::{self, Fold};
use crate::recommend::RecommendationEngine;
use crate::similarity::{SimilarityEngine, TrainingSet, similarity_matrix};
use crate::store::{Project, ProjectStore};
use crate::validator::{ClassifierReport, FoldMetrics, Validator};

use log::{debug, error, info, warn};

/// Shared flag checked before every per-project task.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-project task counts of one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StageCounts {
    /// Splits stage results into successes, logging and counting the rest.
    fn tally<T>(stage: &str, results: Vec<Result<T>>) -> (Vec<T>, Self) {
        let mut counts = StageCounts::default();
        let mut ok = Vec::with_capacity(results.len());
        for r in results {
            match r {
                Ok(v) => {
                    counts.processed += 1;
                    ok.push(v);
                }
                Err(RecError::Cancelled) => counts.skipped += 1,
                Err(e) => {
                    error!("{} failed for one project: {}", stage, e);
                    counts.failed += 1;
                }
            }
        }
        (ok, counts)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoldReport {
    pub fold: Fold,
    pub training_projects: usize,
    pub similarity: StageCounts,
    pub recommendation: StageCounts,
    /// Share of non-zero cells in the fold's similarity matrix.
    pub similarity_density: f64,
    pub metrics: FoldMetrics,
}

pub struct CrossValidationRunner {
    config: EvaluationConfig,
    store: ProjectStore,
    classifier: Option<Box<dyn TopicClassifier>>,
    cancel: CancellationToken,
}

impl CrossValidationRunner {
    /// Use [`crate::builder::EvaluationBuilder`] to assemble a runner from a config.
    pub fn new(config: EvaluationConfig, store: ProjectStore, classifier: Option<Box<dyn TopicClassifier>>) -> Self {
        info!(
            "CrossValidationRunner: {} projects, {} folds, strategy={}, seeding={:?}",
            store.len(),
            config.num_folds,
            config.strategy,
            config.seeding
        );
        Self { config, store, classifier, cancel: CancellationToken::new() }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Handle that stops the run before the next per-project task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn folds(&self) -> Vec<Fold> {
        folds::folds(self.store.positions(), self.config.num_folds)
    }

    pub fn training_projects(&self, fold: &Fold) -> Vec<Project> {
        fold.training_ranges()
            .into_iter()
            .flat_map(|(s, e)| self.store.read_project_range(s, e))
            .collect()
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() { Err(RecError::Cancelled) } else { Ok(()) }
    }

    pub fn run_fold(&self, fold: &Fold) -> Result<FoldReport> {
        info!("Starting {}", fold);
        let round_dir = self.config.round_path(fold.index);
        let testing = self.store.read_project_range(fold.testing_start, fold.testing_end);
        let training = TrainingSet::load(&self.store, self.training_projects(fold));
        let seeded = self.config.seeding == SeedingMode::ClassifierSeeded;

        let mut engine = SimilarityEngine::new(&self.store, &training, self.config.seeding_strategy())
            .with_resume(self.config.resume);
        if let Some(c) = self.classifier.as_deref() {
            engine = engine.with_classifier(c);
        }
        let (outcomes, similarity) =
            StageCounts::tally("similarity", engine.run(&testing, &round_dir, &self.cancel));
        self.check_cancelled()?;

        let matrix = similarity_matrix(&outcomes, training.len());
        let (rows, cols) = matrix.shape();
        let similarity_density = if rows * cols == 0 { 0.0 } else { matrix.nnz() as f64 / (rows * cols) as f64 };
        debug!("Round {} similarity matrix: {}x{}, density {:.4}", fold.index, rows, cols, similarity_density);

        let recommender =
            RecommendationEngine::new(&self.store, &training, self.config.strategy, self.config.num_neighbours)
                .with_seeded_topics(seeded);
        // Results line up with `outcomes`; keep the projects that got through both stages
        let recommended: Vec<Result<Project>> = outcomes
            .iter()
            .zip(recommender.run(&outcomes, &round_dir, &self.cancel))
            .map(|(o, r)| r.map(|_| o.project.clone()))
            .collect();
        let (evaluated, recommendation) = StageCounts::tally("recommendation", recommended);
        self.check_cancelled()?;
        if evaluated.len() < testing.len() {
            warn!("Round {}: evaluating {} of {} test projects", fold.index, evaluated.len(), testing.len());
        }

        let metrics =
            Validator::new(&self.config, &self.store).evaluate_fold(fold, &evaluated, &training.vocabulary())?;

        let report = FoldReport {
            fold: *fold,
            training_projects: training.len(),
            similarity,
            recommendation,
            similarity_density,
            metrics,
        };
        info!(
            "Finished round {}: {} projects, {} failed, recall rate {:.4}",
            fold.index,
            testing.len(),
            report.similarity.failed + report.recommendation.failed,
            report.metrics.recall_rate
        );
        Ok(report)
    }

    /// Runs every fold, then the cross-fold aggregation.
    pub fn run(&self) -> Result<Vec<FoldReport>> {
        let folds = self.folds();
        if folds.is_empty() {
            warn!("Nothing to evaluate: the project list is empty");
            return Ok(Vec::new());
        }

        let mut reports = Vec::with_capacity(folds.len());
        for fold in &folds {
            self.check_cancelled()?;
            reports.push(self.run_fold(fold)?);
        }

        let rounds: Vec<usize> = folds.iter().map(|f| f.index).collect();
        Validator::new(&self.config, &self.store).aggregate_across_folds(&rounds)?;
        Ok(reports)
    }

    /// Scores the classifier's own topics, when one is attached.
    pub fn evaluate_classifier(&self) -> Result<Option<ClassifierReport>> {
        match self.classifier.as_deref() {
            Some(c) => Validator::new(&self.config, &self.store).evaluate_classifier(c).map(Some),
            None => Ok(None),
        }
    }
}
