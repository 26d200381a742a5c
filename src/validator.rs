//! Per-fold and cross-fold evaluation.
//!
//! For each fold the validator reads back every test project's recommendations
//! and ground truth, writes the per-project `PrecisionRecall`, `SuccesRate`,
//! `SuccesRateN` and `FScore` files, and writes one `Results/<Metric>_Round<k>`
//! file per metric with one line per cutoff.
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use rayon::prelude::*;

use crate::classifier::TopicClassifier;
use crate::config::EvaluationConfig;
use crate::error::Result;
use crate::folds::Fold;
use crate::metrics;
use crate::store::{self, Project, ProjectStore, ranked_topics};

use log::{debug, info, warn};

/// Metric files written per fold, by name prefix.
pub const FOLD_METRICS: &[&str] = &[
    "PRC", "SR", "SR_STAR", "FScore", "Recall", "nDCG", "Entropy", "EPC", "Catalog", "LongTail", "EBN", "MAE",
];

/// Everything the validator needs about one test project.
#[derive(Debug, Clone, Default)]
pub struct ProjectEvaluation {
    pub project: Project,
    /// Recommended items in rank order.
    pub ranked: Vec<String>,
    /// Ranked items with a non-zero score.
    pub nonzero: Vec<String>,
    pub scores: HashMap<String, f64>,
    pub ground_truth: BTreeSet<String>,
    pub ratings: HashMap<String, f64>,
}

/// Fold-level results; vectors are indexed by `cutoff - 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoldMetrics {
    pub round: usize,
    pub projects: usize,
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub success: Vec<f64>,
    pub success_star: Vec<[f64; 4]>,
    pub f_score: Vec<f64>,
    pub ndcg: Vec<f64>,
    pub entropy: Vec<f64>,
    pub epc: Vec<f64>,
    pub coverage: Vec<f64>,
    pub long_tail: Option<Vec<f64>>,
    pub ebn: Vec<f64>,
    pub recall_rate: f64,
    /// Per-project MAE, present when rated ground truth is enabled.
    pub mae: Option<Vec<f64>>,
}

/// Classifier topics scored against each project's real dependencies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierReport {
    pub projects: usize,
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub success: Vec<f64>,
    pub coverage: Vec<f64>,
}

fn mean_over<T>(items: &[T], f: impl Fn(&T) -> f64) -> f64 {
    metrics::mean(&items.iter().map(f).collect::<Vec<_>>())
}

fn fmt_row(cutoff: usize, values: &[f64]) -> String {
    let mut row = cutoff.to_string();
    for v in values {
        row.push('\t');
        row.push_str(&v.to_string());
    }
    row
}

pub struct Validator<'a> {
    config: &'a EvaluationConfig,
    store: &'a ProjectStore,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a EvaluationConfig, store: &'a ProjectStore) -> Self {
        Self { config, store }
    }

    /// Reads the outputs of the earlier stages for one project.
    pub fn load_project(&self, project: &Project, round_dir: &Path) -> ProjectEvaluation {
        let stem = self.store.stem(&project.uri);
        let scored = store::read_recommendation_scores(&round_dir.join("Recommendations").join(&stem));
        let ranked: Vec<String> = scored.iter().map(|(item, _)| item.clone()).collect();
        let nonzero: Vec<String> =
            scored.iter().filter(|(_, s)| *s != 0.0).map(|(item, _)| item.clone()).collect();

        let (ground_truth, ratings) = if self.config.rating_ground_truth {
            let ratings = store::read_ground_truth_scores(&round_dir.join("GroundTruthScores").join(&stem));
            (ratings.keys().cloned().collect(), ratings)
        } else {
            (store::read_ground_truth(&round_dir.join("GroundTruth").join(&stem)), HashMap::new())
        };

        ProjectEvaluation {
            project: project.clone(),
            ranked,
            nonzero,
            scores: scored.into_iter().collect(),
            ground_truth,
            ratings,
        }
    }

    /// Writes the per-project metric files of one project.
    pub fn write_project_files(&self, eval: &ProjectEvaluation, round_dir: &Path) -> Result<()> {
        let stem = self.store.stem(&eval.project.uri);
        let cutoffs = 1..=self.config.cutoff;

        let mut pr = Vec::with_capacity(self.config.cutoff);
        let mut sr = Vec::with_capacity(self.config.cutoff);
        let mut srn = Vec::with_capacity(self.config.cutoff);
        let mut fs = Vec::with_capacity(self.config.cutoff);
        for k in cutoffs {
            let p = metrics::precision_at_k(&eval.ranked, &eval.ground_truth, k);
            let r = metrics::recall_at_k(&eval.ranked, &eval.ground_truth, k);
            pr.push(fmt_row(k, &[r, p]));
            sr.push(fmt_row(k, &[metrics::success_at_k(&eval.ranked, &eval.ground_truth, k)]));
            srn.push(format!("{}\t{}", k, metrics::hits_at_k(&eval.ranked, &eval.ground_truth, k)));
            fs.push(fmt_row(k, &[metrics::f_score(p, r)]));
        }

        store::write_lines(&round_dir.join("PrecisionRecall").join(&stem), pr)?;
        store::write_lines(&round_dir.join("SuccesRate").join(&stem), sr)?;
        store::write_lines(&round_dir.join("SuccesRateN").join(&stem), srn)?;
        store::write_lines(&round_dir.join("FScore").join(&stem), fs)?;
        Ok(())
    }

    /// Computes the fold metrics from in-memory project evaluations.
    pub fn compute(&self, round: usize, evals: &[ProjectEvaluation], vocabulary: &BTreeSet<String>) -> FoldMetrics {
        let cutoff = self.config.cutoff;
        let ranked: Vec<Vec<String>> = evals.iter().map(|e| e.ranked.clone()).collect();
        let nonzero: Vec<Vec<String>> = evals.iter().map(|e| e.nonzero.clone()).collect();
        let truths: Vec<BTreeSet<String>> = evals.iter().map(|e| e.ground_truth.clone()).collect();
        let popularity = metrics::popularity(&ranked, self.config.popularity_depth);
        let long_tail: Option<HashSet<String>> = self.config.long_tail_file.as_deref().map(store::read_long_tail);

        let mut m = FoldMetrics { round, projects: evals.len(), ..Default::default() };
        for k in 1..=cutoff {
            m.precision.push(mean_over(evals, |e| metrics::precision_at_k(&e.ranked, &e.ground_truth, k)));
            m.recall.push(mean_over(evals, |e| metrics::recall_at_k(&e.ranked, &e.ground_truth, k)));
            m.success.push(mean_over(evals, |e| metrics::success_at_k(&e.ranked, &e.ground_truth, k)));
            m.f_score.push(mean_over(evals, |e| {
                metrics::f_score(
                    metrics::precision_at_k(&e.ranked, &e.ground_truth, k),
                    metrics::recall_at_k(&e.ranked, &e.ground_truth, k),
                )
            }));
            m.ndcg.push(mean_over(evals, |e| metrics::ndcg_at_k(&e.nonzero, &e.ground_truth, k)));

            let mut star = [0.0; 4];
            for e in evals {
                let buckets = metrics::success_buckets(metrics::hits_at_k(&e.ranked, &e.ground_truth, k) as f64);
                for (s, b) in star.iter_mut().zip(buckets) {
                    *s += b;
                }
            }
            if !evals.is_empty() {
                star.iter_mut().for_each(|s| *s /= evals.len() as f64);
            }
            m.success_star.push(star);

            m.entropy.push(metrics::entropy_at_k(&nonzero, k));
            m.epc.push(metrics::epc_at_k(&nonzero, &truths, &popularity, k));
            m.coverage.push(metrics::catalog_coverage_at_k(&ranked, vocabulary, k));
            m.ebn.push(metrics::ebn_at_k(&ranked, k));
            if let Some(tail) = &long_tail {
                m.long_tail.get_or_insert_with(Vec::new).push(metrics::long_tail_share_at_k(&nonzero, tail, k));
            }
        }
        m.recall_rate = metrics::recall_rate(&ranked, &truths, cutoff);

        if self.config.rating_ground_truth {
            m.mae = Some(evals.iter().filter_map(|e| metrics::mean_absolute_error(&e.scores, &e.ratings)).collect());
        }
        m
    }

    /// Writes the `Results/<Metric>_Round<k>` files of a fold.
    pub fn write_fold_results(&self, m: &FoldMetrics) -> Result<()> {
        let results = self.config.results_path();
        let file = |name: &str| results.join(format!("{}_Round{}", name, m.round));
        let indexed = |values: &[f64]| -> Vec<String> {
            values.iter().enumerate().map(|(i, v)| fmt_row(i + 1, &[*v])).collect()
        };
        let plain = |values: &[f64]| -> Vec<String> { values.iter().map(|v| v.to_string()).collect() };

        let prc: Vec<String> =
            m.recall.iter().zip(&m.precision).enumerate().map(|(i, (r, p))| fmt_row(i + 1, &[*r, *p])).collect();
        store::write_lines(&file("PRC"), prc)?;
        store::write_lines(&file("SR"), indexed(&m.success))?;
        let star: Vec<String> = m
            .success_star
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}\t{:.3}\t{:.3}\t{:.3}\t{:.3}", i + 1, s[0], s[1], s[2], s[3]))
            .collect();
        store::write_lines(&file("SR_STAR"), star)?;
        store::write_lines(&file("FScore"), indexed(&m.f_score))?;
        store::write_lines(&file("Recall"), [m.recall_rate.to_string()])?;
        store::write_lines(&file("nDCG"), plain(&m.ndcg))?;
        store::write_lines(&file("Entropy"), plain(&m.entropy))?;
        store::write_lines(&file("EPC"), plain(&m.epc))?;
        store::write_lines(&file("Catalog"), indexed(&m.coverage))?;
        store::write_lines(&file("EBN"), plain(&m.ebn))?;
        if let Some(tail) = &m.long_tail {
            store::write_lines(&file("LongTail"), plain(tail))?;
        }
        if let Some(mae) = &m.mae {
            store::write_lines(&file("MAE"), plain(mae))?;
        }
        info!("Wrote fold {} results to {}", m.round, results.display());
        Ok(())
    }

    /// Loads, scores and persists one fold. Per-project write failures are logged.
    pub fn evaluate_fold(
        &self,
        fold: &Fold,
        testing: &[Project],
        vocabulary: &BTreeSet<String>,
    ) -> Result<FoldMetrics> {
        let round_dir = self.config.round_path(fold.index);
        info!("Evaluating {} projects of round {}", testing.len(), fold.index);

        let evals: Vec<ProjectEvaluation> = testing
            .par_iter()
            .map(|p| {
                let eval = self.load_project(p, &round_dir);
                if let Err(e) = self.write_project_files(&eval, &round_dir) {
                    warn!("Cannot write metric files for {}: {}", p.uri, e);
                }
                eval
            })
            .collect();

        let m = self.compute(fold.index, &evals, vocabulary);
        debug!(
            "Round {}: P@1={:.4} R@{}={:.4} recall rate {:.4}",
            fold.index,
            m.precision.first().copied().unwrap_or(0.0),
            self.config.cutoff,
            m.recall.last().copied().unwrap_or(0.0),
            m.recall_rate
        );
        self.write_fold_results(&m)?;
        Ok(m)
    }

    /// Line-wise column means of every `Results/<Metric>_Round<k>` over `rounds`,
    /// written to `Results/<Metric>_Mean`. Metrics with no file are skipped.
    pub fn aggregate_across_folds(&self, rounds: &[usize]) -> Result<Vec<(String, Vec<Vec<f64>>)>> {
        let results = self.config.results_path();
        let mut out = Vec::new();

        for &name in FOLD_METRICS {
            let tables: Vec<Vec<Vec<f64>>> = rounds
                .iter()
                .map(|r| results.join(format!("{}_Round{}", name, r)))
                .filter(|p| p.exists())
                .map(|p| store::read_metric_rows(&p))
                .collect();
            if tables.is_empty() {
                continue;
            }

            let lines = tables.iter().map(Vec::len).max().unwrap_or(0);
            let mut means: Vec<Vec<f64>> = Vec::with_capacity(lines);
            for i in 0..lines {
                let rows: Vec<&Vec<f64>> = tables.iter().filter_map(|t| t.get(i)).collect();
                let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
                let row: Vec<f64> = (0..width)
                    .map(|c| metrics::mean(&rows.iter().filter_map(|r| r.get(c).copied()).collect::<Vec<_>>()))
                    .collect();
                means.push(row);
            }

            let rendered = means.iter().map(|row| {
                row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\t")
            });
            store::write_lines(&results.join(format!("{}_Mean", name)), rendered)?;
            debug!("{}: averaged {} folds", name, tables.len());
            out.push((name.to_string(), means));
        }
        info!("Aggregated {} metrics across {} folds", out.len(), rounds.len());
        Ok(out)
    }

    /// Scores the classifier's own topic ranking against every project's dependencies.
    pub fn evaluate_classifier(&self, classifier: &dyn TopicClassifier) -> Result<ClassifierReport> {
        let cutoff = self.config.cutoff;
        let mut projects: Vec<(Vec<String>, BTreeSet<String>)> = Vec::new();
        for key in classifier.project_keys() {
            let real = self.store.libraries(&self.store.project_for_key(&key));
            if real.is_empty() {
                continue;
            }
            let topics = classifier.rank_topics(&key);
            let ranked: Vec<String> = ranked_topics(&topics).into_iter().map(|t| t.dependency_tag()).collect();
            projects.push((ranked, real));
        }

        let all_real: BTreeSet<String> = projects.iter().flat_map(|(_, r)| r.iter().cloned()).collect();
        let lists: Vec<Vec<String>> = projects.iter().map(|(l, _)| l.clone()).collect();
        let mut report = ClassifierReport { projects: projects.len(), ..Default::default() };
        for k in 1..=cutoff {
            report.precision.push(mean_over(&projects, |(l, r)| metrics::precision_at_k(l, r, k)));
            report.recall.push(mean_over(&projects, |(l, r)| metrics::recall_at_k(l, r, k)));
            report.success.push(mean_over(&projects, |(l, r)| metrics::success_at_k(l, r, k)));
            report.coverage.push(metrics::catalog_coverage_at_k(&lists, &all_real, k));
        }

        let results = self.config.results_path();
        let prc = (0..cutoff)
            .map(|i| fmt_row(i + 1, &[report.recall[i], report.precision[i], report.success[i]]));
        store::write_lines(&results.join("Classifier_PRC"), prc)?;
        let coverage = report.coverage.iter().enumerate().map(|(i, c)| fmt_row(i + 1, &[*c]));
        store::write_lines(&results.join("Classifier_Coverage"), coverage)?;
        info!("Classifier baseline over {} projects", report.projects);
        Ok(report)
    }
}
