//! Neighbour-based rating prediction.
//!
//! Every strategy predicts a score for each artifact the target has not revealed
//! (the `UNKNOWN` cells of its presence row) and ranks them descending. Equal
//! scores keep column order.
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{RecError, Result};
use crate::presence::{PRESENT, PresenceMatrix};
use crate::runner::CancellationToken;
use crate::similarity::{SimilarityOutcome, TrainingSet};
use crate::sparse::SparseVector;
use crate::store::{self, IDENTITY_ORDINAL, ProjectStore};

use log::{debug, info, trace};

/// Baseline rating of a known artifact.
pub const BASELINE_RATING: f64 = 1.0;

/// Score written for classifier topics placed ahead of the computed ranking.
pub const SEEDED_TOPIC_SCORE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PredictionStrategy {
    UserBased,
    ItemBased,
    /// Item-based with the `sqrt(co) / (sqrt(n_j) + sqrt(n_j'))` overlap measure.
    Hybrid,
}

impl fmt::Display for PredictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PredictionStrategy::UserBased => "user-based",
            PredictionStrategy::ItemBased => "item-based",
            PredictionStrategy::Hybrid => "hybrid",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for PredictionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "user-based" => Ok(PredictionStrategy::UserBased),
            "item" | "item-based" => Ok(PredictionStrategy::ItemBased),
            "hybrid" => Ok(PredictionStrategy::Hybrid),
            other => Err(format!("unknown prediction strategy '{}'", other)),
        }
    }
}

/// Overlap similarity of two binary columns.
#[inline]
pub fn overlap_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let co = a.dot(b);
    let denom = (a.nnz() as f64).sqrt() + (b.nnz() as f64).sqrt();
    if denom > 0.0 { co.sqrt() / denom } else { 0.0 }
}

/// Sorts `(column, score)` pairs by descending score, keeping column order on ties.
fn rank(mut scored: Vec<(usize, f64)>) -> Vec<(usize, f64)> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored
}

impl PredictionStrategy {
    /// Ranked `(column, score)` predictions for every unknown column.
    ///
    /// `similarities[k]` is the similarity of neighbour row `k` to the target.
    pub fn predict(&self, matrix: &PresenceMatrix, similarities: &[f64]) -> Vec<(usize, f64)> {
        assert_eq!(similarities.len(), matrix.neighbours(), "one similarity per neighbour row");
        let scored = match self {
            PredictionStrategy::UserBased => Self::user_based(matrix, similarities),
            PredictionStrategy::ItemBased => Self::item_based(matrix, |a, b| a.cosine_similarity(b)),
            PredictionStrategy::Hybrid => Self::item_based(matrix, overlap_similarity),
        };
        rank(scored)
    }

    fn user_based(matrix: &PresenceMatrix, similarities: &[f64]) -> Vec<(usize, f64)> {
        let total: f64 = similarities.iter().sum();
        let means: Vec<f64> = (0..matrix.neighbours()).map(|k| matrix.row_mean(k)).collect();

        matrix
            .unknown_columns()
            .into_iter()
            .map(|j| {
                if total == 0.0 {
                    return (j, BASELINE_RATING);
                }
                let deviation: f64 = (0..matrix.neighbours())
                    .map(|k| similarities[k] * (matrix.get(k, j) - means[k]))
                    .sum();
                (j, BASELINE_RATING + deviation / total)
            })
            .collect()
    }

    fn item_based<F>(matrix: &PresenceMatrix, similarity: F) -> Vec<(usize, f64)>
    where
        F: Fn(&SparseVector, &SparseVector) -> f64,
    {
        let columns = matrix.neighbour_columns();
        let known: Vec<usize> = (0..matrix.ncols()).filter(|&j| !matrix.is_unknown(j)).collect();

        matrix
            .unknown_columns()
            .into_iter()
            .map(|j| {
                let mean = matrix.mean_presence(j);
                let mut weighted = 0.0;
                let mut total = 0.0;
                for &other in &known {
                    let sim = similarity(&columns[j], &columns[other]);
                    weighted += sim * (matrix.target(other) - PRESENT);
                    total += sim;
                }
                trace!("column {}: mean {:.4}, total similarity {:.4}", j, mean, total);
                if total != 0.0 { (j, weighted / total + mean) } else { (j, mean) }
            })
            .collect()
    }
}

pub struct RecommendationEngine<'a> {
    store: &'a ProjectStore,
    training: &'a TrainingSet,
    strategy: PredictionStrategy,
    neighbours: usize,
    prepend_seeds: bool,
}

impl<'a> RecommendationEngine<'a> {
    pub fn new(
        store: &'a ProjectStore,
        training: &'a TrainingSet,
        strategy: PredictionStrategy,
        neighbours: usize,
    ) -> Self {
        info!("Initializing RecommendationEngine: strategy={}, neighbours={}", strategy, neighbours);
        Self { store, training, strategy, neighbours, prepend_seeds: false }
    }

    /// Place the target's seeded topics ahead of the computed ranking.
    pub fn with_seeded_topics(mut self, prepend: bool) -> Self {
        info!("Setting seeded topic prepend: {}", prepend);
        self.prepend_seeds = prepend;
        self
    }

    /// Presence matrix of a test project against its nearest neighbours.
    pub fn presence_matrix(&self, outcome: &SimilarityOutcome) -> Option<(PresenceMatrix, Vec<f64>)> {
        let top: Vec<(usize, f64)> = outcome.ranked.iter().take(self.neighbours).copied().collect();
        let libraries: Vec<_> = top.iter().map(|&(i, _)| &self.training.libraries[i]).collect();
        let similarities: Vec<f64> = top.iter().map(|&(_, s)| s).collect();
        PresenceMatrix::build(&libraries, &outcome.visible_dependencies()).map(|m| (m, similarities))
    }

    /// Ranked `(artifact, score)` list for one test project.
    pub fn recommend(&self, outcome: &SimilarityOutcome) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = Vec::new();
        if self.prepend_seeds {
            out.extend(
                outcome
                    .split
                    .visible
                    .iter()
                    .filter(|&(o, _)| o != IDENTITY_ORDINAL)
                    .map(|(_, tag)| (tag.to_string(), SEEDED_TOPIC_SCORE)),
            );
        }

        if let Some((matrix, similarities)) = self.presence_matrix(outcome) {
            let predicted = self.strategy.predict(&matrix, &similarities);
            out.extend(predicted.into_iter().map(|(j, score)| (matrix.columns()[j].clone(), score)));
        }
        out
    }

    /// Recommends for one project and writes `Recommendations/<project>`.
    pub fn process(&self, outcome: &SimilarityOutcome, round_dir: &Path) -> Result<Vec<(String, f64)>> {
        let ranked = self.recommend(outcome);
        let path = round_dir.join("Recommendations").join(self.store.stem(&outcome.project.uri));
        store::write_recommendations(&path, &ranked)?;
        debug!("{}: {} recommendations", outcome.project.uri, ranked.len());
        Ok(ranked)
    }

    pub fn run(
        &self,
        outcomes: &[SimilarityOutcome],
        round_dir: &Path,
        cancel: &CancellationToken,
    ) -> Vec<Result<Vec<(String, f64)>>> {
        info!("Recommending for {} test projects", outcomes.len());
        outcomes
            .par_iter()
            .map(|o| {
                if cancel.is_cancelled() {
                    return Err(RecError::Cancelled);
                }
                self.process(o, round_dir)
            })
            .collect()
    }
}
