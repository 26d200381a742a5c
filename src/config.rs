//! Evaluation configuration.
//!
//! Every directory path and fold parameter lives in [`EvaluationConfig`], which is
//! injected into each component. It can be read from a TOML file and adjusted with
//! the `with_*` methods:
//!
//! ```toml
//! source_dir = "dataset/"
//! num_folds = 10
//! num_neighbours = 20
//! strategy = "item-based"
//! seeding = "half-split"
//! ```
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{RecError, Result};
use crate::recommend::PredictionStrategy;
use crate::similarity::SeedingStrategy;

/// How the visible part of a test project is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedingMode {
    /// Positional half split of the project's own dependencies.
    #[default]
    HalfSplit,
    /// Classifier topics act as the visible set.
    ClassifierSeeded,
}

impl std::str::FromStr for SeedingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "half" | "half-split" => Ok(SeedingMode::HalfSplit),
            "classifier" | "classifier-seeded" => Ok(SeedingMode::ClassifierSeeded),
            other => Err(format!("unknown seeding mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Root holding `projects.txt`, `dicth_*`, `graph_*` and the `Round<k>` outputs.
    pub source_dir: PathBuf,
    pub projects_file: String,
    pub results_dir: String,
    pub num_folds: usize,
    /// K, the neighbour rows of the presence matrix.
    pub num_neighbours: usize,
    /// Largest cutoff evaluated; metrics are reported for 1..=cutoff.
    pub cutoff: usize,
    pub classifier_topics: usize,
    pub popularity_depth: usize,
    pub strategy: PredictionStrategy,
    pub seeding: SeedingMode,
    pub include_users: bool,
    pub classifier_output: String,
    pub long_tail_file: Option<PathBuf>,
    pub rating_ground_truth: bool,
    pub uri_prefix: String,
    /// Reuse `Round<k>/Similarities` files left by an earlier run instead of rescoring.
    pub resume: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        debug!("Creating EvaluationConfig with default parameters");
        Self {
            source_dir: PathBuf::from("."),
            projects_file: "projects.txt".to_string(),
            results_dir: "Results".to_string(),
            num_folds: 10,
            num_neighbours: 20,
            cutoff: 20,
            classifier_topics: 5,
            popularity_depth: 50,
            strategy: PredictionStrategy::ItemBased,
            seeding: SeedingMode::HalfSplit,
            include_users: false,
            classifier_output: "training_data.csv".to_string(),
            long_tail_file: None,
            rating_ground_truth: false,
            uri_prefix: "git://github.com/".to_string(),
            resume: false,
        }
    }
}

impl EvaluationConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EvaluationConfig =
            toml::from_str(content).map_err(|e| RecError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading evaluation config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| RecError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_folds == 0 {
            return Err(RecError::Config("num_folds must be at least 1".into()));
        }
        if self.num_neighbours == 0 {
            return Err(RecError::Config("num_neighbours must be at least 1".into()));
        }
        if self.cutoff == 0 {
            return Err(RecError::Config("cutoff must be at least 1".into()));
        }
        if self.seeding == SeedingMode::ClassifierSeeded && self.classifier_topics == 0 {
            return Err(RecError::Config(
                "classifier-seeded runs need at least one classifier topic".into(),
            ));
        }
        Ok(())
    }

    // -------------------- Overrides --------------------

    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        info!("Setting source directory: {}", self.source_dir.display());
        self
    }

    pub fn with_folds(mut self, num_folds: usize) -> Self {
        info!("Setting number of folds: {}", num_folds);
        self.num_folds = num_folds;
        self
    }

    pub fn with_neighbours(mut self, k: usize) -> Self {
        info!("Setting neighbourhood size: {}", k);
        self.num_neighbours = k;
        self
    }

    pub fn with_cutoff(mut self, cutoff: usize) -> Self {
        info!("Setting evaluation cutoff: {}", cutoff);
        self.cutoff = cutoff;
        self
    }

    pub fn with_strategy(mut self, strategy: PredictionStrategy) -> Self {
        info!("Setting prediction strategy: {:?}", strategy);
        self.strategy = strategy;
        self
    }

    pub fn with_seeding(mut self, seeding: SeedingMode) -> Self {
        info!("Setting seeding mode: {:?}", seeding);
        self.seeding = seeding;
        self
    }

    pub fn with_classifier_topics(mut self, n: usize) -> Self {
        info!("Setting classifier topics: {}", n);
        self.classifier_topics = n;
        self
    }

    pub fn with_include_users(mut self, include: bool) -> Self {
        info!("Setting include users: {}", include);
        self.include_users = include;
        self
    }

    pub fn with_long_tail_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Setting long tail file: {}", path.display());
        self.long_tail_file = Some(path);
        self
    }

    pub fn with_rating_ground_truth(mut self, enabled: bool) -> Self {
        info!("Setting rating ground truth: {}", enabled);
        self.rating_ground_truth = enabled;
        self
    }

    pub fn with_popularity_depth(mut self, depth: usize) -> Self {
        info!("Setting popularity depth: {}", depth);
        self.popularity_depth = depth;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        info!("Setting resume from persisted similarities: {}", resume);
        self.resume = resume;
        self
    }

    // -------------------- Layout --------------------

    pub fn seeding_strategy(&self) -> SeedingStrategy {
        match self.seeding {
            SeedingMode::HalfSplit => SeedingStrategy::HalfSplit { include_users: self.include_users },
            SeedingMode::ClassifierSeeded => {
                SeedingStrategy::ClassifierSeeded { topics: self.classifier_topics }
            }
        }
    }

    pub fn projects_path(&self) -> PathBuf {
        self.source_dir.join(&self.projects_file)
    }

    pub fn classifier_path(&self) -> PathBuf {
        self.source_dir.join(&self.classifier_output)
    }

    pub fn results_path(&self) -> PathBuf {
        self.source_dir.join(&self.results_dir)
    }

    /// Output directory of fold `round` (1-based).
    pub fn round_path(&self, round: usize) -> PathBuf {
        self.source_dir.join(format!("Round{}", round))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EvaluationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_folds, 10);
        assert_eq!(config.num_neighbours, 20);
        assert_eq!(config.projects_path(), PathBuf::from("./projects.txt"));
        assert_eq!(config.round_path(3), PathBuf::from("./Round3"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EvaluationConfig::from_toml_str(
            r#"
            source_dir = "/data/eval"
            num_neighbours = 5
            strategy = "hybrid"
            seeding = "classifier-seeded"
            "#,
        )
        .unwrap();
        assert_eq!(config.num_neighbours, 5);
        assert_eq!(config.strategy, PredictionStrategy::Hybrid);
        assert_eq!(config.seeding, SeedingMode::ClassifierSeeded);
        assert_eq!(config.cutoff, 20);
        assert_eq!(
            config.seeding_strategy(),
            SeedingStrategy::ClassifierSeeded { topics: 5 }
        );
    }

    #[test]
    fn test_zero_folds_rejected() {
        let err = EvaluationConfig::from_toml_str("num_folds = 0").unwrap_err();
        assert!(matches!(err, RecError::Config(_)));
    }
}
