use crate::classifier::{RankedTopicFile, TopicClassifier};
use crate::config::{EvaluationConfig, SeedingMode};
use crate::error::Result;
use crate::recommend::PredictionStrategy;
use crate::runner::CrossValidationRunner;
use crate::store::ProjectStore;

// Add logging
use log::{debug, info};

pub struct EvaluationBuilder {
    config: EvaluationConfig,
    // Overrides, resolved from the config at build time when absent
    store: Option<ProjectStore>,
    classifier: Option<Box<dyn TopicClassifier>>,
}

impl Default for EvaluationBuilder {
    fn default() -> Self {
        debug!("Creating EvaluationBuilder with default parameters");
        Self { config: EvaluationConfig::default(), store: None, classifier: None }
    }
}

impl EvaluationBuilder {
    pub fn new(config: EvaluationConfig) -> Self {
        info!("Initializing new EvaluationBuilder for {}", config.source_dir.display());
        Self { config, ..Default::default() }
    }

    pub fn with_strategy(mut self, strategy: PredictionStrategy) -> Self {
        self.config = self.config.with_strategy(strategy);
        self
    }

    pub fn with_neighbours(mut self, k: usize) -> Self {
        self.config = self.config.with_neighbours(k);
        self
    }

    /// Use an already loaded project list instead of reading `projects.txt`.
    pub fn with_store(mut self, store: ProjectStore) -> Self {
        info!("Using provided project store with {} projects", store.len());
        self.store = Some(store);
        self
    }

    /// Use this classifier instead of the classifier output file.
    pub fn with_classifier(mut self, classifier: Box<dyn TopicClassifier>) -> Self {
        info!("Using provided topic classifier");
        self.classifier = Some(classifier);
        self
    }

    /// Validates the configuration and loads what is still missing.
    ///
    /// Classifier-seeded runs without an explicit classifier read it from
    /// `classifier_output` under the source directory.
    pub fn build(self) -> Result<CrossValidationRunner> {
        self.config.validate()?;
        let store = match self.store {
            Some(s) => s,
            None => ProjectStore::open(&self.config),
        };
        let classifier = match (self.classifier, self.config.seeding) {
            (Some(c), _) => Some(c),
            (None, SeedingMode::ClassifierSeeded) => {
                let file = RankedTopicFile::load(self.config.classifier_path());
                Some(Box::new(file) as Box<dyn TopicClassifier>)
            }
            (None, SeedingMode::HalfSplit) => None,
        };
        debug!("Building runner, classifier attached: {}", classifier.is_some());
        Ok(CrossValidationRunner::new(self.config, store, classifier))
    }
}
