//! IDF-weighted cosine similarity between held-out projects and the training set.
//!
//! The training graphs of a fold are combined once into [`TrainingSet`]. For every
//! test project the engine merges the project's visible graph into a copy of that
//! graph, derives IDF weights from the merged in-degrees, and scores each training
//! project by the cosine of the two projects' weighted dependency vectors.
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classifier::TopicClassifier;
use crate::error::{RecError, Result};
use crate::graph::DependencyGraph;
use crate::runner::CancellationToken;
use crate::sparse::{SparseMatrix, SparseVector};
use crate::store::{self, GroundTruthSplit, IDENTITY_ORDINAL, Project, ProjectStore};

use log::{debug, info, trace, warn};

/// How the visible part of a test project is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedingStrategy {
    HalfSplit { include_users: bool },
    ClassifierSeeded { topics: usize },
}

/// Training side of a fold: projects, their dependency sets and the combined graph.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub projects: Vec<Project>,
    pub libraries: Vec<BTreeSet<String>>,
    pub graph: DependencyGraph,
}

impl TrainingSet {
    /// Reads every training project and combines their graphs in list order.
    pub fn load(store: &ProjectStore, projects: Vec<Project>) -> Self {
        info!("Loading training set of {} projects", projects.len());
        let loaded: Vec<(BTreeSet<String>, (DependencyGraph, store::ProjectDictionary))> = projects
            .par_iter()
            .map(|p| {
                let dict = store.read_dictionary(p);
                let graph = store.load_graph(p, Some(&dict));
                (dict.dependency_tags(), (graph, dict))
            })
            .collect();

        let (libraries, parts): (Vec<_>, Vec<_>) = loaded.into_iter().unzip();
        let graph = DependencyGraph::combine_all(&parts);
        debug!("Training vocabulary: {} dependencies", Self::vocabulary_of(&libraries).len());
        Self { projects, libraries, graph }
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Union of all training dependency tags.
    pub fn vocabulary(&self) -> BTreeSet<String> {
        Self::vocabulary_of(&self.libraries)
    }

    fn vocabulary_of(libraries: &[BTreeSet<String>]) -> BTreeSet<String> {
        libraries.iter().flatten().cloned().collect()
    }
}

/// Similarity stage result for one test project.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityOutcome {
    pub project: Project,
    pub split: GroundTruthSplit,
    /// `(training index, score)`, most similar first.
    pub ranked: Vec<(usize, f64)>,
}

impl SimilarityOutcome {
    pub fn visible_dependencies(&self) -> BTreeSet<String> {
        self.split.visible_dependencies()
    }
}

/// Cosine of the IDF-weighted membership vectors of two tag sets over their union.
///
/// Artifacts without a weight (document frequency 0) contribute nothing.
pub fn weighted_cosine(
    left: &BTreeSet<String>,
    right: &BTreeSet<String>,
    weights: &HashMap<String, f64>,
) -> f64 {
    let union: Vec<&String> = left.union(right).collect();
    let mut v1 = SparseVector::new(union.len());
    let mut v2 = SparseVector::new(union.len());
    for (i, tag) in union.iter().enumerate() {
        let Some(&w) = weights.get(tag.as_str()) else {
            trace!("No document frequency for {}, left unweighted", tag);
            continue;
        };
        if left.contains(*tag) {
            v1.put(i, w);
        }
        if right.contains(*tag) {
            v2.put(i, w);
        }
    }
    v1.cosine_similarity(&v2)
}

pub struct SimilarityEngine<'a> {
    store: &'a ProjectStore,
    training: &'a TrainingSet,
    seeding: SeedingStrategy,
    classifier: Option<&'a dyn TopicClassifier>,
    resume: bool,
}

impl<'a> SimilarityEngine<'a> {
    pub fn new(store: &'a ProjectStore, training: &'a TrainingSet, seeding: SeedingStrategy) -> Self {
        info!("Initializing SimilarityEngine with {:?} over {} training projects", seeding, training.len());
        Self { store, training, seeding, classifier: None, resume: false }
    }

    /// Reuse a test project's persisted similarity file when it covers the training set.
    pub fn with_resume(mut self, resume: bool) -> Self {
        info!("Setting SimilarityEngine resume: {}", resume);
        self.resume = resume;
        self
    }

    pub fn with_classifier(mut self, classifier: &'a dyn TopicClassifier) -> Self {
        info!("Attaching topic classifier to SimilarityEngine");
        self.classifier = Some(classifier);
        self
    }

    /// Visible / held-out split of a test project under the seeding strategy.
    pub fn split(&self, project: &Project) -> GroundTruthSplit {
        match self.seeding {
            SeedingStrategy::HalfSplit { include_users } => {
                let dict = self.store.read_full_dictionary(project);
                GroundTruthSplit::split_half(&dict, include_users)
            }
            SeedingStrategy::ClassifierSeeded { topics } => {
                let dict = self.store.read_dictionary(project);
                let ranked = match self.classifier {
                    Some(c) => c.rank_topics(&self.store.classifier_key(&project.uri)),
                    None => {
                        warn!("Classifier-seeded split without a classifier for {}", project.uri);
                        Vec::new()
                    }
                };
                GroundTruthSplit::split_top_n(&project.uri, &dict, &ranked, topics)
            }
        }
    }

    /// The test project's graph restricted to its visible entries.
    ///
    /// Seeded topics have no edges on disk, so they hang off the identity node.
    pub fn test_graph(&self, project: &Project, split: &GroundTruthSplit) -> DependencyGraph {
        match self.seeding {
            SeedingStrategy::HalfSplit { .. } => self.store.load_graph(project, Some(&split.visible)),
            SeedingStrategy::ClassifierSeeded { .. } => DependencyGraph::star(
                IDENTITY_ORDINAL,
                split.visible.iter().map(|(o, _)| o).filter(|&o| o != IDENTITY_ORDINAL),
            ),
        }
    }

    /// Scores every training project against the visible part of `project`.
    pub fn score(&self, project: &Project, split: &GroundTruthSplit) -> Vec<(usize, f64)> {
        let mut merged = self.training.graph.clone();
        merged.combine(&self.test_graph(project, split), &split.visible);
        let weights = merged.idf_weights();
        let visible = split.visible_dependencies();

        let mut ranked: Vec<(usize, f64)> = self
            .training
            .libraries
            .iter()
            .enumerate()
            .map(|(i, libs)| (i, weighted_cosine(&visible, libs, &weights)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked
    }

    /// Ranking read back from `Similarities/<project>`.
    ///
    /// `None` when the file is absent or does not name every training project once.
    pub fn load_ranking(&self, project: &Project, round_dir: &Path) -> Option<Vec<(usize, f64)>> {
        let path = round_dir.join("Similarities").join(self.store.stem(&project.uri));
        if !path.is_file() {
            return None;
        }
        let index: HashMap<&str, usize> =
            self.training.projects.iter().enumerate().map(|(i, p)| (p.uri.as_str(), i)).collect();
        let ranked: Vec<(usize, f64)> = store::read_similarities(&path, usize::MAX)
            .into_iter()
            .filter_map(|(uri, score)| index.get(uri.as_str()).map(|&i| (i, score)))
            .collect();

        let distinct: BTreeSet<usize> = ranked.iter().map(|r| r.0).collect();
        if ranked.len() != self.training.len() || distinct.len() != ranked.len() {
            warn!("{} does not match the training set, rescoring", path.display());
            return None;
        }
        Some(ranked)
    }

    /// Splits, scores and persists one test project.
    pub fn process(&self, project: &Project, round_dir: &Path) -> Result<SimilarityOutcome> {
        let split = self.split(project);
        let stem = self.store.stem(&project.uri);
        store::write_ground_truth(&round_dir.join("GroundTruth").join(&stem), &split.held_out)?;

        let persisted = if self.resume { self.load_ranking(project, round_dir) } else { None };
        let ranked = match persisted {
            Some(ranked) => {
                debug!("{}: reusing persisted similarities", project.uri);
                ranked
            }
            None => {
                let ranked = self.score(project, &split);
                let rows: Vec<(String, f64)> =
                    ranked.iter().map(|&(i, s)| (self.training.projects[i].uri.clone(), s)).collect();
                store::write_similarities(&round_dir.join("Similarities").join(&stem), &project.uri, &rows)?;
                ranked
            }
        };

        debug!(
            "{}: {} visible, {} held out, best score {:.4}",
            project.uri,
            split.visible.len(),
            split.held_out.len(),
            ranked.first().map_or(0.0, |r| r.1)
        );
        Ok(SimilarityOutcome { project: project.clone(), split, ranked })
    }

    /// One task per test project; a cancelled token skips the remaining ones.
    pub fn run(
        &self,
        testing: &[Project],
        round_dir: &Path,
        cancel: &CancellationToken,
    ) -> Vec<Result<SimilarityOutcome>> {
        info!("Computing similarities for {} test projects", testing.len());
        testing
            .par_iter()
            .map(|p| {
                if cancel.is_cancelled() {
                    return Err(RecError::Cancelled);
                }
                self.process(p, round_dir)
            })
            .collect()
    }
}

/// Similarity matrix of a fold: one row per test project, one column per training project.
pub fn similarity_matrix(outcomes: &[SimilarityOutcome], n_training: usize) -> SparseMatrix {
    let mut m = SparseMatrix::new(outcomes.len(), n_training);
    for (row, outcome) in outcomes.iter().enumerate() {
        for &(col, score) in &outcome.ranked {
            m.put(row, col, score);
        }
    }
    m
}
