//! Topic classifier collaborator.
//!
//! The classifier itself lives outside this crate; recommendations only need its
//! ranked topics per project. [`RankedTopicFile`] reads them from the classifier's
//! output, one `owner/repo.txt;topic;topic;...` line per project with topics in
//! rank order.
use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, error, info};

use crate::store::DEP_PREFIX;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTopic {
    pub label: String,
    pub confidence: f64,
}

impl ScoredTopic {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self { label: label.into(), confidence }
    }

    /// The topic as a dependency artifact tag.
    pub fn dependency_tag(&self) -> String {
        if self.label.starts_with(DEP_PREFIX) {
            self.label.clone()
        } else {
            format!("{} {}", DEP_PREFIX, self.label)
        }
    }
}

/// Ranked topic source, keyed by `owner/repo`.
pub trait TopicClassifier: Send + Sync {
    /// Topics for a project, any order; callers rank by confidence.
    fn rank_topics(&self, project_key: &str) -> Vec<ScoredTopic>;

    /// Every project the classifier has an answer for.
    fn project_keys(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
pub struct RankedTopicFile {
    rankings: BTreeMap<String, Vec<ScoredTopic>>,
}

impl RankedTopicFile {
    /// Reads the classifier output. A missing file gives an empty classifier.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                error!("Cannot read classifier output {}: {}", path.display(), e);
                return Self::default();
            }
        };
        let file = Self::from_rankings(content.lines().filter_map(|line| {
            let mut fields = line.split(';');
            let key = fields.next()?.trim().trim_end_matches(".txt").to_string();
            if key.is_empty() {
                return None;
            }
            let topics: Vec<String> =
                fields.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect();
            Some((key, topics))
        }));
        info!("Loaded classifier topics for {} projects from {}", file.rankings.len(), path.display());
        file
    }

    /// Builds from rank-ordered topic lists; confidence decays with rank as `1 / (rank + 1)`.
    pub fn from_rankings<I>(rankings: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let mut out = BTreeMap::new();
        for (key, topics) in rankings {
            let scored = topics
                .into_iter()
                .enumerate()
                .map(|(rank, label)| ScoredTopic::new(label, 1.0 / (rank as f64 + 1.0)))
                .collect::<Vec<_>>();
            debug!("{}: {} topics", key, scored.len());
            out.insert(key, scored);
        }
        Self { rankings: out }
    }

    pub fn len(&self) -> usize {
        self.rankings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rankings.is_empty()
    }
}

impl TopicClassifier for RankedTopicFile {
    fn rank_topics(&self, project_key: &str) -> Vec<ScoredTopic> {
        self.rankings.get(project_key).cloned().unwrap_or_default()
    }

    fn project_keys(&self) -> Vec<String> {
        self.rankings.keys().cloned().collect()
    }
}
