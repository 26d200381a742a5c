//! On-disk project data: the ordered project list, per-project dictionaries and
//! graphs, ground-truth splits, and the tab separated score files every stage
//! reads and writes.
//!
//! Readers never fail: a missing or unreadable file is logged at error level and
//! read as empty, and a malformed line is logged and skipped. Writers truncate
//! their target, so re-running a stage overwrites its previous output.
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::classifier::ScoredTopic;
use crate::config::EvaluationConfig;
use crate::error::{ParseError, RecError, Result};
use crate::graph::DependencyGraph;

use log::{debug, error, info, trace, warn};

/// Reserved prefix of dependency artifacts in a project dictionary.
pub const DEP_PREFIX: &str = "#DEP#";

/// Dictionary ordinal reserved for the project's own identity.
pub const IDENTITY_ORDINAL: usize = 1;

#[inline]
pub fn is_dependency(tag: &str) -> bool {
    tag.contains(DEP_PREFIX)
}

/// A project of the ordered list. `ordinal` is its 1-based position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Project {
    pub ordinal: usize,
    pub uri: String,
}

impl Project {
    pub fn new(ordinal: usize, uri: impl Into<String>) -> Self {
        Self { ordinal, uri: uri.into() }
    }
}

/// Ordinal -> artifact tag mapping that keeps file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDictionary {
    entries: Vec<(usize, String)>,
    index: HashMap<usize, usize>,
}

impl ProjectDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces; a replaced entry keeps its original position.
    pub fn insert(&mut self, ordinal: usize, tag: impl Into<String>) {
        let tag = tag.into();
        match self.index.get(&ordinal) {
            Some(&pos) => self.entries[pos].1 = tag,
            None => {
                self.index.insert(ordinal, self.entries.len());
                self.entries.push((ordinal, tag));
            }
        }
    }

    #[inline]
    pub fn get(&self, ordinal: usize) -> Option<&str> {
        self.index.get(&ordinal).map(|&pos| self.entries[pos].1.as_str())
    }

    #[inline]
    pub fn contains(&self, ordinal: usize) -> bool {
        self.index.contains_key(&ordinal)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.entries.iter().map(|(o, t)| (*o, t.as_str()))
    }

    /// Dependency entries in insertion order.
    pub fn dependencies(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.iter().filter(|(_, t)| is_dependency(t))
    }

    pub fn dependency_tags(&self) -> BTreeSet<String> {
        self.dependencies().map(|(_, t)| t.to_string()).collect()
    }

    pub fn identity(&self) -> Option<&str> {
        self.get(IDENTITY_ORDINAL)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses one `ordinal \t tag` line.
    pub fn parse_line(line: &str, file: &Path, line_no: usize) -> std::result::Result<(usize, String), ParseError> {
        let mut cols = line.split('\t');
        let ordinal = cols
            .next()
            .ok_or_else(|| ParseError::new(file, line_no, "missing ordinal"))?
            .trim()
            .parse::<usize>()
            .map_err(|e| ParseError::new(file, line_no, format!("bad ordinal: {}", e)))?;
        let tag = cols
            .next()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ParseError::new(file, line_no, "missing artifact tag"))?;
        Ok((ordinal, tag.to_string()))
    }

    /// Reads a `dicth_<project>` file, keeping the entries accepted by `keep`.
    pub fn load_filtered(path: &Path, keep: impl Fn(usize, &str) -> bool) -> Self {
        let mut dict = ProjectDictionary::new();
        let Some(content) = read_file(path) else {
            return dict;
        };
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Self::parse_line(line, path, n + 1) {
                Ok((ordinal, tag)) if keep(ordinal, &tag) => dict.insert(ordinal, tag),
                Ok(_) => {}
                Err(e) => warn!("Skipping dictionary line: {}", e),
            }
        }
        dict
    }
}

impl<S: Into<String>> FromIterator<(usize, S)> for ProjectDictionary {
    fn from_iter<I: IntoIterator<Item = (usize, S)>>(iter: I) -> Self {
        let mut dict = ProjectDictionary::new();
        for (o, t) in iter {
            dict.insert(o, t);
        }
        dict
    }
}

/// Visible and held-out halves of a test project's dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundTruthSplit {
    pub visible: ProjectDictionary,
    pub held_out: ProjectDictionary,
}

impl GroundTruthSplit {
    /// Positional half split.
    ///
    /// Among dependency entries in insertion order the first `floor(n/2)` are held out
    /// and the rest are visible. The identity entry is always visible; other
    /// non-dependency entries are visible only with `include_users`.
    pub fn split_half(dict: &ProjectDictionary, include_users: bool) -> Self {
        let total = dict.dependencies().count();
        let half = total / 2;
        let mut split = GroundTruthSplit::default();
        let mut seen = 0usize;

        for (ordinal, tag) in dict.iter() {
            if is_dependency(tag) {
                if seen < half {
                    split.held_out.insert(ordinal, tag);
                } else {
                    split.visible.insert(ordinal, tag);
                }
                seen += 1;
            } else if ordinal == IDENTITY_ORDINAL || include_users {
                split.visible.insert(ordinal, tag);
            }
        }
        trace!("split_half: {} dependencies, {} held out", total, half);
        split
    }

    /// Classifier-seeded split.
    ///
    /// The `n` highest-confidence topics become the visible set, numbered from 2 after
    /// the identity entry; every dependency of `dict` is held out.
    pub fn split_top_n(uri: &str, dict: &ProjectDictionary, topics: &[ScoredTopic], n: usize) -> Self {
        let mut split = GroundTruthSplit::default();
        split.visible.insert(IDENTITY_ORDINAL, uri);
        for (i, topic) in ranked_topics(topics).into_iter().take(n).enumerate() {
            split.visible.insert(IDENTITY_ORDINAL + 1 + i, topic.dependency_tag());
        }
        for (ordinal, tag) in dict.dependencies() {
            split.held_out.insert(ordinal, tag);
        }
        split
    }

    pub fn visible_dependencies(&self) -> BTreeSet<String> {
        self.visible.dependency_tags()
    }
}

/// Topics sorted by confidence, highest first; equal confidences keep their order.
pub fn ranked_topics(topics: &[ScoredTopic]) -> Vec<&ScoredTopic> {
    let mut ranked: Vec<&ScoredTopic> = topics.iter().collect();
    ranked.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

/// The project list, loaded once and sliced by position.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    source_dir: PathBuf,
    uri_prefix: String,
    projects: Vec<Project>,
}

impl ProjectStore {
    /// Loads the project list named by `config`. An unreadable list gives an empty store.
    pub fn open(config: &EvaluationConfig) -> Self {
        let path = config.projects_path();
        let projects = read_project_list(&path);
        info!("Loaded {} projects from {}", projects.len(), path.display());
        Self::from_projects(&config.source_dir, &config.uri_prefix, projects)
    }

    pub fn from_projects(
        source_dir: impl Into<PathBuf>,
        uri_prefix: impl Into<String>,
        projects: Vec<Project>,
    ) -> Self {
        Self { source_dir: source_dir.into(), uri_prefix: uri_prefix.into(), projects }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Highest ordinal of the list: the number of positions folds are cut from.
    #[inline]
    pub fn positions(&self) -> usize {
        self.projects.last().map_or(0, |p| p.ordinal)
    }

    /// Projects whose ordinal lies in `start..=end` (1-indexed, clipped to the list).
    pub fn read_project_range(&self, start: usize, end: usize) -> Vec<Project> {
        if start == 0 || start > end {
            return Vec::new();
        }
        let from = self.projects.partition_point(|p| p.ordinal < start);
        let to = self.projects.partition_point(|p| p.ordinal <= end);
        self.projects[from..to.max(from)].to_vec()
    }

    /// File stem of a project: the URI without its prefix, `/` replaced by `__`.
    pub fn stem(&self, uri: &str) -> String {
        uri.strip_prefix(self.uri_prefix.as_str()).unwrap_or(uri).replace('/', "__")
    }

    /// `owner/repo` key used by the classifier output.
    pub fn classifier_key(&self, uri: &str) -> String {
        uri.strip_prefix(self.uri_prefix.as_str()).unwrap_or(uri).to_string()
    }

    /// Project addressed by a classifier key; it carries no list position.
    pub fn project_for_key(&self, key: &str) -> Project {
        Project::new(0, format!("{}{}", self.uri_prefix, key))
    }

    pub fn dictionary_path(&self, project: &Project) -> PathBuf {
        self.source_dir.join(format!("dicth_{}", self.stem(&project.uri)))
    }

    pub fn graph_path(&self, project: &Project) -> PathBuf {
        self.source_dir.join(format!("graph_{}", self.stem(&project.uri)))
    }

    /// Identity entry plus dependency entries.
    pub fn read_dictionary(&self, project: &Project) -> ProjectDictionary {
        ProjectDictionary::load_filtered(&self.dictionary_path(project), |o, t| {
            o == IDENTITY_ORDINAL || is_dependency(t)
        })
    }

    /// Every entry, in file order.
    pub fn read_full_dictionary(&self, project: &Project) -> ProjectDictionary {
        ProjectDictionary::load_filtered(&self.dictionary_path(project), |_, _| true)
    }

    /// Dependency tags of a project.
    pub fn libraries(&self, project: &Project) -> BTreeSet<String> {
        ProjectDictionary::load_filtered(&self.dictionary_path(project), |_, t| is_dependency(t)).dependency_tags()
    }

    pub fn load_graph(&self, project: &Project, filter: Option<&ProjectDictionary>) -> DependencyGraph {
        DependencyGraph::load(self.graph_path(project), filter)
    }
}

// -------------------- Line readers --------------------

fn read_file(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            error!("Cannot read {}: {}", path.display(), e);
            None
        }
    }
}

/// Applies `parse` to every non-blank line, skipping lines that fail.
fn parse_lines<T>(path: &Path, mut parse: impl FnMut(&str, usize) -> std::result::Result<T, ParseError>) -> Vec<T> {
    let Some(content) = read_file(path) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (n, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse(line, n + 1) {
            Ok(v) => out.push(v),
            Err(e) => warn!("Skipping line: {}", e),
        }
    }
    out
}

fn column<'a>(cols: &[&'a str], i: usize, path: &Path, line_no: usize) -> std::result::Result<&'a str, ParseError> {
    cols.get(i)
        .map(|c| c.trim())
        .ok_or_else(|| ParseError::new(path, line_no, format!("expected at least {} columns", i + 1)))
}

fn number(raw: &str, path: &Path, line_no: usize) -> std::result::Result<f64, ParseError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| ParseError::new(path, line_no, format!("bad number '{}': {}", raw, e)))
}

/// First comma separated field of every non-blank line of `projects.txt`.
///
/// The ordinal is the line number, so blank lines leave gaps in the numbering.
pub fn read_project_list(path: &Path) -> Vec<Project> {
    let Some(content) = read_file(path) else {
        return Vec::new();
    };
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let uri = line.split(',').next().map(str::trim).filter(|uri| !uri.is_empty())?;
            Some(Project::new(i + 1, uri))
        })
        .collect()
}

/// `(trainingURI, score)` rows of a similarity file, at most `limit` of them.
pub fn read_similarities(path: &Path, limit: usize) -> Vec<(String, f64)> {
    let mut rows = parse_lines(path, |line, n| {
        let cols: Vec<&str> = line.split('\t').collect();
        let training = column(&cols, 1, path, n)?.to_string();
        let score = number(column(&cols, 2, path, n)?, path, n)?;
        Ok((training, score))
    });
    rows.truncate(limit);
    rows
}

/// `(item, score)` rows of a recommendation file, in file order.
pub fn read_recommendation_scores(path: &Path) -> Vec<(String, f64)> {
    parse_lines(path, |line, n| {
        let cols: Vec<&str> = line.split('\t').collect();
        let item = column(&cols, 0, path, n)?.to_string();
        let score = number(column(&cols, 1, path, n)?, path, n)?;
        Ok((item, score))
    })
}

/// The first `limit` recommended items.
pub fn read_recommendations(path: &Path, limit: usize) -> Vec<String> {
    read_recommendation_scores(path).into_iter().take(limit).map(|(item, _)| item).collect()
}

/// Every recommended item whose score is non-zero.
pub fn read_nonzero_recommendations(path: &Path) -> Vec<String> {
    read_recommendation_scores(path)
        .into_iter()
        .filter(|(_, score)| *score != 0.0)
        .map(|(item, _)| item)
        .collect()
}

/// Artifacts of a ground-truth file.
pub fn read_ground_truth(path: &Path) -> BTreeSet<String> {
    parse_lines(path, |line, n| {
        let cols: Vec<&str> = line.split('\t').collect();
        Ok(column(&cols, 1, path, n)?.to_string())
    })
    .into_iter()
    .collect()
}

/// `ordinal \t item%rating` lines of a rated ground truth.
pub fn read_ground_truth_scores(path: &Path) -> HashMap<String, f64> {
    parse_lines(path, |line, n| {
        let cols: Vec<&str> = line.split('\t').collect();
        let raw = column(&cols, 1, path, n)?;
        let (item, rating) = raw
            .rsplit_once('%')
            .ok_or_else(|| ParseError::new(path, n, format!("expected item%rating, got '{}'", raw)))?;
        Ok((item.trim().to_string(), number(rating, path, n)?))
    })
    .into_iter()
    .collect()
}

/// First column of the long-tail item list.
pub fn read_long_tail(path: &Path) -> HashSet<String> {
    parse_lines(path, |line, n| {
        let cols: Vec<&str> = line.split('\t').collect();
        Ok(column(&cols, 0, path, n)?.to_string())
    })
    .into_iter()
    .collect()
}

/// Tab separated numeric rows, one per cutoff.
pub fn read_metric_rows(path: &Path) -> Vec<Vec<f64>> {
    parse_lines(path, |line, n| line.split('\t').map(|raw| number(raw, path, n)).collect())
}

// -------------------- Writers --------------------

/// Writes `lines` to `path`, replacing any previous content.
pub fn write_lines<I, S>(path: &Path, lines: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RecError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| RecError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut count = 0usize;
    for line in lines {
        writeln!(writer, "{}", line.as_ref()).map_err(|e| RecError::io(path, e))?;
        count += 1;
    }
    writer.flush().map_err(|e| RecError::io(path, e))?;
    trace!("Wrote {} lines to {}", count, path.display());
    Ok(())
}

pub fn write_ground_truth(path: &Path, held_out: &ProjectDictionary) -> Result<()> {
    debug!("Writing {} ground truth entries to {}", held_out.len(), path.display());
    write_lines(path, held_out.iter().map(|(o, t)| format!("{}\t{}", o, t)))
}

pub fn write_similarities(path: &Path, testing_uri: &str, ranked: &[(String, f64)]) -> Result<()> {
    write_lines(path, ranked.iter().map(|(training, score)| format!("{}\t{}\t{}", testing_uri, training, score)))
}

pub fn write_recommendations(path: &Path, ranked: &[(String, f64)]) -> Result<()> {
    write_lines(path, ranked.iter().map(|(item, score)| format!("{}\t{}", item, score)))
}
