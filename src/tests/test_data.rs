use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::config::EvaluationConfig;
use crate::store::{DEP_PREFIX, Project, ProjectStore};

pub const PREFIX: &str = "git://github.com/";

/// A dataset written to a temporary directory, removed on drop.
pub struct Dataset {
    pub dir: TempDir,
    pub config: EvaluationConfig,
}

impl Dataset {
    pub fn store(&self) -> ProjectStore {
        ProjectStore::open(&self.config)
    }

    pub fn project(&self, ordinal: usize) -> Project {
        self.store().projects()[ordinal - 1].clone()
    }
}

pub fn dep(name: &str) -> String {
    format!("{} {}", DEP_PREFIX, name)
}

pub fn deps(names: &[&str]) -> std::collections::BTreeSet<String> {
    names.iter().map(|n| dep(n)).collect()
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Writes `dicth_<stem>` (identity at 1, dependencies from 2 in the given order)
/// and `graph_<stem>` with an edge from the identity to every dependency.
pub fn write_project(dir: &Path, key: &str, dependencies: &[&str]) {
    let stem = key.replace('/', "__");
    let mut dict = vec![format!("1\t{}{}", PREFIX, key)];
    let mut edges = Vec::new();
    for (i, d) in dependencies.iter().enumerate() {
        dict.push(format!("{}\t{}", i + 2, dep(d)));
        edges.push(format!("1#{}", i + 2));
    }
    fs::write(dir.join(format!("dicth_{}", stem)), dict.join("\n") + "\n").unwrap();
    fs::write(dir.join(format!("graph_{}", stem)), edges.join(",") + "\n").unwrap();
}

/// Writes `projects.txt` plus every project's files.
pub fn write_dataset(dir: &Path, projects: &[(&str, &[&str])]) {
    let list: Vec<String> = projects.iter().map(|(key, _)| format!("{}{},stars", PREFIX, key)).collect();
    fs::write(dir.join("projects.txt"), list.join("\n") + "\n").unwrap();
    for (key, dependencies) in projects {
        write_project(dir, key, dependencies);
    }
}

/// Four projects: `a/t` reveals X and hides Y; the others are its neighbours.
pub fn small_dataset() -> Dataset {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(
        dir.path(),
        &[("a/t", &["Y", "X"]), ("a/p1", &["X", "Y"]), ("a/p2", &["Y", "Z"]), ("a/p3", &["X", "Z"])],
    );
    let config = EvaluationConfig::default()
        .with_source_dir(dir.path())
        .with_folds(4)
        .with_neighbours(3)
        .with_cutoff(3);
    Dataset { dir, config }
}
