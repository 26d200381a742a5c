use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rayon::prelude::*;

use crate::error::ParseError;
use crate::sparse::{SparseMatrix, SparseVector};
use crate::store::ProjectDictionary;

// Add logging
use log::{debug, error, info, trace, warn};

/// Bidirectional artifact dictionary: a growable label array plus a label -> id lookup.
///
/// Ids are dense and assigned in first-seen order, starting from 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactArena {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl ArtifactArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `label`, minting the next free id on first sight.
    pub fn intern(&mut self, label: &str) -> usize {
        if let Some(&id) = self.index.get(label) {
            return id;
        }
        let id = self.labels.len();
        self.labels.push(label.to_string());
        self.index.insert(label.to_string(), id);
        trace!("Interned artifact {} as {}", label, id);
        id
    }

    /// Single-threaded pre-pass: interns every label in iteration order.
    pub fn intern_all<'a, I>(&mut self, labels: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for label in labels {
            self.intern(label);
        }
    }

    #[inline]
    pub fn id(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    #[inline]
    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Directed dependency graph.
///
/// A graph loaded from a `graph_<project>` file is keyed by the project's local
/// dictionary ordinals and has an empty arena. A combined graph is keyed by ids of
/// its own [`ArtifactArena`], so its edges can be read back as labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    out_links: BTreeMap<usize, BTreeSet<usize>>,
    arena: ArtifactArena,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one line of comma separated `src#dst` pairs.
    pub fn parse_line(
        line: &str,
        file: &Path,
        line_no: usize,
    ) -> Vec<Result<(usize, usize), ParseError>> {
        line.split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let mut parts = pair.split('#');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(src), Some(dst), None) => {
                        let src = src.trim().parse::<usize>().map_err(|e| {
                            ParseError::new(file, line_no, format!("bad source in '{}': {}", pair, e))
                        })?;
                        let dst = dst.trim().parse::<usize>().map_err(|e| {
                            ParseError::new(file, line_no, format!("bad target in '{}': {}", pair, e))
                        })?;
                        Ok((src, dst))
                    }
                    _ => Err(ParseError::new(file, line_no, format!("expected src#dst, got '{}'", pair))),
                }
            })
            .collect()
    }

    /// Loads a `graph_<project>` edge file.
    ///
    /// With a `filter`, an edge is kept only when both endpoints are ordinals of the
    /// dictionary. A missing file yields an empty graph; malformed pairs are skipped.
    pub fn load(path: impl AsRef<Path>, filter: Option<&ProjectDictionary>) -> Self {
        let path = path.as_ref();
        let mut graph = DependencyGraph::new();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                error!("Cannot read graph file {}: {}", path.display(), e);
                return graph;
            }
        };

        let mut skipped = 0usize;
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    error!("Read error in {} at line {}: {}", path.display(), n + 1, e);
                    break;
                }
            };
            for parsed in Self::parse_line(&line, path, n + 1) {
                match parsed {
                    Ok((src, dst)) => {
                        let keep = filter.is_none_or(|dict| dict.contains(src) && dict.contains(dst));
                        if keep {
                            graph.add_edge(src, dst);
                        } else {
                            skipped += 1;
                        }
                    }
                    Err(e) => warn!("Skipping malformed edge: {}", e),
                }
            }
        }

        debug!(
            "Loaded graph {}: {} nodes, {} edges ({} filtered out)",
            path.display(),
            graph.num_nodes(),
            graph.num_edges(),
            skipped
        );
        graph
    }

    /// Graph with one edge from `root` to each of `targets`.
    pub fn star(root: usize, targets: impl IntoIterator<Item = usize>) -> Self {
        let mut graph = DependencyGraph::new();
        for t in targets {
            graph.add_edge(root, t);
        }
        graph
    }

    #[inline]
    pub fn add_edge(&mut self, src: usize, dst: usize) {
        self.out_links.entry(src).or_default().insert(dst);
    }

    #[inline]
    pub fn out_links(&self) -> &BTreeMap<usize, BTreeSet<usize>> {
        &self.out_links
    }

    #[inline]
    pub fn arena(&self) -> &ArtifactArena {
        &self.arena
    }

    /// Merges `other`, whose ids are labelled by `other_dict`, into this graph.
    ///
    /// Endpoints are translated through their labels to ids of this graph's arena,
    /// minting new ids for unseen labels. Edges are sets, so merging the same graph
    /// twice changes nothing.
    pub fn combine(&mut self, other: &DependencyGraph, other_dict: &ProjectDictionary) -> &mut Self {
        let mut untranslated = 0usize;
        for (&src, targets) in &other.out_links {
            let Some(src_label) = other_dict.get(src) else {
                untranslated += targets.len();
                continue;
            };
            let u = self.arena.intern(src_label);
            for &dst in targets {
                match other_dict.get(dst) {
                    Some(dst_label) => {
                        let v = self.arena.intern(dst_label);
                        self.add_edge(u, v);
                    }
                    None => untranslated += 1,
                }
            }
        }
        if untranslated > 0 {
            warn!("combine: {} edges have endpoints missing from the dictionary", untranslated);
        }
        self
    }

    /// Endpoint labels in the order [`combine`](Self::combine) meets them: each labelled
    /// source, then its labelled targets. Sources without a label are skipped whole.
    fn labels_in_edge_order<'a>(&'a self, dict: &'a ProjectDictionary) -> impl Iterator<Item = &'a str> + 'a {
        self.out_links
            .iter()
            .filter_map(move |(&src, targets)| {
                let src_label = dict.get(src)?;
                Some(std::iter::once(src_label).chain(targets.iter().filter_map(move |&dst| dict.get(dst))))
            })
            .flatten()
    }

    /// Combines many project graphs in one pass.
    ///
    /// Ids are assigned by a single-threaded pre-pass over the labels in input order,
    /// then each graph is translated in parallel against the frozen arena. The result
    /// is identical to combining the graphs one by one in the same order.
    pub fn combine_all(parts: &[(DependencyGraph, ProjectDictionary)]) -> DependencyGraph {
        info!("Combining {} dependency graphs", parts.len());
        let mut combined = DependencyGraph::new();

        for (graph, dict) in parts {
            combined.arena.intern_all(graph.labels_in_edge_order(dict));
        }

        let arena = &combined.arena;
        let translated: Vec<Vec<(usize, usize)>> = parts
            .par_iter()
            .map(|(graph, dict)| {
                let mut edges = Vec::with_capacity(graph.num_edges());
                for (&src, targets) in &graph.out_links {
                    let Some(u) = dict.get(src).and_then(|l| arena.id(l)) else {
                        continue;
                    };
                    edges.extend(
                        targets.iter().filter_map(|&dst| dict.get(dst).and_then(|l| arena.id(l))).map(|v| (u, v)),
                    );
                }
                edges
            })
            .collect();

        for (u, v) in translated.into_iter().flatten() {
            combined.add_edge(u, v);
        }

        debug!(
            "Combined graph: {} artifacts, {} nodes, {} edges",
            combined.arena.len(),
            combined.num_nodes(),
            combined.num_edges()
        );
        combined
    }

    /// Number of distinct ids referenced by any edge endpoint.
    pub fn num_nodes(&self) -> usize {
        let mut nodes: BTreeSet<usize> = BTreeSet::new();
        for (&src, targets) in &self.out_links {
            if !targets.is_empty() {
                nodes.insert(src);
            }
            nodes.extend(targets.iter().copied());
        }
        nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.out_links.values().map(BTreeSet::len).sum()
    }

    /// Nodes with at least one outgoing edge.
    pub fn num_sources(&self) -> usize {
        self.out_links.values().filter(|t| !t.is_empty()).count()
    }

    /// Edge set expressed as labels of this graph's arena.
    pub fn labelled_edges(&self) -> BTreeSet<(String, String)> {
        let mut edges = BTreeSet::new();
        for (&src, targets) in &self.out_links {
            for &dst in targets {
                if let (Some(u), Some(v)) = (self.arena.label(src), self.arena.label(dst)) {
                    edges.insert((u.to_string(), v.to_string()));
                }
            }
        }
        edges
    }

    /// Incidence matrix with one row per target node and one column per source node.
    pub fn incidence(&self) -> SparseMatrix {
        let n = self
            .out_links
            .iter()
            .flat_map(|(&s, t)| std::iter::once(s).chain(t.iter().copied()))
            .max()
            .map_or(0, |m| m + 1);
        let mut m = SparseMatrix::new(n, n);
        for (&src, targets) in &self.out_links {
            for &dst in targets {
                m.put(dst, src, 1.0);
            }
        }
        m
    }

    /// In-degree of every node: the number of distinct sources pointing at it.
    pub fn document_frequencies(&self) -> SparseVector {
        let incidence = self.incidence();
        let (_, ncols) = incidence.shape();
        let mut ones = SparseVector::new(ncols);
        for j in 0..ncols {
            ones.put(j, 1.0);
        }
        incidence.times(&ones)
    }

    /// IDF weight `ln(sources / df)` of every labelled artifact with non-zero df.
    pub fn idf_weights(&self) -> HashMap<String, f64> {
        let sources = self.num_sources() as f64;
        let df = self.document_frequencies();
        let mut weights = HashMap::with_capacity(df.nnz());
        let mut unweighted = 0usize;

        for (id, label) in self.arena.labels.iter().enumerate() {
            let freq = if id < df.size() { df.get(id) } else { 0.0 };
            if freq > 0.0 {
                weights.insert(label.clone(), (sources / freq).ln());
            } else {
                unweighted += 1;
            }
        }

        if unweighted > 0 {
            trace!("{} artifacts have no incoming edge and stay unweighted", unweighted);
        }
        debug!("IDF over {} sources: {} weighted artifacts", sources, weights.len());
        weights
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "DependencyGraph: {} nodes, {} edges, {} labelled artifacts",
            self.num_nodes(),
            self.num_edges(),
            self.arena.len()
        )?;
        for (src, targets) in &self.out_links {
            let rendered: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
            writeln!(f, "  {} -> [{}]", src, rendered.join(", "))?;
        }
        Ok(())
    }
}
