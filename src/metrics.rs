//! Ranking metrics for dependency recommendation.
//!
//! Per-project metrics take one ranked list and its ground truth. Fold-level
//! metrics (entropy, EPC, coverage, long tail, EBN, recall rate) take the ranked
//! lists of every test project of the fold. Any ratio with a zero denominator is 0.
use std::collections::{BTreeSet, HashMap, HashSet};

/// Distinct items among the first `k` recommendations that are in the ground truth.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use crossrec::metrics::hits_at_k;
///
/// let recs: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
/// let gt: BTreeSet<String> = ["c", "z"].iter().map(|s| s.to_string()).collect();
/// assert_eq!(hits_at_k(&recs, &gt, 2), 0);
/// assert_eq!(hits_at_k(&recs, &gt, 3), 1);
/// ```
#[must_use]
pub fn hits_at_k(recommended: &[String], ground_truth: &BTreeSet<String>, k: usize) -> usize {
    let top: HashSet<&String> = recommended.iter().take(k).collect();
    top.into_iter().filter(|item| ground_truth.contains(*item)).count()
}

/// Precision@K: hits over `k`.
#[must_use]
pub fn precision_at_k(recommended: &[String], ground_truth: &BTreeSet<String>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    hits_at_k(recommended, ground_truth, k) as f64 / k as f64
}

/// Recall@K: hits over the ground-truth size.
#[must_use]
pub fn recall_at_k(recommended: &[String], ground_truth: &BTreeSet<String>, k: usize) -> f64 {
    if ground_truth.is_empty() {
        return 0.0;
    }
    hits_at_k(recommended, ground_truth, k) as f64 / ground_truth.len() as f64
}

/// Success@K: 1.0 when at least one of the first `k` items is relevant.
#[must_use]
pub fn success_at_k(recommended: &[String], ground_truth: &BTreeSet<String>, k: usize) -> f64 {
    if hits_at_k(recommended, ground_truth, k) > 0 { 1.0 } else { 0.0 }
}

/// Harmonic mean of precision and recall, 0 when either is 0.
#[must_use]
pub fn f_score(precision: f64, recall: f64) -> f64 {
    if precision == 0.0 || recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

/// DCG@K with binary relevance: `sum rel_i / log2(i + 1)` over 1-based ranks.
#[must_use]
pub fn dcg_at_k(recommended: &[String], ground_truth: &BTreeSet<String>, k: usize) -> f64 {
    recommended
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, item)| ground_truth.contains(*item))
        .map(|(i, _)| 1.0 / ((i + 2) as f64).log2())
        .sum()
}

/// NDCG@K, normalized by the DCG of `min(|ground truth|, k)` leading hits.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use crossrec::metrics::ndcg_at_k;
///
/// let recs: Vec<String> = ["A", "C", "B"].iter().map(|s| s.to_string()).collect();
/// let gt: BTreeSet<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
/// assert!((ndcg_at_k(&recs, &gt, 3) - 0.9197).abs() < 1e-4);
/// ```
#[must_use]
pub fn ndcg_at_k(recommended: &[String], ground_truth: &BTreeSet<String>, k: usize) -> f64 {
    let ideal: f64 = (0..ground_truth.len().min(k)).map(|i| 1.0 / ((i + 2) as f64).log2()).sum();
    if ideal == 0.0 {
        return 0.0;
    }
    dcg_at_k(recommended, ground_truth, k) / ideal
}

/// Shannon entropy (natural log) of the items filling the top-`k` slots of all lists.
#[must_use]
pub fn entropy_at_k(recommendations: &[Vec<String>], k: usize) -> f64 {
    let mut freq: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for recs in recommendations {
        for item in recs.iter().take(k) {
            *freq.entry(item.as_str()).or_insert(0) += 1;
            total += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    freq.values()
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum()
}

/// Recommendation counts over the first `depth` items of every list, divided by
/// the largest count.
#[must_use]
pub fn popularity(recommendations: &[Vec<String>], depth: usize) -> HashMap<String, f64> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for recs in recommendations {
        for item in recs.iter().take(depth) {
            *counts.entry(item.clone()).or_insert(0) += 1;
        }
    }
    let max = counts.values().copied().max().unwrap_or(1).max(1) as f64;
    counts.into_iter().map(|(item, c)| (item, c as f64 / max)).collect()
}

/// Expected popularity complement over the relevant top-`k` hits of every list:
/// `sum (1 - pop) / log2(rank + 1)` divided by `sum 1 / log2(rank + 1)`.
#[must_use]
pub fn epc_at_k(
    recommendations: &[Vec<String>],
    ground_truths: &[BTreeSet<String>],
    popularity: &HashMap<String, f64>,
    k: usize,
) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (recs, gt) in recommendations.iter().zip(ground_truths) {
        for (i, item) in recs.iter().take(k).enumerate() {
            if gt.contains(item) {
                let discount = ((i + 2) as f64).log2();
                numerator += (1.0 - popularity.get(item).copied().unwrap_or(0.0)) / discount;
                denominator += 1.0 / discount;
            }
        }
    }
    if denominator == 0.0 { 0.0 } else { numerator / denominator }
}

/// Fraction of `vocabulary` recommended at least once in some top-`k`.
#[must_use]
pub fn catalog_coverage_at_k(recommendations: &[Vec<String>], vocabulary: &BTreeSet<String>, k: usize) -> f64 {
    if vocabulary.is_empty() {
        return 0.0;
    }
    let covered: HashSet<&String> = recommendations
        .iter()
        .flat_map(|recs| recs.iter().take(k))
        .filter(|item| vocabulary.contains(*item))
        .collect();
    covered.len() as f64 / vocabulary.len() as f64
}

/// Fraction of all top-`k` slots filled by long-tail items.
#[must_use]
pub fn long_tail_share_at_k(recommendations: &[Vec<String>], long_tail: &HashSet<String>, k: usize) -> f64 {
    let mut total = 0usize;
    let mut tail = 0usize;
    for item in recommendations.iter().flat_map(|recs| recs.iter().take(k)) {
        total += 1;
        if long_tail.contains(item) {
            tail += 1;
        }
    }
    if total == 0 { 0.0 } else { tail as f64 / total as f64 }
}

/// Mean `|predicted - rating|` over the rated items; unrated predictions count as 0.
///
/// `None` when there is no rated item.
#[must_use]
pub fn mean_absolute_error(predicted: &HashMap<String, f64>, ratings: &HashMap<String, f64>) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let total: f64 = ratings
        .iter()
        .map(|(item, rating)| (rating - predicted.get(item).copied().unwrap_or(0.0)).abs())
        .sum();
    Some(total / ratings.len() as f64)
}

/// Fraction of projects with at least one hit in their top-`n`.
#[must_use]
pub fn recall_rate(recommendations: &[Vec<String>], ground_truths: &[BTreeSet<String>], n: usize) -> f64 {
    if recommendations.is_empty() {
        return 0.0;
    }
    let hit = recommendations
        .iter()
        .zip(ground_truths)
        .filter(|(recs, gt)| hits_at_k(recs, gt, n) > 0)
        .count();
    hit as f64 / recommendations.len() as f64
}

/// Entropy-based novelty at `k`.
///
/// For an item recommended to project `p`, `P` is the share of the other `n - 1`
/// projects whose top-`k` also contains it. A project scores the mean of
/// `-P log2 P` over its items; the result is the mean over projects.
///
/// # Examples
///
/// ```
/// use crossrec::metrics::ebn_at_k;
///
/// let recs = vec![
///     vec!["shared".to_string(), "only-a".to_string()],
///     vec!["shared".to_string(), "only-b".to_string()],
/// ];
/// assert_eq!(ebn_at_k(&recs, 2), 0.0);
/// ```
#[must_use]
pub fn ebn_at_k(recommendations: &[Vec<String>], k: usize) -> f64 {
    let n = recommendations.len();
    if n <= 1 {
        return 0.0;
    }
    let tops: Vec<HashSet<&String>> = recommendations.iter().map(|r| r.iter().take(k).collect()).collect();
    let others = (n - 1) as f64;

    let total: f64 = tops
        .iter()
        .enumerate()
        .map(|(p, items)| {
            if items.is_empty() {
                return 0.0;
            }
            let sum: f64 = items
                .iter()
                .map(|item| {
                    let count = tops.iter().enumerate().filter(|(q, other)| *q != p && other.contains(*item)).count();
                    let prob = count as f64 / others;
                    if prob > 0.0 { -prob * prob.log2() } else { 0.0 }
                })
                .sum();
            sum / items.len() as f64
        })
        .sum();
    total / n as f64
}

/// Success-count buckets of the four-star success rate.
///
/// Thresholds are applied to the number of hits exactly as listed: `== 1`,
/// `1 < x < 3`, `2 < x < 4`, `> 3`. Each bucket implies the lower ones.
#[must_use]
pub fn success_buckets(hits: f64) -> [f64; 4] {
    if hits == 1.0 {
        [1.0, 0.0, 0.0, 0.0]
    } else if hits > 1.0 && hits < 3.0 {
        [1.0, 1.0, 0.0, 0.0]
    } else if hits > 2.0 && hits < 4.0 {
        [1.0, 1.0, 1.0, 0.0]
    } else if hits > 3.0 {
        [1.0, 1.0, 1.0, 1.0]
    } else {
        [0.0; 4]
    }
}

/// Unweighted mean, 0 for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() { 0.0 } else { values.iter().sum::<f64>() / values.len() as f64 }
}
