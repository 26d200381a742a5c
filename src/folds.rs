use std::fmt;

use log::{debug, warn};

/// One round of contiguous cross-validation over project positions `1..=total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fold {
    /// 1-based round number, used for `Round<k>` and `<Metric>_Round<k>`.
    pub index: usize,
    pub testing_start: usize,
    pub testing_end: usize,
    pub total: usize,
}

impl Fold {
    #[inline]
    pub fn testing_len(&self) -> usize {
        self.testing_end + 1 - self.testing_start
    }

    #[inline]
    pub fn is_testing(&self, position: usize) -> bool {
        position >= self.testing_start && position <= self.testing_end
    }

    /// Inclusive training ranges before and after the test block; empty ones are omitted.
    pub fn training_ranges(&self) -> Vec<(usize, usize)> {
        let mut ranges = Vec::with_capacity(2);
        if self.testing_start > 1 {
            ranges.push((1, self.testing_start - 1));
        }
        if self.testing_end < self.total {
            ranges.push((self.testing_end + 1, self.total));
        }
        ranges
    }
}

impl fmt::Display for Fold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Round{}: test [{}, {}]", self.index, self.testing_start, self.testing_end)?;
        for (s, e) in self.training_ranges() {
            write!(f, " train [{}, {}]", s, e)?;
        }
        Ok(())
    }
}

/// Splits positions `1..=n` into `k` contiguous test blocks.
///
/// Sizes differ by at most one; the first `n % k` folds take the extra position.
/// With fewer projects than folds only the non-empty folds are returned.
///
/// # Examples
///
/// ```
/// use crossrec::folds::folds;
///
/// let f = folds(57, 10);
/// assert_eq!(f.len(), 10);
/// assert_eq!((f[0].testing_start, f[0].testing_end), (1, 6));
/// assert_eq!((f[9].testing_start, f[9].testing_end), (53, 57));
/// ```
pub fn folds(n: usize, k: usize) -> Vec<Fold> {
    if k == 0 || n == 0 {
        warn!("No folds for {} projects and {} rounds", n, k);
        return Vec::new();
    }
    if n < k {
        warn!("Only {} projects for {} folds; {} folds stay empty", n, k, k - n);
    }

    let base = n / k;
    let extra = n % k;
    let mut out = Vec::with_capacity(k.min(n));
    let mut start = 1;
    for i in 0..k {
        let size = base + usize::from(i < extra);
        if size == 0 {
            continue;
        }
        let fold = Fold { index: i + 1, testing_start: start, testing_end: start + size - 1, total: n };
        debug!("{}", fold);
        out.push(fold);
        start += size;
    }
    out
}
