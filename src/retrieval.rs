//! Fuzzy candidate retrieval
//!
//! Ranks dataset keys against a free-text query with a partial-ratio score
//! (best local alignment of the shorter string inside the longer one, scored
//! with normalized Levenshtein from `strsim`). There is no exact-key lookup;
//! exact names simply score 100.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RetrievalPolicy;

/// A dataset key paired with its similarity to the query (0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub key: String,
    pub score: f64,
}

/// Partial-ratio similarity on a 0-100 scale.
///
/// The shorter string is slid across the longer one, including windows that
/// overhang either end, and the best normalized Levenshtein similarity wins.
/// Either side being empty scores 0.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let needle: String = short.iter().collect();
    let n = short.len() as isize;
    let m = long.len() as isize;

    let mut best = 0.0_f64;
    for start in (1 - n)..m {
        let lo = start.max(0) as usize;
        let hi = (start + n).min(m) as usize;
        let window: String = long[lo..hi].iter().collect();
        let score = strsim::normalized_levenshtein(&needle, &window);
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }

    best * 100.0
}

/// Retrieval over a fixed set of keys under a [`RetrievalPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyRetriever {
    policy: RetrievalPolicy,
}

impl FuzzyRetriever {
    pub fn new(policy: RetrievalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetrievalPolicy {
        self.policy
    }

    /// Whether `query` is short enough to be scored
    pub fn accepts(&self, query: &str) -> bool {
        query.chars().count() <= self.policy.max_query_chars
    }

    /// Score every key, keep those above the floor, best first.
    ///
    /// Blank and over-long queries yield no candidates.
    ///
    /// Ties are broken by key so results are reproducible.
    pub fn rank<'a, I>(&self, query: &str, keys: I) -> Vec<RetrievalCandidate>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let query = query.trim();
        if self.policy.top_n == 0 || query.is_empty() {
            return Vec::new();
        }
        if !self.accepts(query) {
            warn!(
                "Query of {} chars exceeds the {} char limit; not scoring",
                query.chars().count(),
                self.policy.max_query_chars
            );
            return Vec::new();
        }

        let query = query.to_lowercase();
        let mut candidates: Vec<RetrievalCandidate> = keys
            .into_iter()
            .map(|key| RetrievalCandidate {
                key: key.to_string(),
                score: partial_ratio(&query, key),
            })
            .filter(|c| c.score > self.policy.min_score)
            .collect();

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
        candidates.truncate(self.policy.top_n);

        debug!(
            "Retrieved {} candidates for {:?} (top score {:.1})",
            candidates.len(),
            query,
            candidates.first().map(|c| c.score).unwrap_or(0.0)
        );

        candidates
    }

    /// Ranked keys only
    pub fn retrieve<'a, I>(&self, query: &str, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.rank(query, keys).into_iter().map(|c| c.key).collect()
    }
}

/// Convenience wrapper over [`FuzzyRetriever::retrieve`]
pub fn retrieve<S: AsRef<str>>(query: &str, keys: &[S], top_n: usize, min_score: f64) -> Vec<String> {
    FuzzyRetriever::new(RetrievalPolicy::new(top_n, min_score))
        .retrieve(query, keys.iter().map(AsRef::as_ref))
}
