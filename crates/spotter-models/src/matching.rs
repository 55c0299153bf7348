//! Name normalization and tiered name matching.
//!
//! Live deduplication and offline scoring share this matcher. The live path
//! uses [`MatchMode::Live`] (exact and substring only); offline scoring uses
//! [`MatchMode::Offline`], which adds a fuzzy tier.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Default similarity a fuzzy match must reach.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.6;

/// Shortest normalized name allowed to take part in a substring match.
pub const MIN_SUBSTRING_LEN: usize = 3;

/// Normalize a name for comparison: lower-case, strip punctuation, collapse
/// whitespace.
///
/// The function is idempotent.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tier at which two names matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Substring,
    Fuzzy,
    #[default]
    None,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Substring => "substring",
            MatchType::Fuzzy => "fuzzy",
            MatchType::None => "none",
        }
    }

    /// Whether this tier counts as a match.
    pub fn is_match(&self) -> bool {
        !matches!(self, MatchType::None)
    }

    /// Priority rank (lower is better).
    pub fn rank(&self) -> u8 {
        match self {
            MatchType::Exact => 0,
            MatchType::Substring => 1,
            MatchType::Fuzzy => 2,
            MatchType::None => 3,
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which tiers the matcher may use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchMode {
    /// Exact and substring only (live dedup).
    Live,
    /// Exact, substring and fuzzy above the threshold (offline scoring).
    Offline { fuzzy_threshold: f64 },
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::Offline {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

/// Outcome of comparing two names.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameMatch {
    pub match_type: MatchType,
    /// Similarity in [0, 1]; 1.0 for exact, 0.0 for none.
    pub similarity: f64,
}

impl NameMatch {
    pub const NONE: NameMatch = NameMatch {
        match_type: MatchType::None,
        similarity: 0.0,
    };
}

/// Compare two already-normalized names.
pub fn match_normalized(a: &str, b: &str, mode: MatchMode) -> NameMatch {
    if a.is_empty() || b.is_empty() {
        return NameMatch::NONE;
    }

    if a == b {
        return NameMatch {
            match_type: MatchType::Exact,
            similarity: 1.0,
        };
    }

    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if shorter.chars().count() >= MIN_SUBSTRING_LEN && longer.contains(shorter) {
        return NameMatch {
            match_type: MatchType::Substring,
            similarity: shorter.len() as f64 / longer.len() as f64,
        };
    }

    if let MatchMode::Offline { fuzzy_threshold } = mode {
        let similarity = similarity(a, b);
        if similarity >= fuzzy_threshold {
            return NameMatch {
                match_type: MatchType::Fuzzy,
                similarity,
            };
        }
    }

    NameMatch::NONE
}

/// Normalize both names, then compare.
pub fn match_names(a: &str, b: &str, mode: MatchMode) -> NameMatch {
    match_normalized(&normalize_name(a), &normalize_name(b), mode)
}

/// Fuzzy similarity of two normalized names: the better of token overlap
/// (Jaccard) and normalized edit-distance similarity.
pub fn similarity(a: &str, b: &str) -> f64 {
    token_overlap(a, b).max(edit_similarity(a, b))
}

/// Jaccard overlap of whitespace-separated tokens.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    intersection / union
}

/// `1 - levenshtein / max_len`, computed over chars.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = if ca == *cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Name quality on the 0-5 scale used in evaluation summaries.
///
/// Exact = 5, substring = 4, fuzzy = 2..3 scaled by similarity above the
/// threshold, none = 0.
pub fn name_quality(name_match: &NameMatch, fuzzy_threshold: f64) -> f64 {
    match name_match.match_type {
        MatchType::Exact => 5.0,
        MatchType::Substring => 4.0,
        MatchType::Fuzzy => {
            let span = (1.0 - fuzzy_threshold).max(f64::EPSILON);
            let scaled = ((name_match.similarity - fuzzy_threshold) / span).clamp(0.0, 1.0);
            2.0 + scaled
        }
        MatchType::None => 0.0,
    }
}
