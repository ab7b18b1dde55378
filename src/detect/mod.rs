//! Brand Mention Detection
//!
//! Finds occurrences of a target brand in free text with a three-stage
//! cascade. Each stage runs only when the previous one found nothing:
//!
//! 1. **Exact**: case-insensitive occurrence of a configured variation whose
//!    neighbouring characters are not alphanumeric.
//! 2. **Fuzzy**: windows of consecutive alphanumeric tokens, collapsed to a
//!    lowercase key, equal to a variation's key or within a small edit
//!    distance that scales with key length.
//! 3. **Contextual**: one edit beyond the fuzzy tolerance, accepted only when
//!    a brand context keyword ("company", "services", ...) is nearby.
//!
//! Returned matches never overlap and are ordered by start offset.

mod context;
mod fuzzy;

pub use context::{ContextAnalyzer, KeywordSet};
pub use fuzzy::{bounded_distance, collapse, tokenize, tolerance};

use std::cmp::Reverse;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::{BrandConfig, Config};
use crate::types::{BrandMatch, MatchConfidence};
use fuzzy::Token;

#[derive(Debug, Clone)]
struct Variation {
    name: String,
    exact: Regex,
    key: String,
    first: Option<char>,
    key_len: usize,
    /// Widest token window compared against the key
    max_tokens: usize,
    tolerance: usize,
}

impl Variation {
    fn compile(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let exact = match Regex::new(&format!("(?i){}", regex::escape(name))) {
            Ok(re) => re,
            Err(e) => {
                warn!(variation = name, error = %e, "Skipping brand variation");
                return None;
            }
        };
        let key = collapse(name);
        let token_count = tokenize(name).len();

        Some(Self {
            name: name.to_string(),
            exact,
            first: key.chars().next(),
            key_len: key.chars().count(),
            tolerance: tolerance(&key),
            key,
            max_tokens: token_count + crate::constants::detection::EXTRA_WINDOW_TOKENS,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: usize,
    end: usize,
    variation: usize,
    distance: usize,
}

/// Compiled detector for one brand's variations and context vocabulary
#[derive(Debug, Clone)]
pub struct BrandDetector {
    variations: Vec<Variation>,
    context: ContextAnalyzer,
}

impl BrandDetector {
    /// `brand` supplies the context and sentiment vocabulary; `variations`
    /// are the spellings to look for.
    pub fn new(variations: &[String], brand: &BrandConfig) -> Self {
        Self {
            variations: variations
                .iter()
                .filter_map(|v| Variation::compile(v))
                .collect(),
            context: ContextAnalyzer::new(
                &brand.context_keywords,
                &brand.positive_keywords,
                &brand.negative_keywords,
                brand.context_window,
            ),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.effective_variations(), &config.brand)
    }

    pub fn detect(&self, text: &str) -> Vec<BrandMatch> {
        if text.trim().is_empty() || self.variations.is_empty() {
            return Vec::new();
        }

        let exact = self.exact_candidates(text);
        let (candidates, confidence) = if !exact.is_empty() {
            (exact, MatchConfidence::Exact)
        } else {
            let tokens = tokenize(text);
            let fuzzy = self.window_candidates(text, &tokens, false);
            if !fuzzy.is_empty() {
                (fuzzy, MatchConfidence::Fuzzy)
            } else {
                (
                    self.window_candidates(text, &tokens, true),
                    MatchConfidence::Contextual,
                )
            }
        };

        let matches: Vec<BrandMatch> = resolve_overlaps(candidates)
            .into_iter()
            .map(|c| BrandMatch {
                start: c.start,
                end: c.end,
                text: text[c.start..c.end].to_string(),
                variation: self.variations[c.variation].name.clone(),
                confidence,
                sentiment: self.context.sentiment(text, c.start, c.end),
            })
            .collect();

        if !matches.is_empty() {
            debug!(count = matches.len(), confidence = confidence.as_str(), "Brand mentions detected");
        }
        matches
    }

    fn exact_candidates(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (idx, variation) in self.variations.iter().enumerate() {
            let mut from = 0;
            while let Some(m) = variation.exact.find_at(text, from) {
                if is_word_bounded(text, m.start(), m.end()) {
                    candidates.push(Candidate {
                        start: m.start(),
                        end: m.end(),
                        variation: idx,
                        distance: 0,
                    });
                    from = m.end();
                } else {
                    // Retry one char later; a bounded occurrence may overlap this one
                    from = m.start()
                        + text[m.start()..]
                            .chars()
                            .next()
                            .map(char::len_utf8)
                            .unwrap_or(1);
                }
                if from >= text.len() {
                    break;
                }
            }
        }

        candidates
    }

    fn window_candidates(&self, text: &str, tokens: &[Token], contextual: bool) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (idx, variation) in self.variations.iter().enumerate() {
            if variation.key.is_empty() {
                continue;
            }
            let max = if contextual {
                variation.tolerance + 1
            } else {
                variation.tolerance
            };

            for i in 0..tokens.len() {
                if tokens[i].lower.chars().next() != variation.first {
                    continue;
                }

                // Closest window from this token; fewer tokens win ties
                let mut best: Option<(usize, usize)> = None;
                let mut collapsed = String::new();
                let last = (i + variation.max_tokens).min(tokens.len());
                for j in i..last {
                    collapsed.push_str(&tokens[j].lower);
                    if collapsed.chars().count() > variation.key_len + max {
                        break;
                    }
                    if let Some(distance) = bounded_distance(&collapsed, &variation.key, max)
                        && best.is_none_or(|(d, _)| distance < d)
                    {
                        best = Some((distance, j));
                    }
                }

                let Some((distance, j)) = best else {
                    continue;
                };
                let (start, end) = (tokens[i].start, tokens[j].end);
                if contextual && !self.context.corroborates(text, start, end) {
                    continue;
                }
                candidates.push(Candidate {
                    start,
                    end,
                    variation: idx,
                    distance,
                });
            }
        }

        candidates
    }
}

/// Convenience wrapper using the default context vocabulary
pub fn detect(text: &str, brand_variations: &[String]) -> Vec<BrandMatch> {
    BrandDetector::new(brand_variations, &BrandConfig::default()).detect(text)
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

/// Keep non-overlapping candidates: earliest start first, then the closest
/// match, then the longest span.
fn resolve_overlaps(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by_key(|c| (c.start, c.distance, Reverse(c.end - c.start), c.variation));

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.last().is_none_or(|last| candidate.start >= last.end) {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MentionSentiment;
    use proptest::prelude::*;

    fn vars(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_exact_match_at_start() {
        let matches = detect("DataTobiz is great", &vars(&["DataTobiz"]));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start, 0);
        assert_eq!(matches[0].end, 9);
        assert_eq!(matches[0].confidence, MatchConfidence::Exact);
        assert_eq!(matches[0].sentiment, MentionSentiment::Neutral);
    }

    #[test]
    fn test_exact_is_case_insensitive() {
        let matches = detect("datatobiz", &vars(&["DataTobiz"]));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].confidence, MatchConfidence::Exact);
        assert_eq!(matches[0].text, "datatobiz");
    }

    #[test]
    fn test_different_brand_is_not_a_match() {
        assert!(detect("MetaTobiz", &vars(&["DataTobiz"])).is_empty());
        let defaults = BrandConfig::default().brand_variations;
        assert!(detect("MetaTobiz is a consulting company", &defaults).is_empty());
    }

    #[test]
    fn test_exact_requires_word_boundary() {
        assert!(detect("BigDataTobizz", &vars(&["DataTobiz"]))
            .iter()
            .all(|m| m.confidence != MatchConfidence::Exact));
        let matches = detect("(DataTobiz's team)", &vars(&["DataTobiz"]));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start, 1);
    }

    #[test]
    fn test_fuzzy_collapses_whitespace_and_punctuation() {
        let matches = detect("We like Data Tobiz.", &vars(&["DataTobiz"]));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].confidence, MatchConfidence::Fuzzy);
        assert_eq!(matches[0].text, "Data Tobiz");

        let matches = detect("Try Data_Tobiz now", &vars(&["DataTobiz"]));
        assert_eq!(matches[0].text, "Data_Tobiz");
    }

    #[test]
    fn test_fuzzy_tolerates_one_typo() {
        let matches = detect("DataTobis builds dashboards", &vars(&["DataTobiz"]));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].confidence, MatchConfidence::Fuzzy);
        assert_eq!(matches[0].variation, "DataTobiz");
    }

    #[test]
    fn test_short_keys_never_fuzzy_match() {
        assert!(detect("IBN builds servers", &vars(&["IBM"])).is_empty());
    }

    #[test]
    fn test_contextual_needs_keyword() {
        let hit = detect("Datatobx is a consulting company", &vars(&["DataTobiz"]));
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].confidence, MatchConfidence::Contextual);
        assert_eq!(hit[0].text, "Datatobx");

        assert!(detect("Datatobx went home", &vars(&["DataTobiz"])).is_empty());
    }

    #[test]
    fn test_longer_span_wins_at_same_start() {
        let matches = detect(
            "Visit datatobiz.com today",
            &vars(&["DataTobiz", "datatobiz.com"]),
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text, "datatobiz.com");
    }

    #[test]
    fn test_multiple_matches_ordered() {
        let text = "DataTobiz leads. Others trail DataTobiz, and DATATOBIZ again.";
        let matches = detect(text, &vars(&["DataTobiz"]));
        assert_eq!(matches.len(), 3);
        assert!(matches.windows(2).all(|w| w[0].end <= w[1].start));
    }

    #[test]
    fn test_stages_do_not_mix() {
        // One exact mention suppresses the fuzzy stage entirely
        let matches = detect("DataTobiz and Data Tobis", &vars(&["DataTobiz"]));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].confidence, MatchConfidence::Exact);
    }

    #[test]
    fn test_empty_input() {
        assert!(detect("", &vars(&["DataTobiz"])).is_empty());
        assert!(detect("   \n\t", &vars(&["DataTobiz"])).is_empty());
        assert!(detect("DataTobiz", &[]).is_empty());
    }

    #[test]
    fn test_sentiment_attached() {
        let matches = detect("DataTobiz is a trusted partner", &vars(&["DataTobiz"]));
        assert_eq!(matches[0].sentiment, MentionSentiment::Positive);
    }

    proptest! {
        #[test]
        fn prop_matches_sorted_disjoint_and_sliced(text in "\\PC{0,80}") {
            let matches = detect(&text, &vars(&["DataTobiz", "Data Tobiz", "IBM"]));
            for m in &matches {
                prop_assert!(m.start < m.end);
                prop_assert_eq!(&text[m.start..m.end], m.text.as_str());
            }
            for pair in matches.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
        }

        #[test]
        fn prop_embedded_brand_found(prefix in "[a-z ]{0,20}", suffix in "[a-z ]{0,20}") {
            let text = format!("{} DataTobiz {}", prefix, suffix);
            let matches = detect(&text, &vars(&["DataTobiz"]));
            prop_assert!(matches.iter().any(|m| m.text == "DataTobiz"));
        }
    }
}
