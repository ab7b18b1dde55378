//! Rank Estimation
//!
//! Infers where a brand sits inside one response. The first mention (by
//! offset) decides, using the first rule that applies:
//!
//! 1. List index: the response has at least two list marker lines and the
//!    mention falls inside an item.
//! 2. Ordinal phrase: the mentioning sentence states a position
//!    ("#3", "No. 3", "ranked 3rd", "second", ...).
//! 3. Paragraph order: index of the blank-line separated paragraph.
//!
//! This is positional inference over prose, not a search ranking.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::RankingConfig;
use crate::constants::ranking::MIN_LIST_ITEMS;
use crate::types::{BrandMatch, RankEstimate, RankMethod};

static LIST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:#{1,6}\s*)?(?:\*\*)?(?:\d{1,3}[.)]|[-*•])\s+").expect("valid list marker regex")
});

static ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \branked\s+\#?\s?(?P<ranked>\d{1,3})(?:st|nd|rd|th)?\b
        | \#\s?(?P<hash>\d{1,3})\b
        | \bno\.\s?(?P<no>\d{1,3})\b
        | \bnumber\s+(?P<number>\d{1,3})\b
        | \b(?P<word>first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth)\b",
    )
    .expect("valid ordinal regex")
});

/// Line of the response with byte offsets; `text` excludes the line break
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    start: usize,
    text: &'a str,
}

impl Line<'_> {
    fn end(&self) -> usize {
        self.start + self.text.len()
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset <= self.end()
    }

    fn is_indented(&self) -> bool {
        self.text.starts_with([' ', '\t'])
    }
}

fn split_lines(text: &str) -> Vec<Line<'_>> {
    let mut offset = 0;
    text.split_inclusive('\n')
        .map(|raw| {
            let line = Line {
                start: offset,
                text: raw.trim_end_matches(['\n', '\r']),
            };
            offset += raw.len();
            line
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct RankEstimator {
    max_position: u32,
    list_detection: bool,
    ordinal_detection: bool,
}

impl Default for RankEstimator {
    fn default() -> Self {
        Self::new(&RankingConfig::default())
    }
}

impl RankEstimator {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            max_position: config.max_position,
            list_detection: config.enable_list_detection,
            ordinal_detection: config.enable_ordinal_detection,
        }
    }

    /// `None` iff `matches` is empty.
    pub fn estimate(&self, text: &str, matches: &[BrandMatch]) -> Option<RankEstimate> {
        let first = matches.iter().min_by_key(|m| m.start)?;
        let offset = first.start.min(text.len());
        let lines = split_lines(text);

        let found = self
            .list_detection
            .then(|| list_index(&lines, offset).map(|p| (p, RankMethod::ListIndex)))
            .flatten()
            .or_else(|| {
                self.ordinal_detection
                    .then(|| ordinal_in_sentence(text, offset).map(|p| (p, RankMethod::OrdinalPhrase)))
                    .flatten()
            })
            .or_else(|| paragraph_index(&lines, offset).map(|p| (p, RankMethod::ParagraphOrder)));

        Some(match found {
            Some((position, method)) if (1..=self.max_position).contains(&position) => {
                RankEstimate::at(position, method)
            }
            _ => RankEstimate::unranked(),
        })
    }
}

/// Estimate with default ranking settings
pub fn estimate(text: &str, matches: &[BrandMatch]) -> Option<RankEstimate> {
    RankEstimator::default().estimate(text, matches)
}

/// Whether the text has enough marker lines to count as a list
pub fn has_list_structure(text: &str) -> bool {
    split_lines(text)
        .iter()
        .filter(|line| LIST_MARKER_RE.is_match(line.text))
        .count()
        >= MIN_LIST_ITEMS
}

/// 1-based item index within the list holding `offset`.
///
/// An item runs from its marker line until the next marker, a blank line, or
/// the end of text. An indented paragraph after a blank line continues the
/// open item (loose lists). An unindented prose line outside any item closes
/// the current list, so the next marker starts counting from 1 again.
fn list_index(lines: &[Line<'_>], offset: usize) -> Option<u32> {
    let markers = lines
        .iter()
        .filter(|line| LIST_MARKER_RE.is_match(line.text))
        .count();
    if markers < MIN_LIST_ITEMS {
        return None;
    }

    let mut index = 0u32;
    let mut in_item = false;
    let mut list_closed = false;

    for line in lines {
        if LIST_MARKER_RE.is_match(line.text) {
            if list_closed {
                index = 0;
                list_closed = false;
            }
            index += 1;
            in_item = true;
        } else if line.is_blank() {
            in_item = false;
        } else if !in_item {
            if index > 0 && !list_closed && line.is_indented() {
                in_item = true;
            } else {
                list_closed = true;
            }
        }

        if line.contains(offset) {
            return in_item.then_some(index);
        }
    }
    None
}

/// Sentence bounds around `offset`. Terminators are `.`, `!`, `?` followed by
/// whitespace, and line breaks; "No." does not end a sentence.
fn sentence_bounds(text: &str, offset: usize) -> (usize, usize) {
    let bytes = text.as_bytes();
    let is_terminator = |i: usize| -> bool {
        match bytes[i] {
            b'\n' => true,
            b'.' | b'!' | b'?' => {
                let followed_by_space = bytes.get(i + 1).is_none_or(|b| b.is_ascii_whitespace());
                let abbreviation = bytes[i] == b'.'
                    && i >= 2
                    && bytes[i - 2..i].eq_ignore_ascii_case(b"no")
                    && (i == 2 || !bytes[i - 3].is_ascii_alphanumeric());
                followed_by_space && !abbreviation
            }
            _ => false,
        }
    };

    let start = (0..offset)
        .rev()
        .find(|&i| is_terminator(i))
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = (offset..bytes.len())
        .find(|&i| is_terminator(i))
        .unwrap_or(bytes.len());
    (start, end)
}

/// Ordinal position stated in the sentence containing `offset`, nearest first
fn ordinal_in_sentence(text: &str, offset: usize) -> Option<u32> {
    let (start, end) = sentence_bounds(text, offset);
    // Terminators are ASCII, so both bounds sit on char boundaries
    let sentence = text.get(start..end)?;
    let local = offset - start;

    ORDINAL_RE
        .captures_iter(sentence)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let position = ["ranked", "hash", "no", "number"]
                .iter()
                .find_map(|name| caps.name(name))
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .or_else(|| caps.name("word").and_then(|m| ordinal_word(m.as_str())))?;
            let distance = if whole.start() > local {
                whole.start() - local
            } else {
                local.saturating_sub(whole.end())
            };
            (position > 0).then_some((distance, position))
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, position)| position)
}

fn ordinal_word(word: &str) -> Option<u32> {
    let position = match word.to_ascii_lowercase().as_str() {
        "first" => 1,
        "second" => 2,
        "third" => 3,
        "fourth" => 4,
        "fifth" => 5,
        "sixth" => 6,
        "seventh" => 7,
        "eighth" => 8,
        "ninth" => 9,
        "tenth" => 10,
        _ => return None,
    };
    Some(position)
}

/// 1-based index of the blank-line separated paragraph holding `offset`
fn paragraph_index(lines: &[Line<'_>], offset: usize) -> Option<u32> {
    let mut index = 0u32;
    let mut previous_blank = true;

    for line in lines {
        let blank = line.is_blank();
        if !blank && previous_blank {
            index += 1;
        }
        previous_blank = blank;

        if line.contains(offset) {
            return (index > 0).then_some(index);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchConfidence, MentionSentiment};

    fn mention(text: &str, needle: &str) -> BrandMatch {
        let start = text.find(needle).unwrap();
        BrandMatch {
            start,
            end: start + needle.len(),
            text: needle.to_string(),
            variation: needle.to_string(),
            confidence: MatchConfidence::Exact,
            sentiment: MentionSentiment::Neutral,
        }
    }

    fn rank_of(text: &str) -> RankEstimate {
        estimate(text, &[mention(text, "DataTobiz")]).unwrap()
    }

    #[test]
    fn test_numbered_list() {
        let text = "1. CompetitorA\n2. DataTobiz\n3. CompetitorB";
        assert_eq!(rank_of(text), RankEstimate::at(2, RankMethod::ListIndex));
    }

    #[test]
    fn test_no_matches_is_none() {
        assert_eq!(estimate("1. A\n2. B", &[]), None);
    }

    #[test]
    fn test_bullets_and_continuation_lines() {
        let text = "Top picks:\n\n- Acme Analytics\n- Contoso\n  with offices worldwide\n  and DataTobiz partners\n- Fabrikam";
        assert_eq!(rank_of(text), RankEstimate::at(2, RankMethod::ListIndex));
    }

    #[test]
    fn test_loose_list_with_indented_bodies() {
        let text = "1. Acme\n\n   Acme offers BI dashboards.\n\n2. DataTobiz\n\n   Consulting and data engineering.\n\n3. Contoso";
        assert_eq!(rank_of(text), RankEstimate::at(2, RankMethod::ListIndex));
    }

    #[test]
    fn test_mention_in_indented_item_body() {
        let text = "1. Acme\n\n   Dashboards for retail.\n\n2. Contoso Consulting\n\n   Partners closely with DataTobiz on BI.\n\n3. Fabrikam";
        assert_eq!(rank_of(text), RankEstimate::at(2, RankMethod::ListIndex));
    }

    #[test]
    fn test_markdown_heading_markers() {
        let text = "## 1. Acme\nGreat tools.\n\n## 2. **DataTobiz**\nAlso great.";
        assert_eq!(rank_of(text), RankEstimate::at(2, RankMethod::ListIndex));
    }

    #[test]
    fn test_prose_between_lists_restarts_count() {
        let text = "1. A\n2. B\n\nHonorable mentions:\n1. C\n2. DataTobiz";
        assert_eq!(rank_of(text), RankEstimate::at(2, RankMethod::ListIndex));
    }

    #[test]
    fn test_mention_outside_items_falls_back() {
        let text = "1. Acme\n2. Contoso\n\nDataTobiz is also worth a look.";
        assert_eq!(rank_of(text), RankEstimate::at(2, RankMethod::ParagraphOrder));
    }

    #[test]
    fn test_ordinal_phrases() {
        assert_eq!(
            rank_of("Among analytics firms, DataTobiz is ranked 3rd overall."),
            RankEstimate::at(3, RankMethod::OrdinalPhrase)
        );
        assert_eq!(
            rank_of("Acme leads. DataTobiz comes second in our review."),
            RankEstimate::at(2, RankMethod::OrdinalPhrase)
        );
        assert_eq!(
            rank_of("At No. 4 we have DataTobiz."),
            RankEstimate::at(4, RankMethod::OrdinalPhrase)
        );
        assert_eq!(
            rank_of("DataTobiz (#5) offers dashboards."),
            RankEstimate::at(5, RankMethod::OrdinalPhrase)
        );
    }

    #[test]
    fn test_ordinal_only_in_mentioning_sentence() {
        let text = "Acme is first. DataTobiz is a consultancy.";
        assert_eq!(rank_of(text), RankEstimate::at(1, RankMethod::ParagraphOrder));
    }

    #[test]
    fn test_paragraph_order() {
        let text = "Intro about BI.\n\nAcme does dashboards.\n\n\nDataTobiz offers consulting.";
        assert_eq!(rank_of(text), RankEstimate::at(3, RankMethod::ParagraphOrder));
    }

    #[test]
    fn test_beyond_max_position_is_unranked() {
        let text: String = (1..=25)
            .map(|i| {
                if i == 22 {
                    "22. DataTobiz\n".to_string()
                } else {
                    format!("{}. Company{}\n", i, i)
                }
            })
            .collect();
        assert_eq!(rank_of(&text), RankEstimate::unranked());
    }

    #[test]
    fn test_disabled_detectors_fall_through() {
        let estimator = RankEstimator::new(&RankingConfig {
            max_position: 20,
            enable_list_detection: false,
            enable_ordinal_detection: false,
        });
        let text = "1. CompetitorA\n2. DataTobiz";
        let result = estimator.estimate(text, &[mention(text, "DataTobiz")]);
        assert_eq!(result, Some(RankEstimate::at(1, RankMethod::ParagraphOrder)));
    }

    #[test]
    fn test_earliest_match_drives_estimate() {
        let text = "1. DataTobiz\n2. Other\n3. DataTobiz again";
        let first = mention(text, "DataTobiz");
        let mut later = first.clone();
        later.start = text.rfind("DataTobiz").unwrap();
        later.end = later.start + 9;
        assert_eq!(
            estimate(text, &[later, first]),
            Some(RankEstimate::at(1, RankMethod::ListIndex))
        );
    }

    #[test]
    fn test_has_list_structure() {
        assert!(has_list_structure("- a\n- b"));
        assert!(has_list_structure("• a\n• b"));
        assert!(!has_list_structure("1. only one\nthen prose"));
    }
}
