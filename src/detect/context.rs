//! Keyword context around a mention: corroboration and sentiment.

use regex::Regex;

use crate::types::MentionSentiment;

/// Case-insensitive whole-word matcher over a keyword list
#[derive(Debug, Clone)]
pub struct KeywordSet {
    pattern: Option<Regex>,
}

impl KeywordSet {
    pub fn new(keywords: &[String]) -> Self {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        if alternatives.is_empty() {
            return Self { pattern: None };
        }

        // Escaped literals always form a valid pattern
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).ok();
        Self { pattern }
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn contains_in(&self, haystack: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(haystack))
    }

    pub fn count_in(&self, haystack: &str) -> usize {
        self.pattern
            .as_ref()
            .map(|p| p.find_iter(haystack).count())
            .unwrap_or(0)
    }
}

/// Inspects the text within `window` bytes of a span
#[derive(Debug, Clone)]
pub struct ContextAnalyzer {
    context: KeywordSet,
    positive: KeywordSet,
    negative: KeywordSet,
    window: usize,
}

impl ContextAnalyzer {
    pub fn new(
        context_keywords: &[String],
        positive_keywords: &[String],
        negative_keywords: &[String],
        window: usize,
    ) -> Self {
        Self {
            context: KeywordSet::new(context_keywords),
            positive: KeywordSet::new(positive_keywords),
            negative: KeywordSet::new(negative_keywords),
            window,
        }
    }

    /// Text surrounding `start..end`, excluding the span itself
    fn surroundings<'a>(&self, text: &'a str, start: usize, end: usize) -> (&'a str, &'a str) {
        let lo = floor_char_boundary(text, start.saturating_sub(self.window));
        let hi = ceil_char_boundary(text, end.saturating_add(self.window).min(text.len()));
        (&text[lo..start], &text[end..hi])
    }

    /// Whether a brand context keyword appears near the span
    pub fn corroborates(&self, text: &str, start: usize, end: usize) -> bool {
        if self.context.is_empty() {
            return false;
        }
        let (before, after) = self.surroundings(text, start, end);
        self.context.contains_in(before) || self.context.contains_in(after)
    }

    pub fn sentiment(&self, text: &str, start: usize, end: usize) -> MentionSentiment {
        let (before, after) = self.surroundings(text, start, end);
        let positive = self.positive.count_in(before) + self.positive.count_in(after);
        let negative = self.negative.count_in(before) + self.negative.count_in(after);

        match (positive > 0, negative > 0) {
            (true, true) => MentionSentiment::Mixed,
            (true, false) => MentionSentiment::Positive,
            (false, true) => MentionSentiment::Negative,
            (false, false) => MentionSentiment::Neutral,
        }
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn analyzer(window: usize) -> ContextAnalyzer {
        ContextAnalyzer::new(
            &words(&["company", "services"]),
            &words(&["trusted", "award-winning"]),
            &words(&["poor", "outdated"]),
            window,
        )
    }

    #[test]
    fn test_corroborates_within_window() {
        let text = "Datatobis is a consulting company";
        assert!(analyzer(200).corroborates(text, 0, 9));
        assert!(!analyzer(5).corroborates(text, 0, 9));
    }

    #[test]
    fn test_keywords_are_whole_words() {
        let set = KeywordSet::new(&words(&["firm"]));
        assert!(set.contains_in("a data firm."));
        assert!(!set.contains_in("confirmed"));
        assert!(KeywordSet::new(&words(&["  "])).is_empty());
    }

    #[test]
    fn test_sentiment() {
        let a = analyzer(200);
        let text = "DataTobiz is a trusted partner";
        assert_eq!(a.sentiment(text, 0, 9), MentionSentiment::Positive);

        let text = "Outdated tooling, but DataTobiz is award-winning";
        assert_eq!(a.sentiment(text, 22, 31), MentionSentiment::Mixed);

        let text = "DataTobiz builds dashboards";
        assert_eq!(a.sentiment(text, 0, 9), MentionSentiment::Neutral);
    }

    #[test]
    fn test_window_respects_char_boundaries() {
        let text = "ééééé DataTobiz ééééé poor";
        let start = text.find("DataTobiz").unwrap();
        // 4 bytes either side lands inside a two-byte char
        let a = analyzer(4);
        assert_eq!(a.sentiment(text, start, start + 9), MentionSentiment::Neutral);
    }
}
