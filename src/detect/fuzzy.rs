//! Tokenization and edit distance for approximate brand matching.

use crate::constants::detection::{LONG_KEY_LEN, MIN_FUZZY_KEY_LEN};

/// A maximal run of alphanumeric characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    /// Lowercased token text
    pub lower: String,
}

/// Split `text` into alphanumeric runs with byte offsets.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_alphanumeric() {
            let (_, lower) = current.get_or_insert_with(|| (idx, String::new()));
            lower.extend(ch.to_lowercase());
        } else if let Some((start, lower)) = current.take() {
            tokens.push(Token {
                start,
                end: idx,
                lower,
            });
        }
    }

    if let Some((start, lower)) = current {
        tokens.push(Token {
            start,
            end: text.len(),
            lower,
        });
    }

    tokens
}

/// Lowercase and keep only alphanumerics: "Data-Tobiz" → "datatobiz"
pub fn collapse(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Edits a collapsed key of this length may absorb
pub fn tolerance(key: &str) -> usize {
    match key.chars().count() {
        n if n < MIN_FUZZY_KEY_LEN => 0,
        n if n < LONG_KEY_LEN => 1,
        _ => 2,
    }
}

/// Optimal string alignment distance over chars, or `None` once it exceeds `max`.
pub fn bounded_distance(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    if a.is_empty() || b.is_empty() {
        let d = a.len().max(b.len());
        return (d <= max).then_some(d);
    }

    let width = b.len() + 1;
    let mut prev2 = vec![0usize; width];
    let mut prev: Vec<usize> = (0..width).collect();
    let mut curr = vec![0usize; width];

    for i in 1..=a.len() {
        curr[0] = i;
        let mut row_min = curr[0];
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut value = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                value = value.min(prev2[j - 2] + 1);
            }
            curr[j] = value;
            row_min = row_min.min(value);
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev2, &mut prev);
        std::mem::swap(&mut prev, &mut curr);
    }

    let d = prev[b.len()];
    (d <= max).then_some(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_offsets() {
        let tokens = tokenize("Data-Tobiz, Inc.");
        let words: Vec<_> = tokens.iter().map(|t| t.lower.as_str()).collect();
        assert_eq!(words, vec!["data", "tobiz", "inc"]);
        assert_eq!((tokens[1].start, tokens[1].end), (5, 10));
        assert_eq!(tokens[2].end, 15);
    }

    #[test]
    fn test_tokenize_multibyte() {
        let tokens = tokenize("café – Tobiz");
        assert_eq!(tokens.len(), 2);
        assert_eq!(&"café – Tobiz"[tokens[0].start..tokens[0].end], "café");
        assert_eq!(&"café – Tobiz"[tokens[1].start..tokens[1].end], "Tobiz");
    }

    #[test]
    fn test_collapse() {
        assert_eq!(collapse("Data Tobiz"), "datatobiz");
        assert_eq!(collapse("datatobiz.com"), "datatobizcom");
        assert_eq!(collapse("  "), "");
    }

    #[test]
    fn test_tolerance_by_length() {
        assert_eq!(tolerance("ibm"), 0);
        assert_eq!(tolerance("datatobiz"), 1);
        assert_eq!(tolerance("datatobizcom"), 2);
    }

    #[test]
    fn test_bounded_distance() {
        assert_eq!(bounded_distance("datatobiz", "datatobiz", 1), Some(0));
        assert_eq!(bounded_distance("datatobiz", "datatobis", 1), Some(1));
        // transposition counts once
        assert_eq!(bounded_distance("datatobiz", "datatoibz", 1), Some(1));
        assert_eq!(bounded_distance("datatobiz", "metatobiz", 1), None);
        assert_eq!(bounded_distance("datatobiz", "metatobiz", 2), Some(2));
        assert_eq!(bounded_distance("datatobiz", "dtatobzi", 1), None);
        assert_eq!(bounded_distance("abc", "abcdef", 2), None);
        assert_eq!(bounded_distance("", "ab", 2), Some(2));
    }
}
