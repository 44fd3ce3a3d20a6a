//! Small lexical helpers shared by the router, query expansion and the
//! context assembler's overlap test.

use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how", "i", "in", "is", "it",
    "me", "my", "of", "on", "or", "the", "to", "what", "when", "where", "which", "who", "with",
];

/// Lower-cased alphanumeric words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(&token) }

/// Tokens with stopwords removed.
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text).into_iter().filter(|t| !is_stopword(t)).collect()
}

/// Word `n`-gram shingles. Texts shorter than `n` words yield one shingle of
/// the whole token sequence.
pub fn shingles(text: &str, n: usize) -> HashSet<String> {
    let tokens = tokenize(text);
    let n = n.max(1);
    if tokens.is_empty() { return HashSet::new(); }
    if tokens.len() < n { return HashSet::from([tokens.join(" ")]); }
    tokens.windows(n).map(|w| w.join(" ")).collect()
}

/// Shared-shingle fraction relative to the smaller set, so a passage fully
/// contained in another scores 1.0.
pub fn overlap_ratio(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let smaller = a.len().min(b.len());
    if smaller == 0 { return 0.0; }
    let shared = a.intersection(b).count();
    shared as f32 / smaller as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_punctuation() {
        assert_eq!(tokenize("B.Tech (CSE) fee?"), vec!["b", "tech", "cse", "fee"]);
        assert_eq!(content_tokens("What is the fee for CSE"), vec!["fee", "cse"]);
    }

    #[test]
    fn contained_passage_fully_overlaps() {
        let long = shingles("the hostel fee is payable every semester before classes start", 3);
        let short = shingles("hostel fee is payable every semester", 3);
        assert!((overlap_ratio(&long, &short) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn disjoint_passages_do_not_overlap() {
        let a = shingles("tuition is due in july", 3);
        let b = shingles("hostel allotment opens in june", 3);
        assert_eq!(overlap_ratio(&a, &b), 0.0);
        assert_eq!(overlap_ratio(&a, &HashSet::new()), 0.0);
    }

    #[test]
    fn short_text_is_a_single_shingle() {
        assert_eq!(shingles("Fee table", 3), HashSet::from(["fee table".to_string()]));
    }
}
