//! Title normalization and fuzzy similarity scoring

/// Lowercases and collapses every run of non-alphanumeric characters into one space
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Similarity of two titles in `[0, 1]`.
///
/// Both inputs are normalized, then compared with a gestalt (Ratcliff/Obershelp)
/// ratio: twice the number of characters in the recursively found longest
/// matching blocks, divided by the total length. The block search breaks ties
/// towards the left operand, so the larger of both orientations is returned.
pub fn score(a: &str, b: &str) -> f64 {
    let a: Vec<char> = normalize(a).chars().collect();
    let b: Vec<char> = normalize(b).chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_chars(&a, &b).max(matching_chars(&b, &a));
    (2 * matched) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut stack = vec![(0, a.len(), 0, b.len())];
    while let Some((a_lo, a_hi, b_lo, b_hi)) = stack.pop() {
        let (i, j, len) = longest_block(a, b, a_lo, a_hi, b_lo, b_hi);
        if len == 0 {
            continue;
        }
        matched += len;
        stack.push((a_lo, i, b_lo, j));
        stack.push((i + len, a_hi, j + len, b_hi));
    }
    matched
}

/// Longest common run of `a[a_lo..a_hi]` and `b[b_lo..b_hi]`, earliest in `a` then `b` on ties
fn longest_block(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_len) = (a_lo, b_lo, 0);
    // run lengths ending at the previous row of `a`, indexed by position in `b`
    let mut prev = vec![0usize; b_hi - b_lo + 1];
    for i in a_lo..a_hi {
        let mut row = vec![0usize; b_hi - b_lo + 1];
        for j in b_lo..b_hi {
            if a[i] == b[j] {
                let len = prev[j - b_lo] + 1;
                row[j - b_lo + 1] = len;
                if len > best_len {
                    best_len = len;
                    best_i = i + 1 - len;
                    best_j = j + 1 - len;
                }
            }
        }
        prev = row;
    }
    (best_i, best_j, best_len)
}
