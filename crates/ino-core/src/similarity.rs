// SPDX-License-Identifier: MIT OR Apache-2.0
//! Filename-based similarity scoring used by the customer-match fallback.
//!
//! Scores are token-overlap ratios in `[0, 100]` over normalized filename
//! tokens, with a substring bonus for customer numbers embedded in
//! filenames.

/// Strip the extension, lowercase, and trim a filename for matching.
#[must_use]
pub fn normalize_filename(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => name,
    };
    stem.trim().to_lowercase()
}

fn tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token-overlap score between a normalized filename and a candidate name,
/// in `[0, 100]`.
///
/// The score is the fraction of candidate tokens present in the filename;
/// an exact substring match of the whole candidate scores 100.
#[must_use]
pub fn token_overlap_score(normalized_filename: &str, candidate: &str) -> f64 {
    let candidate_lower = candidate.to_lowercase();
    if candidate_lower.is_empty() || normalized_filename.is_empty() {
        return 0.0;
    }
    if normalized_filename.contains(&candidate_lower) {
        return 100.0;
    }
    let file_tokens = tokens(normalized_filename);
    let cand_tokens = tokens(&candidate_lower);
    if cand_tokens.is_empty() {
        return 0.0;
    }
    let hits = cand_tokens
        .iter()
        .filter(|t| file_tokens.iter().any(|f| f == *t))
        .count();
    (hits as f64 / cand_tokens.len() as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_extension_and_case() {
        assert_eq!(normalize_filename("Acme_Contract_2025.PDF"), "acme_contract_2025");
        assert_eq!(normalize_filename("noext"), "noext");
        assert_eq!(normalize_filename(".hidden"), ".hidden");
    }

    #[test]
    fn substring_match_scores_full() {
        assert_eq!(token_overlap_score("acme industrial po 42", "acme industrial"), 100.0);
    }

    #[test]
    fn partial_token_overlap() {
        let score = token_overlap_score("acme_po_2025", "acme trading");
        assert!(score > 0.0 && score < 100.0, "{score}");
    }

    #[test]
    fn disjoint_tokens_score_zero() {
        assert_eq!(token_overlap_score("globex_po", "acme"), 0.0);
        assert_eq!(token_overlap_score("", "acme"), 0.0);
        assert_eq!(token_overlap_score("acme", ""), 0.0);
    }
}
