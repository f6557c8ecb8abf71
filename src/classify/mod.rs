//! Tier Classifier — a pure function from query text to [`Tier`].
//!
//! A small, deterministic heuristic with no I/O and no state, easy to unit
//! test exhaustively.

mod keywords;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The four fixed routing tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Fast,
    Deep,
    Analysis,
    Writing,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Fast => "fast",
            Tier::Deep => "deep",
            Tier::Analysis => "analysis",
            Tier::Writing => "writing",
        };
        f.write_str(name)
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Tier::Fast),
            "deep" => Ok(Tier::Deep),
            "analysis" => Ok(Tier::Analysis),
            "writing" => Ok(Tier::Writing),
            other => Err(format!("unknown tier `{other}`")),
        }
    }
}

/// Classify `query` into a tier and a confidence in `[0.0, 1.0]`.
///
/// Ties are broken by fixed priority: `Analysis` > `Writing` > `Deep` >
/// `Fast` — reflecting that a query matching both an analysis and a
/// fast-path keyword is more likely to need the heavier tier.
///
/// An empty query, or one matching none of the four phrase lists, lands on
/// `(Fast, 0.5)` — there's no signal either way, so `Fast` is the cheapest
/// wrong guess.
pub fn classify(query: &str) -> (Tier, f64) {
    let trimmed = query.trim();
    let lower = trimmed.to_lowercase();

    let fast = count_matches(&lower, keywords::FAST) as f64;
    let mut deep = count_matches(&lower, keywords::DEEP) as f64;
    let analysis = count_matches(&lower, keywords::ANALYSIS) as f64;
    let writing = count_matches(&lower, keywords::WRITING) as f64;

    if trimmed.chars().count() > 200 {
        deep += 1.0;
    }
    let periods = trimmed.chars().filter(|&c| c == '.').count();
    let newlines = trimmed.chars().filter(|&c| c == '\n').count();
    if periods > 2 || newlines > 1 {
        deep += 1.0;
    }

    // Scanned in tie-break priority order — first to reach the max score wins.
    let candidates = [
        (Tier::Analysis, analysis),
        (Tier::Writing, writing),
        (Tier::Deep, deep),
        (Tier::Fast, fast),
    ];
    let mut best = candidates[0];
    for &(tier, score) in &candidates[1..] {
        if score > best.1 {
            best = (tier, score);
        }
    }
    let (tier, top_score) = best;

    if top_score <= 0.0 {
        return (Tier::Fast, 0.5);
    }

    let total = fast + deep + analysis + writing;
    (tier, (top_score / total).min(1.0))
}

fn count_matches(lower_query: &str, phrases: &[&str]) -> usize {
    phrases.iter().filter(|phrase| lower_query.contains(*phrase)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_fast_at_half_confidence() {
        assert_eq!(classify(""), (Tier::Fast, 0.5));
        assert_eq!(classify("   \n\t"), (Tier::Fast, 0.5));
    }

    #[test]
    fn fast_keyword_wins_with_no_other_signal() {
        let (tier, confidence) = classify("what is a slice in Rust?");
        assert_eq!(tier, Tier::Fast);
        assert!(confidence > 0.5);
    }

    #[test]
    fn deep_keyword_beats_no_signal() {
        let (tier, _) = classify("please refactor this function");
        assert_eq!(tier, Tier::Deep);
    }

    #[test]
    fn analysis_keyword_wins_over_deep_on_tie() {
        // Exactly one keyword hit each — Analysis must win the tie-break.
        let (tier, _) = classify("refactor and review this approach");
        assert_eq!(tier, Tier::Analysis);
    }

    #[test]
    fn writing_keyword_detected() {
        let (tier, _) = classify("write a tutorial on async Rust");
        assert_eq!(tier, Tier::Writing);
    }

    #[test]
    fn unmatched_query_falls_back_to_fast_with_no_signal() {
        let (tier, confidence) = classify("ping");
        assert_eq!(tier, Tier::Fast);
        assert_eq!(confidence, 0.5);
    }

    #[test]
    fn long_query_without_keywords_leans_deep() {
        let long_query = "a".repeat(250);
        let (tier, _) = classify(&long_query);
        assert_eq!(tier, Tier::Deep);
    }

    #[test]
    fn many_sentences_without_keywords_leans_deep() {
        // 3 periods (> 2) trips the structure heuristic, which now only
        // contributes to Deep, not Analysis.
        let query = "One. Two. Three. Four.";
        let (tier, _) = classify(query);
        assert_eq!(tier, Tier::Deep);
    }

    #[test]
    fn two_newlines_without_periods_trips_the_structure_heuristic() {
        let query = "first line\nsecond line\nthird line";
        let (tier, _) = classify(query);
        assert_eq!(tier, Tier::Deep);
    }

    #[test]
    fn two_periods_and_one_newline_does_not_trip_the_structure_heuristic() {
        let query = "First sentence. Second sentence.\nthird line";
        let (tier, _) = classify(query);
        assert_eq!(tier, Tier::Fast);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let (tier, _) = classify("REVIEW this PR");
        assert_eq!(tier, Tier::Analysis);
    }

    #[test]
    fn tier_round_trips_through_display_and_from_str() {
        for tier in [Tier::Fast, Tier::Deep, Tier::Analysis, Tier::Writing] {
            let parsed: Tier = tier.to_string().parse().unwrap();
            assert_eq!(parsed, tier);
        }
    }

    #[test]
    fn from_str_rejects_unknown_tier() {
        assert!("nonexistent".parse::<Tier>().is_err());
    }
}
