// Wildcard Pattern Matching
//
// Matches file and blob names against metadata patterns.
// Comparison is case-insensitive and anchored at the start only.

use regex::Regex;

/// A metadata pattern compiled once for repeated matching.
///
/// Rules:
/// - both sides are upper-cased before comparison
/// - `*` stands for zero or more word characters (`\w*`)
/// - every other regex metacharacter keeps its regex meaning
/// - the pattern must match a prefix of the candidate, trailing
///   characters in the candidate are ignored
///
/// A pattern that does not compile never matches.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Option<Regex>,
}

impl Pattern {
    pub fn new(pattern: &str) -> Self {
        let expression = pattern.to_uppercase().replace('*', r"\w*");

        let regex = match Regex::new(&format!("^(?:{expression})")) {
            Ok(re) => Some(re),
            Err(err) => {
                tracing::debug!(%pattern, error = %err, "pattern does not compile, treating as no match");
                None
            }
        };
        Self { regex }
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|re| re.is_match(&candidate.to_uppercase()))
    }
}

/// One-off match of `candidate` against `pattern`.
pub fn matches(candidate: &str, pattern: &str) -> bool {
    Pattern::new(pattern).is_match(candidate)
}

/// Last path segment of a blob name.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_is_case_insensitive() {
        assert!(matches("INVOICE_2024.CSV", "invoice*"));
        assert!(matches("invoice_2024.csv", "INVOICE*"));
    }

    #[test]
    fn match_is_anchored_at_start_only() {
        assert!(matches("INVOICE_2024.CSV", "INVOICE_2024"));
        assert!(matches("INVOICE", "INV.*"));
        assert!(!matches("MY_INVOICE", "INVOICE*"));
    }

    #[test]
    fn star_only_spans_word_characters() {
        assert!(matches("BUCKET/IN/SALES_01.CSV", "bucket/in/sales*.csv"));
        assert!(!matches("BUCKET/IN/SALES-01.CSV", "bucket/in/sales*.csv"));
        assert!(!matches("BUCKET/IN/X/SALES.CSV", "bucket/in/*.csv"));
    }

    #[test]
    fn dot_keeps_regex_meaning() {
        assert!(matches("SALESXCSV", "sales.csv"));
    }

    #[test]
    fn empty_pattern_matches_everything() {
        assert!(matches("anything/at/all.txt", ""));
    }

    #[test]
    fn invalid_expression_never_matches() {
        assert!(!matches("SALES(1).CSV", "sales("));
    }

    #[test]
    fn compiled_pattern_is_reusable() {
        let pattern = Pattern::new("in/sales*.csv");
        let names = ["in/sales_01.csv", "IN/SALES_02.CSV", "in/costs_01.csv"];

        let hits: Vec<&str> = names.into_iter().filter(|n| pattern.is_match(n)).collect();
        assert_eq!(hits, vec!["in/sales_01.csv", "IN/SALES_02.CSV"]);
        assert!(!Pattern::new("sales(").is_match("sales("));
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(file_name("in/2024/sales.csv"), "sales.csv");
        assert_eq!(file_name("sales.csv"), "sales.csv");
        assert_eq!(file_name("in/"), "");
    }
}
