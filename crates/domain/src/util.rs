use std::collections::HashSet;

/// Trims entries, drops blanks, and removes case-insensitive duplicates
/// while keeping the first occurrence's casing.
pub fn dedupe_normalized(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter_map(|value| {
            let normalized = value.trim().to_string();
            if normalized.is_empty() {
                None
            } else if seen.insert(normalized.to_ascii_lowercase()) {
                Some(normalized)
            } else {
                None
            }
        })
        .collect()
}

pub fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn contains_ignore_case(values: &[String], needle: &str) -> bool {
    values
        .iter()
        .any(|value| value.eq_ignore_ascii_case(needle))
}

pub fn intersects_ignore_case(left: &[String], right: &[String]) -> bool {
    left.iter().any(|value| contains_ignore_case(right, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_drops_blank_and_case_duplicates() {
        let values = vec![
            "  invoice  ".to_string(),
            "INVOICE".to_string(),
            "".to_string(),
            "   ".to_string(),
            "billing".to_string(),
        ];
        assert_eq!(
            dedupe_normalized(values),
            vec!["invoice".to_string(), "billing".to_string()]
        );
    }

    #[test]
    fn trim_optional_collapses_blank_to_none() {
        assert_eq!(trim_optional(Some("  ".to_string())), None);
        assert_eq!(
            trim_optional(Some(" x ".to_string())),
            Some("x".to_string())
        );
        assert_eq!(trim_optional(None), None);
    }

    #[test]
    fn intersection_is_case_insensitive() {
        let left = vec!["Urgent".to_string()];
        let right = vec!["billing".to_string(), "URGENT".to_string()];
        assert!(intersects_ignore_case(&left, &right));
        assert!(!intersects_ignore_case(&left, &["other".to_string()]));
    }
}
