//! Splitting of natural-language justice lists.

use std::sync::OnceLock;

use regex::Regex;

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s*,\s*(?:and\s+)?|\s+and\s+").expect("separator regex must compile")
    })
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:chief\s+)?justices?\s+").expect("title regex must compile")
    })
}

/// Split a list like `"X"`, `"X and Y"`, `"X, Y, and Z"` or `"X, Y and Z"`
/// into its names, in order.
///
/// Heuristic: a list with missing separators (`"Chin Liu"`) comes back as a
/// single token. Those are recovered by
/// [`Roster::reduce`](crate::Roster::reduce), not here.
pub fn split_justices(fragment: &str) -> Vec<String> {
    separator_re()
        .split(fragment.trim())
        .map(|name| title_re().replace(name.trim(), "").trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_name() {
        assert_eq!(split_justices("Kruger"), vec!["Kruger"]);
    }

    #[test]
    fn oxford_comma() {
        assert_eq!(
            split_justices("Chin, Corrigan, and Groban"),
            vec!["Chin", "Corrigan", "Groban"]
        );
    }

    #[test]
    fn two_names() {
        assert_eq!(split_justices("Jones and Lee"), vec!["Jones", "Lee"]);
    }

    #[test]
    fn missing_oxford_comma() {
        assert_eq!(
            split_justices("Chin, Corrigan and Groban"),
            vec!["Chin", "Corrigan", "Groban"]
        );
    }

    #[test]
    fn padding_and_case() {
        assert_eq!(
            split_justices("  Liu ,Cuéllar,  AND  Kruger "),
            vec!["Liu", "Cuéllar", "Kruger"]
        );
    }

    #[test]
    fn empty_fragment() {
        assert!(split_justices("").is_empty());
        assert!(split_justices("   ").is_empty());
        assert!(split_justices(" , ").is_empty());
    }

    #[test]
    fn names_containing_and_are_not_split() {
        assert_eq!(split_justices("Anderson and Sanders"), vec!["Anderson", "Sanders"]);
    }

    #[test]
    fn repeated_titles_are_dropped() {
        assert_eq!(
            split_justices("Justice Chin and Justice Kruger"),
            vec!["Chin", "Kruger"]
        );
        assert_eq!(
            split_justices("Chief Justice Cantil-Sakauye, Justices Liu, and justice Groban"),
            vec!["Cantil-Sakauye", "Liu", "Groban"]
        );
    }

    #[test]
    fn title_inside_a_name_is_kept() {
        assert_eq!(split_justices("Justiceson"), vec!["Justiceson"]);
    }

    #[test]
    fn run_together_names_stay_whole() {
        assert_eq!(split_justices("Chin Corrigan, and Liu"), vec!["Chin Corrigan", "Liu"]);
    }
}
