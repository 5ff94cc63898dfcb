use std::sync::OnceLock;

use regex::Regex;

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn invalid() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]").unwrap())
}

/// Local name usable in an IRI: `^[A-Za-z_][A-Za-z0-9_]*$`.
///
/// Trim, whitespace runs → `_`, strip everything else outside `[A-Za-z0-9_]`,
/// prefix `_` when the result starts with a digit. Empty input becomes `_`.
pub fn sanitize_name(raw: &str) -> String {
    let spaced = whitespace().replace_all(raw.trim(), "_");
    let cleaned = invalid().replace_all(&spaced, "");

    match cleaned.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => cleaned.into_owned(),
        Some(_) => format!("_{cleaned}"),
        None => "_".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punctuation_is_stripped() {
        assert_eq!(sanitize_name("Solar Panel!!"), "Solar_Panel");
    }

    #[test]
    fn test_whitespace_runs_collapse() {
        assert_eq!(sanitize_name("  Electric \t Vehicle "), "Electric_Vehicle");
    }

    #[test]
    fn test_leading_digit_is_prefixed() {
        assert_eq!(sanitize_name("3D Printer"), "_3D_Printer");
    }

    #[test]
    fn test_empty_and_symbol_only_names() {
        assert_eq!(sanitize_name(""), "_");
        assert_eq!(sanitize_name("!!!"), "_");
        assert_eq!(sanitize_name("Café"), "Caf");
    }
}
