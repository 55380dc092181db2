use std::sync::LazyLock;

use regex::Regex;

// Anything outside ascii alnum, Latin-1 Supplement / Latin Extended-A/B letters
// and whitespace becomes a separator.
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9\u{00C0}-\u{024F}\s]").expect("valid normalize pattern")
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Canonical matching key: lowercase, punctuation replaced by spaces,
/// whitespace runs collapsed, trimmed. Idempotent.
pub fn normalize(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let lower = s.to_lowercase();
    let spaced = DISALLOWED.replace_all(&lower, " ");
    WHITESPACE.replace_all(&spaced, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_and_separator_insensitive() {
        assert_eq!(normalize(" Foo_Bar 2 "), normalize("foo bar 2"));
        assert_eq!(normalize("Super Game (USA)"), "super game usa");
    }

    #[test]
    fn keeps_accented_latin_letters() {
        assert_eq!(normalize("Pokémon — Édition Rouge!"), "pokémon édition rouge");
    }

    #[test]
    fn empty_and_punctuation_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  -_-  "), "");
    }

    #[test]
    fn idempotent() {
        for s in ["Zelda II - The Adventure of Link (Europe) (Rev 1)", "a\t\tb\nc", "ÀÉÎ--õü"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }
}
