use std::sync::LazyLock;

use regex::{Captures, Regex};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").unwrap());
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(?:x([0-9a-fA-F]{1,6})|([0-9]{1,7}));").unwrap());
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z0-9]{4,20}\b").unwrap());

const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&amp;", "&"),
];

/// Turn feed markup into plain text. Tags become whitespace so words on
/// either side of a tag never fuse into one token.
pub fn normalize(raw: &str) -> String {
    let text = TAG_RE.replace_all(raw, " ");
    let text = NUMERIC_ENTITY_RE.replace_all(&text, |caps: &Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| " ".to_string())
    });
    // &amp; last, otherwise "&amp;lt;" would decode twice
    NAMED_ENTITIES
        .iter()
        .fold(text.into_owned(), |acc, (entity, plain)| acc.replace(entity, plain))
}

/// Candidate codes in order of appearance, repeats included.
///
/// A candidate is a whole word of 4 to 20 characters drawn from `A-Z0-9`.
/// Longer runs are dropped rather than truncated, and runs glued to
/// lowercase letters or underscores are not words. With `letter_required`
/// a pure number (a year, a count) is not a candidate.
pub fn extract(text: &str, letter_required: bool) -> Vec<&str> {
    CODE_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|t| !letter_required || t.bytes().any(|b| b.is_ascii_uppercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_code_in_sentence() {
        assert_eq!(extract("Use code ABCD1234 now", true), vec!["ABCD1234"]);
    }

    #[test]
    fn pure_numbers_need_the_letter_switch_off() {
        assert_eq!(extract("2024 ABCD code", true), vec!["ABCD"]);
        assert_eq!(extract("2024 ABCD code", false), vec!["2024", "ABCD"]);
        assert!(extract("Year 2024 update", true).is_empty());
    }

    #[test]
    fn length_bounds() {
        assert!(extract("ABC", true).is_empty());
        assert_eq!(extract("ABCD", true), vec!["ABCD"]);

        let twenty = "A".repeat(20);
        assert_eq!(extract(&twenty, true), vec![twenty.as_str()]);

        let twenty_one = format!("{} ok", "B".repeat(21));
        assert!(extract(&twenty_one, true).is_empty());
    }

    #[test]
    fn runs_touching_lowercase_are_not_words() {
        assert!(extract("abcDEFGH", true).is_empty());
        assert!(extract("WXYZabc", true).is_empty());
        assert!(extract("WXYZ_1", true).is_empty());
        assert_eq!(extract("code:WXYZ, (QRST).", true), vec!["WXYZ", "QRST"]);
    }

    #[test]
    fn repeats_are_kept_in_order() {
        assert_eq!(
            extract("ZZZZ then AAAA then ZZZZ", true),
            vec!["ZZZZ", "AAAA", "ZZZZ"]
        );
    }

    #[test]
    fn stripped_tags_do_not_fuse_words() {
        let text = normalize("<b>AB</b>CD12");
        assert_eq!(extract(&text, true), vec!["CD12"]);

        let text = normalize("<p>Code:</p><p>TAC2024X</p>");
        assert_eq!(extract(&text, true), vec!["TAC2024X"]);
    }

    #[test]
    fn entities_are_decoded_after_tags() {
        assert_eq!(normalize("A&amp;B"), "A&B");
        assert_eq!(normalize("&amp;lt;"), "&lt;");
        assert_eq!(normalize("x&#32;y&#x41;"), "x yA");
        assert_eq!(normalize("&lt;b&gt;"), "<b>");
    }
}
