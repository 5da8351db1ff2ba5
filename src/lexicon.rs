use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

const BUILTIN: &str = include_str!("lexicon.txt");

/// Deny-list of tokens that have the shape of a code but are ordinary words,
/// platform names or page chrome.
#[derive(Debug, Clone)]
pub struct IgnoreLexicon {
    words: HashSet<String>,
    case_sensitive: bool,
}

impl IgnoreLexicon {
    pub fn builtin(case_sensitive: bool) -> Self {
        Self::from_text(BUILTIN, case_sensitive)
    }

    /// Parse one token per line; blank lines and `#` comments are skipped.
    pub fn from_text(text: &str, case_sensitive: bool) -> Self {
        let mut lexicon = IgnoreLexicon {
            words: HashSet::new(),
            case_sensitive,
        };
        lexicon.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        );
        lexicon
    }

    /// Build from settings: `ignore_file` replaces the built-in list,
    /// `extra` is added on top of whichever base was chosen.
    pub fn load(file: Option<&Path>, extra: &[String], case_sensitive: bool) -> Result<Self> {
        let mut lexicon = match file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read ignore list {:?}", path))?;
                Self::from_text(&text, case_sensitive)
            }
            None => Self::builtin(case_sensitive),
        };
        lexicon.extend(extra.iter().map(String::as_str));
        Ok(lexicon)
    }

    pub fn extend<'a>(&mut self, words: impl IntoIterator<Item = &'a str>) {
        for w in words {
            let key = self.key(w.trim());
            if !key.is_empty() {
                self.words.insert(key);
            }
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        if self.case_sensitive {
            self.words.contains(token)
        } else {
            self.words.contains(&token.to_uppercase())
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    fn key(&self, word: &str) -> String {
        if self.case_sensitive {
            word.to_string()
        } else {
            word.to_uppercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_common_noise() {
        let lex = IgnoreLexicon::builtin(true);
        for w in ["CODE", "TACTICUS", "HTTPS", "REDDIT", "NEW"] {
            assert!(lex.contains(w), "{} should be ignored", w);
        }
        assert!(!lex.contains("ABCD1234"));
        assert!(lex.len() > 50);
    }

    #[test]
    fn comments_and_blanks_are_not_entries() {
        let lex = IgnoreLexicon::from_text("# header\n\nFOO\n  BAR  \n", true);
        assert_eq!(lex.len(), 2);
        assert!(lex.contains("BAR"));
        assert!(!lex.contains("# header"));
    }

    #[test]
    fn case_sensitivity_is_explicit() {
        let strict = IgnoreLexicon::from_text("Code\n", true);
        assert!(!strict.contains("CODE"));
        assert!(strict.contains("Code"));

        let loose = IgnoreLexicon::from_text("Code\n", false);
        assert!(loose.contains("CODE"));
        assert!(loose.contains("code"));
    }

    #[test]
    fn file_replaces_builtin_and_extra_extends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ignore.txt");
        std::fs::write(&path, "ONLY\n").unwrap();

        let lex = IgnoreLexicon::load(Some(path.as_path()), &["MORE".to_string()], true).unwrap();
        assert!(lex.contains("ONLY"));
        assert!(lex.contains("MORE"));
        assert!(!lex.contains("CODE"));

        let lex = IgnoreLexicon::load(None, &["MORE".to_string()], true).unwrap();
        assert!(lex.contains("CODE"));
        assert!(lex.contains("MORE"));
    }

    #[test]
    fn missing_ignore_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(IgnoreLexicon::load(Some(dir.path().join("nope.txt").as_path()), &[], true).is_err());
    }
}
