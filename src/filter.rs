use crate::lexicon::IgnoreLexicon;
use crate::store::CodeStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedCode {
    pub code: String,
    pub provenance_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// On the ignore list.
    Ignored,
    /// Reported before, in an earlier run or earlier in this one.
    Known,
    Accepted(AcceptedCode),
}

/// Judge one candidate. The lexicon is consulted first, so an ignored word
/// is never accepted whatever the store holds.
pub fn evaluate(
    candidate: &str,
    provenance_link: &str,
    lexicon: &IgnoreLexicon,
    store: &dyn CodeStore,
) -> Verdict {
    if lexicon.contains(candidate) {
        Verdict::Ignored
    } else if store.contains(candidate) {
        Verdict::Known
    } else {
        Verdict::Accepted(AcceptedCode {
            code: candidate.to_string(),
            provenance_link: provenance_link.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileCodeStore;

    fn store() -> (tempfile::TempDir, FileCodeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCodeStore::load(dir.path().join("known.txt")).unwrap();
        (dir, store)
    }

    #[test]
    fn lexicon_wins_over_store_state() {
        let lex = IgnoreLexicon::from_text("CODE\n", true);
        let (_dir, mut store) = store();
        assert_eq!(evaluate("CODE", "l", &lex, &store), Verdict::Ignored);
        store.add("CODE").unwrap();
        assert_eq!(evaluate("CODE", "l", &lex, &store), Verdict::Ignored);
    }

    #[test]
    fn known_codes_are_rejected() {
        let lex = IgnoreLexicon::from_text("", true);
        let (_dir, mut store) = store();
        store.add("ABCD1234").unwrap();
        assert_eq!(evaluate("ABCD1234", "l", &lex, &store), Verdict::Known);
    }

    #[test]
    fn new_code_carries_its_link() {
        let lex = IgnoreLexicon::builtin(true);
        let (_dir, store) = store();
        assert_eq!(
            evaluate("ABCD1234", "https://example.test/p/1", &lex, &store),
            Verdict::Accepted(AcceptedCode {
                code: "ABCD1234".into(),
                provenance_link: "https://example.test/p/1".into(),
            })
        );
    }
}
