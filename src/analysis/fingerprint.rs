//! Structural fingerprint checks over printed subtrees.
//!
//! Some templates are easiest to recognise by the shape of their printed code rather than by
//! walking every node: a decoder always splits its input and walks character codes, a realm
//! probe always reads `constructor` then `name` inside a `try`. A [`Fingerprint`] is an ordered
//! list of fragments that must occur in the printed text in that order, each contiguously, with
//! anything in between. Identifier names never appear in a pattern, so renaming does not defeat
//! the check.
//!
//! ```rust
//! use deconfuser::analysis::Fingerprint;
//!
//! const DECODER: Fingerprint = Fingerprint::new(&["split(", "for", "charCodeAt("]);
//! assert!(DECODER.matches("var p = s.split(\"\"); for (;;) { p[i].charCodeAt(0); }"));
//! assert!(!DECODER.matches("p[i].charCodeAt(0); s.split(\"\"); for (;;) {}"));
//! ```

/// An ordered subsequence of text fragments.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprint {
    fragments: &'static [&'static str],
}

impl Fingerprint {
    /// Declares a fingerprint. Usable in `const` position.
    #[must_use]
    pub const fn new(fragments: &'static [&'static str]) -> Self {
        Self { fragments }
    }

    /// The fragments, in required order.
    #[must_use]
    pub fn fragments(&self) -> &'static [&'static str] {
        self.fragments
    }

    /// True if every fragment occurs in `text`, in order, without overlapping.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let mut rest = text;
        for fragment in self.fragments {
            match rest.find(fragment) {
                Some(at) => rest = &rest[at + fragment.len()..],
                None => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::Fingerprint;

    const PROBE: Fingerprint = Fingerprint::new(&["try", "constructor", "name"]);

    #[test]
    fn test_order_matters() {
        assert!(PROBE.matches("try { x = \"\".constructor.name } catch (e) {}"));
        assert!(!PROBE.matches("x.name; try { x.constructor } catch (e) {}"));
    }

    #[test]
    fn test_fragments_do_not_overlap() {
        let twice = Fingerprint::new(&["ab", "ab"]);
        assert!(!twice.matches("xaby"));
        assert!(twice.matches("abab"));
    }

    #[test]
    fn test_empty_pattern_always_matches() {
        assert!(Fingerprint::new(&[]).matches(""));
    }
}
