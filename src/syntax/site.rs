//! Position keys for locating nodes across traversals.

use std::fmt;

use swc_core::common::{Span, Spanned};

/// Identifies a node by its original source range.
///
/// Every node produced by the parser carries the byte range it was read from. Analyses record
/// `SiteKey`s and editors later find the same node again by comparing ranges, so no pointer into
/// the tree outlives a traversal. Synthesized nodes have a zero range and are never targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteKey {
    lo: u32,
    hi: u32,
}

impl SiteKey {
    /// Creates a key from a span.
    #[must_use]
    pub fn of(span: Span) -> Self {
        Self {
            lo: span.lo.0,
            hi: span.hi.0,
        }
    }

    /// Creates a key from any spanned node.
    #[must_use]
    pub fn from_node<N: Spanned>(node: &N) -> Self {
        Self::of(node.span())
    }

    /// Start of the range; used to order declarations by original position.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.lo
    }

    /// End of the range.
    #[must_use]
    pub fn end(&self) -> u32 {
        self.hi
    }

    /// True for nodes created by a rewrite rather than read from the input.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.lo == 0 && self.hi == 0
    }

    /// True if `other` lies within this range.
    #[must_use]
    pub fn contains(&self, other: SiteKey) -> bool {
        !self.is_synthetic() && self.lo <= other.lo && other.hi <= self.hi
    }

    /// True if this range ends before `other` starts.
    #[must_use]
    pub fn precedes(&self, other: SiteKey) -> bool {
        self.hi <= other.lo
    }
}

impl From<Span> for SiteKey {
    fn from(span: Span) -> Self {
        Self::of(span)
    }
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}..{}", self.lo, self.hi)
    }
}

#[cfg(test)]
mod tests {
    use swc_core::common::{BytePos, Span, DUMMY_SP};

    use super::SiteKey;

    fn span(lo: u32, hi: u32) -> Span {
        Span::new(BytePos(lo), BytePos(hi), Default::default())
    }

    #[test]
    fn test_containment_and_order() {
        let outer = SiteKey::of(span(10, 40));
        let inner = SiteKey::of(span(12, 20));
        let after = SiteKey::of(span(41, 45));

        assert!(outer.contains(inner));
        assert!(!inner.contains(outer));
        assert!(inner.precedes(after));
        assert!(!after.precedes(inner));
    }

    #[test]
    fn test_synthetic_never_contains() {
        let dummy = SiteKey::of(DUMMY_SP);
        assert!(dummy.is_synthetic());
        assert!(!dummy.contains(dummy));
    }
}
