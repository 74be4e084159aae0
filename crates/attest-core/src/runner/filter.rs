//! Test selection by name and tag

use crate::registry::UnitId;
use crate::traits::Tag;
use std::collections::BTreeSet;

/// Selects which tests a run executes.
///
/// An empty filter selects everything. Name patterns are plain substrings
/// matched against the full identifier and the display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    names: Vec<String>,
    skip: Vec<String>,
    include_tags: BTreeSet<Tag>,
    exclude_tags: BTreeSet<Tag>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only tests matching one of the name patterns.
    pub fn with_name(mut self, pattern: impl Into<String>) -> Self {
        self.names.push(pattern.into());
        self
    }

    /// Drop tests matching `pattern`.
    pub fn with_skip(mut self, pattern: impl Into<String>) -> Self {
        self.skip.push(pattern.into());
        self
    }

    /// Keep only tests carrying at least one included tag.
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.include_tags.insert(tag.into());
        self
    }

    /// Drop tests carrying `tag`.
    pub fn without_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.exclude_tags.insert(tag.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
            && self.skip.is_empty()
            && self.include_tags.is_empty()
            && self.exclude_tags.is_empty()
    }

    /// Decide whether a test takes part in the run.
    pub fn matches(&self, id: &UnitId, display_name: &str, tags: &BTreeSet<Tag>) -> bool {
        let hit = |pattern: &String| {
            id.as_str().contains(pattern.as_str()) || display_name.contains(pattern.as_str())
        };

        if !self.names.is_empty() && !self.names.iter().any(hit) {
            return false;
        }
        if self.skip.iter().any(hit) {
            return false;
        }
        if !self.include_tags.is_empty() && self.include_tags.is_disjoint(tags) {
            return false;
        }
        self.exclude_tags.is_disjoint(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tags(names: &[&str]) -> BTreeSet<Tag> {
        names.iter().map(|n| Tag::from(*n)).collect()
    }

    fn id() -> UnitId {
        UnitId::root("calculator_tests").child("division")
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = Filter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&id(), "Division works", &BTreeSet::new()));
    }

    #[rstest]
    #[case("division", true)]
    #[case("calculator_tests/", true)]
    #[case("works", true)]
    #[case("multiplication", false)]
    fn test_name_patterns(#[case] pattern: &str, #[case] expected: bool) {
        let filter = Filter::new().with_name(pattern);
        assert_eq!(filter.matches(&id(), "Division works", &BTreeSet::new()), expected);
    }

    #[test]
    fn test_skip_wins_over_name() {
        let filter = Filter::new().with_name("calculator").with_skip("division");
        assert!(!filter.matches(&id(), "division", &BTreeSet::new()));
    }

    #[rstest]
    #[case(&["formatting"], true)]
    #[case(&["formatting", "slow"], false)]
    #[case(&["is_new"], false)]
    #[case(&[], false)]
    fn test_tag_selection(#[case] test_tags: &[&str], #[case] expected: bool) {
        let filter = Filter::new().with_tag("formatting").without_tag("slow");
        assert_eq!(filter.matches(&id(), "x", &tags(test_tags)), expected);
    }
}
