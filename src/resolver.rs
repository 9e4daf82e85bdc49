//! Blank-node label to assigned identifier mapping.

use crate::error::{LoaderError, Result};
use crate::feed::{Feed, NodeRef};
use std::collections::{HashMap, HashSet};

/// Identifiers assigned by the database, keyed by blank-node label.
pub type UidMap = HashMap<String, String>;

/// Accumulated resolver mapping for one pipeline run.
///
/// Each feed's mapping is recorded exactly once, after that feed's mutation
/// returns. Lookups never modify the mapping.
#[derive(Debug, Default)]
pub struct Resolver {
    uids: UidMap,
    recorded: HashSet<Feed>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the mapping returned by `feed`'s mutation.
    pub fn record(&mut self, feed: Feed, uids: UidMap) -> Result<()> {
        if !self.recorded.insert(feed) {
            return Err(LoaderError::ResolverConflict(feed));
        }
        self.uids.extend(uids);
        Ok(())
    }

    /// Whether `feed`'s mapping has been recorded.
    pub fn has_recorded(&self, feed: Feed) -> bool {
        self.recorded.contains(&feed)
    }

    /// Looks up a blank-node label.
    pub fn lookup(&self, label: &str) -> Option<&str> {
        self.uids.get(label).map(String::as_str)
    }

    /// Resolves an external id of `feed` into an edge target, unresolved when
    /// the label is unknown.
    pub fn resolve(&self, feed: Feed, external_id: &str) -> NodeRef {
        match self.lookup(&feed.label(external_id)) {
            Some(uid) => NodeRef::resolved(uid),
            None => NodeRef::unresolved(),
        }
    }

    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uids(pairs: &[(&str, &str)]) -> UidMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_lookup_is_keyed_by_tagged_label() {
        let mut resolver = Resolver::new();
        resolver
            .record(Feed::Buyers, uids(&[("b_1", "0x5")]))
            .unwrap();

        assert_eq!(resolver.lookup("b_1"), Some("0x5"));
        assert_eq!(resolver.lookup("1"), None);
        assert_eq!(resolver.resolve(Feed::Buyers, "1"), NodeRef::resolved("0x5"));
        assert_eq!(resolver.resolve(Feed::Products, "1"), NodeRef::unresolved());
    }

    #[test]
    fn test_feeds_accumulate() {
        let mut resolver = Resolver::new();
        resolver
            .record(Feed::Buyers, uids(&[("b_1", "0x5")]))
            .unwrap();
        resolver
            .record(Feed::Products, uids(&[("p_10", "0x9")]))
            .unwrap();

        assert_eq!(resolver.len(), 2);
        assert!(resolver.has_recorded(Feed::Buyers));
        assert!(resolver.has_recorded(Feed::Products));
        assert!(!resolver.has_recorded(Feed::Transactions));
        assert_eq!(resolver.lookup("p_10"), Some("0x9"));
    }

    #[test]
    fn test_second_record_for_same_feed_is_rejected() {
        let mut resolver = Resolver::new();
        resolver
            .record(Feed::Buyers, uids(&[("b_1", "0x5")]))
            .unwrap();
        let err = resolver
            .record(Feed::Buyers, uids(&[("b_1", "0x6")]))
            .unwrap_err();

        assert!(matches!(err, LoaderError::ResolverConflict(Feed::Buyers)));
        assert_eq!(resolver.lookup("b_1"), Some("0x5"));
    }

    #[test]
    fn test_empty_mapping_still_counts_as_recorded() {
        let mut resolver = Resolver::new();
        resolver.record(Feed::Products, UidMap::new()).unwrap();
        assert!(resolver.is_empty());
        assert!(resolver.has_recorded(Feed::Products));
    }
}
