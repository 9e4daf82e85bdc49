//! The three raw feeds and the node labelling scheme they share.

use serde::{Serialize, Serializer};
use std::fmt;

/// One of the three raw external inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    Buyers,
    Products,
    Transactions,
}

impl Feed {
    /// Load order. Transactions depend on the mappings of the other two.
    pub const ALL: [Feed; 3] = [Feed::Buyers, Feed::Products, Feed::Transactions];

    /// Path segment of the feed endpoint.
    pub fn endpoint(self) -> &'static str {
        match self {
            Feed::Buyers => "buyers",
            Feed::Products => "products",
            Feed::Transactions => "transactions",
        }
    }

    /// File name used by directory sources.
    pub fn file_name(self) -> &'static str {
        match self {
            Feed::Buyers => "buyers.json",
            Feed::Products => "products.txt",
            Feed::Transactions => "transactions.bin",
        }
    }

    /// Tag prepended to external ids to form blank-node labels.
    pub fn tag(self) -> &'static str {
        match self {
            Feed::Buyers => "b",
            Feed::Products => "p",
            Feed::Transactions => "t",
        }
    }

    /// Node type name stamped into `dgraph.type`.
    pub fn node_type(self) -> &'static str {
        match self {
            Feed::Buyers => "Buyer",
            Feed::Products => "Product",
            Feed::Transactions => "Transaction",
        }
    }

    /// Blank-node label for an external id of this feed, e.g. `b_42`.
    pub fn label(self, external_id: &str) -> String {
        format!("{}_{}", self.tag(), external_id)
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Client-chosen temporary label submitted with a mutation.
///
/// Serialized as `_:<label>`; the database answers with a mapping keyed by
/// the bare label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlankNode(String);

impl BlankNode {
    pub fn new(feed: Feed, external_id: &str) -> Self {
        BlankNode(feed.label(external_id))
    }

    /// The bare label, as it appears in the mutation response.
    pub fn label(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.0)
    }
}

impl Serialize for BlankNode {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Edge target pointing at a node created by an earlier mutation.
///
/// An unresolved reference carries no uid and serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl NodeRef {
    pub fn resolved(uid: impl Into<String>) -> Self {
        NodeRef {
            uid: Some(uid.into()),
        }
    }

    pub fn unresolved() -> Self {
        NodeRef { uid: None }
    }

    pub fn is_resolved(&self) -> bool {
        self.uid.is_some()
    }
}

/// `dgraph.type` value for a feed's entities.
pub(crate) fn node_types(feed: Feed) -> [&'static str; 1] {
    [feed.node_type()]
}
