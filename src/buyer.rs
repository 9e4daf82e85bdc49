//! Buyer feed decoding.
//!
//! The buyer feed is a JSON array of objects. Each element is decoded into a
//! plain [`BuyerRecord`] and then stamped with its blank-node label.

use crate::error::{LoaderError, Result};
use crate::feed::{node_types, BlankNode, Feed};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw buyer object as it appears in the feed. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct BuyerRecord {
    pub id: String,
    pub name: String,
    pub age: i64,
}

impl BuyerRecord {
    /// Derives the graph entity from the structural record.
    pub fn into_buyer(self) -> Buyer {
        Buyer {
            uid: BlankNode::new(Feed::Buyers, &self.id),
            id: self.id,
            name: self.name,
            age: self.age,
            node_type: node_types(Feed::Buyers),
        }
    }
}

/// Buyer node ready for submission.
#[derive(Debug, Clone, Serialize)]
pub struct Buyer {
    pub uid: BlankNode,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(skip_serializing_if = "is_zero")]
    pub age: i64,

    #[serde(rename = "dgraph.type")]
    pub node_type: [&'static str; 1],
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Decodes one buyer object.
pub fn decode_buyer(value: Value) -> Result<Buyer> {
    let record: BuyerRecord = serde_json::from_value(value)
        .map_err(|e| LoaderError::malformed(Feed::Buyers, e.to_string()))?;
    Ok(record.into_buyer())
}

/// Decodes the whole buyer feed, skipping elements that do not decode.
///
/// A payload that is not a JSON array is rejected as a whole.
pub fn decode_buyers(payload: &[u8]) -> Result<(Vec<Buyer>, usize)> {
    let values: Vec<Value> =
        serde_json::from_slice(payload).map_err(|e| LoaderError::MalformedFeed {
            feed: Feed::Buyers,
            message: e.to_string(),
        })?;

    let mut buyers = Vec::with_capacity(values.len());
    let mut skipped = 0;
    for (idx, value) in values.into_iter().enumerate() {
        match decode_buyer(value) {
            Ok(buyer) => buyers.push(buyer),
            Err(e) => {
                warn!("Buyer {}: {}, skipping", idx, e);
                skipped += 1;
            }
        }
    }

    Ok((buyers, skipped))
}
