//! Batch assembly: one feed's entities become one mutation.

use crate::error::Result;
use crate::feed::Feed;
use crate::graph::GraphTxn;
use crate::resolver::Resolver;
use log::{debug, info};
use serde::Serialize;

/// A feed's entities serialized as a single JSON array.
#[derive(Debug, Clone)]
pub struct MutationPayload {
    feed: Feed,
    json: String,
    entities: usize,
}

impl MutationPayload {
    /// Serializes `entities` in order.
    pub fn encode<T: Serialize>(feed: Feed, entities: &[T]) -> Result<Self> {
        Ok(MutationPayload {
            feed,
            json: serde_json::to_string(entities)?,
            entities: entities.len(),
        })
    }

    pub fn feed(&self) -> Feed {
        self.feed
    }

    pub fn as_json(&self) -> &str {
        &self.json
    }

    pub fn entities(&self) -> usize {
        self.entities
    }

    pub fn is_empty(&self) -> bool {
        self.entities == 0
    }
}

/// Submits feed batches through one open transaction and feeds the returned
/// identifier mappings into the resolver.
pub struct BatchAssembler<'a> {
    txn: &'a mut dyn GraphTxn,
    resolver: Resolver,
}

impl<'a> BatchAssembler<'a> {
    pub fn new(txn: &'a mut dyn GraphTxn) -> Self {
        BatchAssembler {
            txn,
            resolver: Resolver::new(),
        }
    }

    /// Mapping accumulated from the batches submitted so far.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Serializes and submits one feed's entities, then records the mapping.
    ///
    /// Returns the number of identifiers the database assigned. An empty batch
    /// is not sent; its feed is recorded with an empty mapping.
    pub fn submit<T: Serialize>(&mut self, feed: Feed, entities: &[T]) -> Result<usize> {
        let payload = MutationPayload::encode(feed, entities)?;

        let uids = if payload.is_empty() {
            info!("No {} to submit", feed);
            Default::default()
        } else {
            debug!(
                "Submitting {} {} ({} bytes)",
                payload.entities(),
                feed,
                payload.as_json().len()
            );
            self.txn.mutate(&payload)?
        };

        let assigned = uids.len();
        self.resolver.record(feed, uids)?;
        info!("Mutated {} {}, {} identifiers assigned", payload.entities(), feed, assigned);
        Ok(assigned)
    }

    /// Commits the transaction shared by every submitted batch.
    pub fn commit(self) -> Result<()> {
        self.txn.commit()
    }
}
