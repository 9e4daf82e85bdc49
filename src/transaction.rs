//! Transaction feed decoding and cross-reference resolution.

use crate::error::{LoaderError, Result};
use crate::feed::{node_types, BlankNode, Feed, NodeRef};
use crate::resolver::Resolver;
use crate::splitter::{normalize_record, RecordSplitter, FIELD_DELIMITER};
use log::{debug, warn};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Number of fields in a normalized transaction record:
/// id, buyer id, ip, device, product list.
pub const TRANSACTION_FIELDS: usize = 5;

/// Word characters and commas; strips the brackets and spaces the upstream
/// formatter wraps around the product list.
static PRODUCT_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_,]+").expect("valid product list pattern"));

/// Transaction node ready for submission.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub uid: BlankNode,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(rename = "buyer_id")]
    pub buyer: NodeRef,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub device: String,

    #[serde(rename = "product_ids", skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<NodeRef>,

    #[serde(rename = "dgraph.type")]
    pub node_type: [&'static str; 1],
}

impl Transaction {
    /// Number of buyer and product references left unresolved.
    pub fn unresolved_refs(&self) -> usize {
        let buyer = usize::from(!self.buyer.is_resolved());
        buyer + self.products.iter().filter(|p| !p.is_resolved()).count()
    }
}

/// Extracts the ordered product ids from the raw product-list field.
///
/// Only the first run of word characters and commas is used. Duplicates and
/// order are kept as written.
pub fn parse_product_ids(field: &str) -> Vec<&str> {
    if field.is_empty() {
        return Vec::new();
    }
    match PRODUCT_LIST.find(field) {
        Some(run) => run.as_str().split(',').collect(),
        None => Vec::new(),
    }
}

/// Decodes one normalized transaction record, resolving its buyer and
/// product references through `resolver`.
///
/// References missing from the resolver are kept as unresolved edges rather
/// than failing the record.
pub fn decode_transaction(record: &str, resolver: &Resolver) -> Result<Transaction> {
    let fields: Vec<&str> = record.split(FIELD_DELIMITER).collect();
    if fields.len() != TRANSACTION_FIELDS {
        return Err(LoaderError::malformed(
            Feed::Transactions,
            format!(
                "expected {} fields, found {}",
                TRANSACTION_FIELDS,
                fields.len()
            ),
        ));
    }

    let id = fields[0];
    let buyer_id = fields[1];

    let buyer = resolver.resolve(Feed::Buyers, buyer_id);
    if !buyer.is_resolved() {
        debug!("Transaction {}: unresolved buyer {}", id, buyer_id);
    }

    let products = parse_product_ids(fields[4])
        .into_iter()
        .map(|product_id| {
            let product = resolver.resolve(Feed::Products, product_id);
            if !product.is_resolved() {
                debug!("Transaction {}: unresolved product {}", id, product_id);
            }
            product
        })
        .collect();

    Ok(Transaction {
        uid: BlankNode::new(Feed::Transactions, id),
        id: id.to_string(),
        buyer,
        ip: fields[2].to_string(),
        device: fields[3].to_string(),
        products,
        node_type: node_types(Feed::Transactions),
    })
}

/// Decodes the whole transaction blob, skipping records that do not decode.
///
/// A trailing empty record is ignored rather than counted as skipped.
pub fn decode_transactions(blob: &[u8], resolver: &Resolver) -> (Vec<Transaction>, usize) {
    let mut transactions = Vec::new();
    let mut skipped = 0;
    let mut records = RecordSplitter::new(blob).enumerate().peekable();
    while let Some((idx, raw)) = records.next() {
        // The feed may end with a marker; the empty record after it is not data.
        if raw.is_empty() && records.peek().is_none() {
            debug!("Transaction record {}: trailing empty record", idx);
            continue;
        }
        match decode_transaction(&normalize_record(raw), resolver) {
            Ok(tx) => transactions.push(tx),
            Err(e) => {
                warn!("Transaction record {}: {}, skipping", idx, e);
                skipped += 1;
            }
        }
    }
    (transactions, skipped)
}
