//! Product feed decoding.
//!
//! One product per line, fields separated by a tick (`'`) so that names can
//! carry commas and double quotes untouched.

use crate::error::{LoaderError, Result};
use crate::feed::{node_types, BlankNode, Feed};
use csv::{ReaderBuilder, StringRecord};
use log::warn;
use serde::Serialize;

/// Field delimiter of the product feed.
pub const PRODUCT_DELIMITER: u8 = b'\'';

/// Minimum number of fields: id, name, price.
pub const PRODUCT_MIN_FIELDS: usize = 3;

/// Product node ready for submission.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub uid: BlankNode,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(skip_serializing_if = "is_zero")]
    pub price: u64,

    #[serde(rename = "dgraph.type")]
    pub node_type: [&'static str; 1],
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// Decodes one product record from its fields. Fields past the price are ignored.
pub fn decode_product<S: AsRef<str>>(fields: &[S]) -> Result<Product> {
    if fields.len() < PRODUCT_MIN_FIELDS {
        return Err(LoaderError::malformed(
            Feed::Products,
            format!(
                "expected at least {} fields, found {}",
                PRODUCT_MIN_FIELDS,
                fields.len()
            ),
        ));
    }

    let id = fields[0].as_ref();
    let raw_price = fields[2].as_ref();
    let price = raw_price
        .parse::<u64>()
        .map_err(|_| LoaderError::InvalidNumeric {
            feed: Feed::Products,
            field: "price",
            value: raw_price.to_string(),
        })?;

    Ok(Product {
        uid: BlankNode::new(Feed::Products, id),
        id: id.to_string(),
        name: fields[1].as_ref().to_string(),
        price,
        node_type: node_types(Feed::Products),
    })
}

/// Decodes the whole product feed, skipping records that do not decode.
pub fn decode_products(payload: &[u8]) -> Result<(Vec<Product>, usize)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(PRODUCT_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(payload);

    let mut products = Vec::new();
    let mut skipped = 0;
    for (row_idx, result) in reader.records().enumerate() {
        let row_num = row_idx + 1;
        let decoded = result
            .map_err(LoaderError::from)
            .and_then(|record| decode_record(&record));
        match decoded {
            Ok(product) => products.push(product),
            Err(e) => {
                warn!("Product row {}: {}, skipping", row_num, e);
                skipped += 1;
            }
        }
    }

    Ok((products, skipped))
}

fn decode_record(record: &StringRecord) -> Result<Product> {
    let fields: Vec<&str> = record.iter().collect();
    decode_product(&fields)
}
