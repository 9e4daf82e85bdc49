//! # Feed Loader
//!
//! Loads buyer, product and transaction feeds into a graph database as three
//! mutations inside one transaction.
//!
//! ## Design Principles
//!
//! - **Ordered stages**: buyers, then products, then transactions, so every
//!   transaction edge can point at an identifier assigned earlier in the run
//! - **Blank-node labels**: entities are submitted as `_:b_<id>`, `_:p_<id>`
//!   and `_:t_<id>`; the returned mapping is keyed by the bare label
//! - **Skip, don't stop**: a record with the wrong shape is logged and dropped;
//!   transport and database failures end the run uncommitted
//! - **Best-effort edges**: a reference with no assigned identifier is still
//!   submitted, as an empty edge target
//!
//! ## Example
//!
//! ```no_run
//! use feed_loader::{pipeline, DirFeedSource, PipelineContext, RecordingTxn};
//!
//! let source = DirFeedSource::new("feeds/");
//! let mut txn = RecordingTxn::new();
//! let summary = pipeline::run(PipelineContext {
//!     source: &source,
//!     txn: &mut txn,
//!     date: 1_603_238_400,
//! })
//! .unwrap();
//! summary.write_report(std::io::stdout()).unwrap();
//! ```

pub mod batch;
pub mod buyer;
pub mod error;
pub mod feed;
pub mod graph;
pub mod pipeline;
pub mod product;
pub mod resolver;
pub mod source;
pub mod splitter;
pub mod transaction;

pub use batch::{BatchAssembler, MutationPayload};
pub use buyer::{decode_buyer, decode_buyers, Buyer, BuyerRecord};
pub use error::{LoaderError, Result};
pub use feed::{BlankNode, Feed, NodeRef};
pub use graph::{DgraphClient, DgraphTxn, GraphTxn, RecordingTxn, SCHEMA};
pub use pipeline::{FeedSummary, PipelineContext, RunSummary};
pub use product::{decode_product, decode_products, Product};
pub use resolver::{Resolver, UidMap};
pub use source::{feed_timestamp, DirFeedSource, DEFAULT_TIMEOUT, FeedSource, HttpFeedSource};
pub use splitter::{normalize_record, RecordSplitter};
pub use transaction::{decode_transaction, decode_transactions, Transaction};
