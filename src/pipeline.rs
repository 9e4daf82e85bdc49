//! The load run: buyers, then products, then transactions, then commit.
//!
//! Every stage blocks until its mutation returns. A record that fails to
//! decode is skipped; any other failure stops the run with the transaction
//! left uncommitted.

use crate::batch::BatchAssembler;
use crate::buyer::decode_buyers;
use crate::error::Result;
use crate::feed::Feed;
use crate::graph::GraphTxn;
use crate::product::decode_products;
use crate::source::FeedSource;
use crate::transaction::decode_transactions;
use log::{info, warn};
use std::fmt;
use std::io::Write;

/// Everything one run needs, scoped to that run.
pub struct PipelineContext<'a> {
    pub source: &'a dyn FeedSource,
    pub txn: &'a mut dyn GraphTxn,
    /// Feed snapshot time, unix seconds.
    pub date: i64,
}

/// Outcome of one feed stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub decoded: usize,
    pub skipped: usize,
    pub assigned: usize,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub buyers: FeedSummary,
    pub products: FeedSummary,
    pub transactions: FeedSummary,
    /// Buyer and product references that had no identifier at decode time.
    pub unresolved_refs: usize,
}

impl RunSummary {
    pub fn feed(&self, feed: Feed) -> &FeedSummary {
        match feed {
            Feed::Buyers => &self.buyers,
            Feed::Products => &self.products,
            Feed::Transactions => &self.transactions,
        }
    }

    /// Writes one line per feed plus the unresolved reference count.
    pub fn write_report<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for feed in Feed::ALL {
            writeln!(writer, "{}", FeedLine(feed, self.feed(feed)))?;
        }
        writeln!(writer, "unresolved_refs={}", self.unresolved_refs)
    }
}

struct FeedLine<'a>(Feed, &'a FeedSummary);

impl fmt::Display for FeedLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} decoded={} skipped={} assigned={}",
            self.0, self.1.decoded, self.1.skipped, self.1.assigned
        )
    }
}

/// Runs the three stages and commits.
pub fn run(ctx: PipelineContext<'_>) -> Result<RunSummary> {
    let PipelineContext { source, txn, date } = ctx;
    let mut assembler = BatchAssembler::new(txn);
    let mut summary = RunSummary::default();

    info!("Loading buyers");
    let raw = source.fetch(Feed::Buyers, date)?;
    let (buyers, skipped) = decode_buyers(&raw)?;
    summary.buyers = FeedSummary {
        decoded: buyers.len(),
        skipped,
        assigned: assembler.submit(Feed::Buyers, &buyers)?,
    };

    info!("Loading products");
    let raw = source.fetch(Feed::Products, date)?;
    let (products, skipped) = decode_products(&raw)?;
    summary.products = FeedSummary {
        decoded: products.len(),
        skipped,
        assigned: assembler.submit(Feed::Products, &products)?,
    };

    info!("Loading transactions");
    let raw = source.fetch(Feed::Transactions, date)?;
    let (transactions, skipped) = decode_transactions(&raw, assembler.resolver());
    summary.unresolved_refs = transactions.iter().map(|t| t.unresolved_refs()).sum();
    if summary.unresolved_refs > 0 {
        warn!(
            "{} transaction references could not be resolved",
            summary.unresolved_refs
        );
    }
    summary.transactions = FeedSummary {
        decoded: transactions.len(),
        skipped,
        assigned: assembler.submit(Feed::Transactions, &transactions)?,
    };

    assembler.commit()?;
    info!("Load committed");
    Ok(summary)
}
