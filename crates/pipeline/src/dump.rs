//! Stored document printer.
//!
//! Writes bars or snapshots as one JSON object per line, optionally
//! filtered to a single symbol.

use std::io::Write;

use clap::ValueEnum;
use serde_json::Value;
use snapshot_core::store::full_history;
use snapshot_core::{MarketStore, Result};

/// Collections the printer can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Collection {
    Bars,
    Snapshots,
}

/// Print up to `limit` documents, symbol by symbol in registry order.
///
/// The symbol filter is matched upper-cased. Returns the number of lines
/// written.
pub fn dump<S, W>(
    store: &S,
    collection: Collection,
    symbol: Option<&str>,
    limit: Option<usize>,
    out: &mut W,
) -> Result<usize>
where
    S: MarketStore + ?Sized,
    W: Write,
{
    let symbols = match symbol {
        Some(s) => vec![s.to_uppercase()],
        None => store.symbols()?.into_iter().map(|r| r.symbol).collect(),
    };
    let mut remaining = limit.unwrap_or(usize::MAX);
    let mut printed = 0;

    for symbol in &symbols {
        if remaining == 0 {
            break;
        }
        let docs: Vec<Value> = match collection {
            Collection::Bars => store
                .bars(symbol, full_history())?
                .into_iter()
                .take(remaining)
                .map(|record| {
                    let mut doc = record.doc;
                    doc.entry("symbol")
                        .or_insert_with(|| Value::String(record.symbol.clone()));
                    Value::Object(doc)
                })
                .collect(),
            Collection::Snapshots => store
                .snapshots(symbol, Some(remaining))?
                .iter()
                .map(|snapshot| snapshot.to_document().map(Value::Object))
                .collect::<Result<_>>()?,
        };
        for doc in &docs {
            serde_json::to_writer(&mut *out, doc)?;
            writeln!(out)?;
        }
        remaining -= docs.len();
        printed += docs.len();
    }
    Ok(printed)
}
