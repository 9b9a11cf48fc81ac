//! In-memory store.
//!
//! Backs unit tests and embedders that keep everything in process.
//! Collections are ordered maps behind one mutex.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::normalizer;
use crate::store::MarketStore;
use crate::types::{
    BarUpdate, Document, Record, Snapshot, SymbolRecord, TimeRange, TimestampMs,
};

type Key = (String, TimestampMs);

#[derive(Default)]
struct Collections {
    symbols: BTreeMap<String, Option<TimestampMs>>,
    bars: BTreeMap<Key, Document>,
    /// Quotes and trades may share a timestamp, so each key holds a list
    /// in arrival order.
    quotes: BTreeMap<Key, Vec<Document>>,
    trades: BTreeMap<Key, Vec<Document>>,
    snapshots: BTreeMap<Key, Snapshot>,
}

/// Store that keeps every collection in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>> {
        self.inner
            .lock()
            .map_err(|_| Error::store("memory store lock poisoned"))
    }
}

fn key_range(symbol: &str, range: TimeRange) -> std::ops::Range<Key> {
    (symbol.to_string(), range.start)..(symbol.to_string(), range.end)
}

fn records<'a>(
    symbol: &str,
    entries: impl Iterator<Item = (&'a Key, &'a Vec<Document>)>,
) -> Vec<Record> {
    entries
        .flat_map(|((_, ts), docs)| {
            docs.iter().map(move |doc| Record {
                symbol: symbol.to_string(),
                ts_ms: *ts,
                doc: doc.clone(),
            })
        })
        .collect()
}

fn append(
    map: &mut BTreeMap<Key, Vec<Document>>,
    symbol: &str,
    docs: Vec<Document>,
) -> usize {
    let mut inserted = 0;
    for doc in docs {
        if let Some(ts) = normalizer::timestamp(&doc) {
            map.entry((symbol.to_string(), ts)).or_default().push(doc);
            inserted += 1;
        }
    }
    inserted
}

impl MarketStore for MemoryStore {
    fn symbols(&self) -> Result<Vec<SymbolRecord>> {
        Ok(self
            .lock()?
            .symbols
            .iter()
            .map(|(symbol, watermark)| SymbolRecord {
                symbol: symbol.clone(),
                watermark: *watermark,
            })
            .collect())
    }

    fn register_symbol(&self, symbol: &str) -> Result<()> {
        self.lock()?.symbols.entry(symbol.to_string()).or_insert(None);
        Ok(())
    }

    fn set_watermark(&self, symbol: &str, ts_ms: TimestampMs) -> Result<()> {
        self.lock()?.symbols.insert(symbol.to_string(), Some(ts_ms));
        Ok(())
    }

    fn bars(&self, symbol: &str, range: TimeRange) -> Result<Vec<Record>> {
        if range.start >= range.end {
            return Ok(Vec::new());
        }
        Ok(self
            .lock()?
            .bars
            .range(key_range(symbol, range))
            .map(|((_, ts), doc)| Record {
                symbol: symbol.to_string(),
                ts_ms: *ts,
                doc: doc.clone(),
            })
            .collect())
    }

    fn quotes(&self, symbol: &str, range: TimeRange) -> Result<Vec<Record>> {
        if range.start >= range.end {
            return Ok(Vec::new());
        }
        let inner = self.lock()?;
        Ok(records(symbol, inner.quotes.range(key_range(symbol, range))))
    }

    fn quotes_before(
        &self,
        symbol: &str,
        ts_ms: TimestampMs,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let inner = self.lock()?;
        let entries = inner
            .quotes
            .range((symbol.to_string(), TimestampMs::MIN)..(symbol.to_string(), ts_ms))
            .rev();
        let mut out = Vec::new();
        for ((_, ts), docs) in entries {
            // Nearest first, so later arrivals at the same instant come first.
            for doc in docs.iter().rev() {
                if out.len() >= limit {
                    return Ok(out);
                }
                out.push(Record {
                    symbol: symbol.to_string(),
                    ts_ms: *ts,
                    doc: doc.clone(),
                });
            }
        }
        Ok(out)
    }

    fn quotes_from(&self, symbol: &str, ts_ms: TimestampMs, limit: usize) -> Result<Vec<Record>> {
        let inner = self.lock()?;
        let mut out = records(
            symbol,
            inner
                .quotes
                .range((symbol.to_string(), ts_ms)..=(symbol.to_string(), TimestampMs::MAX)),
        );
        out.truncate(limit);
        Ok(out)
    }

    fn trades(&self, symbol: &str, range: TimeRange) -> Result<Vec<Record>> {
        if range.start >= range.end {
            return Ok(Vec::new());
        }
        let inner = self.lock()?;
        Ok(records(symbol, inner.trades.range(key_range(symbol, range))))
    }

    fn snapshots(&self, symbol: &str, limit: Option<usize>) -> Result<Vec<Snapshot>> {
        let inner = self.lock()?;
        let iter = inner
            .snapshots
            .range((symbol.to_string(), TimestampMs::MIN)..=(symbol.to_string(), TimestampMs::MAX))
            .map(|(_, snapshot)| snapshot.clone());
        Ok(match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }

    fn insert_bars(&self, symbol: &str, docs: Vec<Document>) -> Result<usize> {
        let mut inner = self.lock()?;
        let mut inserted = 0;
        for doc in docs {
            if let Some(ts) = normalizer::timestamp(&doc) {
                inner.bars.insert((symbol.to_string(), ts), doc);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn insert_quotes(&self, symbol: &str, docs: Vec<Document>) -> Result<usize> {
        Ok(append(&mut self.lock()?.quotes, symbol, docs))
    }

    fn insert_trades(&self, symbol: &str, docs: Vec<Document>) -> Result<usize> {
        Ok(append(&mut self.lock()?.trades, symbol, docs))
    }

    fn update_bars(&self, updates: &[BarUpdate]) -> Result<usize> {
        let mut inner = self.lock()?;
        let mut matched = 0;
        for update in updates {
            if let Some(doc) = inner.bars.get_mut(&(update.symbol.clone(), update.ts_ms)) {
                update.values.apply_to(doc);
                matched += 1;
            }
        }
        Ok(matched)
    }

    fn upsert_snapshots(&self, snapshots: &[Snapshot]) -> Result<usize> {
        let mut inner = self.lock()?;
        for snapshot in snapshots {
            let key = (snapshot.symbol.clone(), snapshot.ts_ms());
            match inner.snapshots.get(&key) {
                // Last write wins by receipt time.
                Some(existing) if existing.received_at > snapshot.received_at => {}
                _ => {
                    inner.snapshots.insert(key, snapshot.clone());
                }
            }
        }
        Ok(snapshots.len())
    }
}
