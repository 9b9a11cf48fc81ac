//! NBBO resolution for one bar interval.
//!
//! Each side of the book is resolved on its own at both interval
//! boundaries by trying an ordered list of strategies. Open prefers the
//! first quote inside the window, then the nearest quote before it.
//! Close prefers the last quote inside the window, then the nearest quote
//! at or after its end, then the state left by the spread walk.
//!
//! The time-weighted spread walks quotes in ascending order. When the
//! window holds no quotes at all, the fetch is widened by a fixed slack so
//! quotes just before the window can seed the walk's state; widened quotes
//! never populate the open/close fields.

use snapshot_core::{
    mid, spread, JoinConfig, MarketStore, NbboContext, Quote, Result, TimeRange,
};
use tracing::debug;

/// One side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// This side's price on a quote, if the quote carries it.
    #[inline]
    pub fn price(self, quote: &Quote) -> Option<f64> {
        match self {
            Side::Bid => quote.bid_px,
            Side::Ask => quote.ask_px,
        }
    }
}

/// One place to look for a side's price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// First quote inside the window carrying the side.
    FirstInWindow,
    /// Last quote inside the window carrying the side.
    LastInWindow,
    /// Nearest quote strictly before the window start.
    NearestBefore,
    /// Nearest quote at or after the window end.
    NearestFrom,
    /// Bid/ask state left by the spread walk.
    Tracked,
}

impl Strategy {
    /// Resolution order at interval open.
    pub const OPEN: [Strategy; 2] = [Strategy::FirstInWindow, Strategy::NearestBefore];

    /// Resolution order at interval close.
    pub const CLOSE: [Strategy; 3] = [
        Strategy::LastInWindow,
        Strategy::NearestFrom,
        Strategy::Tracked,
    ];
}

/// Result of walking quotes across a window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpreadWalk {
    /// Time-weighted average of `ask - bid`; absent when no span had both
    /// sides known.
    pub average: Option<f64>,
    /// Bid after the last quote before the window end.
    pub bid: Option<f64>,
    /// Ask after the last quote before the window end.
    pub ask: Option<f64>,
}

/// Time-weighted average spread across `window`.
///
/// `quotes` must be ascending. State starts at (`bid`, `ask`); each quote
/// closes the span since the previous state change and then overwrites
/// only the sides it carries. Quotes before the window start take effect
/// at the start; the first quote at or after the end stops the walk.
/// A span counts only while both sides are known.
pub fn time_weighted_spread(
    quotes: &[Quote],
    window: TimeRange,
    bid: Option<f64>,
    ask: Option<f64>,
) -> SpreadWalk {
    let (mut bid, mut ask) = (bid, ask);
    let mut last = window.start;
    let mut weighted = 0.0;
    let mut elapsed_ms: i64 = 0;

    for quote in quotes {
        if quote.ts_ms >= window.end {
            break;
        }
        let at = quote.ts_ms.max(window.start);
        if let Some(s) = spread(bid, ask) {
            let dt = (at - last).max(0);
            weighted += s * dt as f64;
            elapsed_ms += dt;
        }
        last = at;
        bid = quote.bid_px.or(bid);
        ask = quote.ask_px.or(ask);
    }
    if let Some(s) = spread(bid, ask) {
        let dt = (window.end - last).max(0);
        weighted += s * dt as f64;
        elapsed_ms += dt;
    }

    SpreadWalk {
        average: (elapsed_ms > 0).then(|| weighted / elapsed_ms as f64),
        bid,
        ask,
    }
}

/// Resolves the NBBO context of bar intervals against a store.
pub struct NbboResolver<'a, S: MarketStore + ?Sized> {
    store: &'a S,
    config: JoinConfig,
}

impl<'a, S: MarketStore + ?Sized> NbboResolver<'a, S> {
    /// Create a resolver.
    pub fn new(store: &'a S, config: &JoinConfig) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }

    /// Resolve the NBBO context of `window` for `symbol`.
    ///
    /// Missing data leaves fields absent; only store read failures are
    /// returned as errors.
    pub fn resolve(&self, symbol: &str, window: TimeRange) -> Result<NbboContext> {
        let strict = self.fetch(symbol, window)?;
        let widened = if strict.is_empty() {
            let range = window.widen(self.config.quote_slack_ms);
            let quotes = self.fetch(symbol, range)?;
            debug!(symbol, start = window.start, widened = quotes.len(), "empty quote window widened");
            Some(quotes)
        } else {
            None
        };

        let mut lookup = Lookup {
            store: self.store,
            symbol,
            window,
            limit: self.config.fallback_limit,
            quotes: &strict,
            before: None,
            after: None,
            tracked: SpreadWalk::default(),
        };

        let bid_open = lookup.resolve(Side::Bid, &Strategy::OPEN)?;
        let ask_open = lookup.resolve(Side::Ask, &Strategy::OPEN)?;

        let walk_quotes = widened.as_deref().unwrap_or(&strict[..]);
        let walk = time_weighted_spread(walk_quotes, window, bid_open, ask_open);
        lookup.tracked = walk;

        let bid_close = lookup.resolve(Side::Bid, &Strategy::CLOSE)?;
        let ask_close = lookup.resolve(Side::Ask, &Strategy::CLOSE)?;

        Ok(NbboContext {
            bid_open,
            ask_open,
            bid_close,
            ask_close,
            mid_open: mid(bid_open, ask_open),
            mid_close: mid(bid_close, ask_close),
            spread_open: spread(bid_open, ask_open),
            spread_close: spread(bid_close, ask_close),
            spread_avg: walk.average,
            quote_count: u32::try_from(strict.len()).unwrap_or(u32::MAX),
        })
    }

    fn fetch(&self, symbol: &str, range: TimeRange) -> Result<Vec<Quote>> {
        Ok(self
            .store
            .quotes(symbol, range)?
            .iter()
            .map(Quote::from_record)
            .collect())
    }
}

/// Strategy interpreter for one interval. Neighbour quotes are fetched
/// at most once, and only if a strategy needs them.
struct Lookup<'q, S: MarketStore + ?Sized> {
    store: &'q S,
    symbol: &'q str,
    window: TimeRange,
    limit: usize,
    quotes: &'q [Quote],
    before: Option<Vec<Quote>>,
    after: Option<Vec<Quote>>,
    tracked: SpreadWalk,
}

impl<S: MarketStore + ?Sized> Lookup<'_, S> {
    fn resolve(&mut self, side: Side, strategies: &[Strategy]) -> Result<Option<f64>> {
        for &strategy in strategies {
            if let Some(px) = self.attempt(side, strategy)? {
                return Ok(Some(px));
            }
        }
        Ok(None)
    }

    fn attempt(&mut self, side: Side, strategy: Strategy) -> Result<Option<f64>> {
        let px = match strategy {
            Strategy::FirstInWindow => self.quotes.iter().find_map(|q| side.price(q)),
            Strategy::LastInWindow => self.quotes.iter().rev().find_map(|q| side.price(q)),
            Strategy::NearestBefore => self.before()?.iter().find_map(|q| side.price(q)),
            Strategy::NearestFrom => self.after()?.iter().find_map(|q| side.price(q)),
            Strategy::Tracked => match side {
                Side::Bid => self.tracked.bid,
                Side::Ask => self.tracked.ask,
            },
        };
        Ok(px)
    }

    fn before(&mut self) -> Result<&[Quote]> {
        if self.before.is_none() {
            let records = self
                .store
                .quotes_before(self.symbol, self.window.start, self.limit)?;
            self.before = Some(records.iter().map(Quote::from_record).collect());
        }
        Ok(self.before.as_deref().unwrap_or_default())
    }

    fn after(&mut self) -> Result<&[Quote]> {
        if self.after.is_none() {
            let records = self
                .store
                .quotes_from(self.symbol, self.window.end, self.limit)?;
            self.after = Some(records.iter().map(Quote::from_record).collect());
        }
        Ok(self.after.as_deref().unwrap_or_default())
    }
}
