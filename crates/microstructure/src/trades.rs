//! Trade aggregation over one bar interval.

use snapshot_core::{MarketStore, Result, TimeRange, Trade, TradeStats};

/// Reduce an interval's trades to execution statistics.
///
/// Every trade counts toward `trades_exec_count`; only trades with both
/// price and size contribute to the sums.
pub fn summarize(trades: &[Trade]) -> TradeStats {
    let mut dollar_volume = 0.0;
    let mut total_size = 0.0;
    for trade in trades {
        if let (Some(price), Some(size)) = (trade.price, trade.size) {
            dollar_volume += price * size;
            total_size += size;
        }
    }
    let count = trades.len();

    TradeStats {
        trades_exec_count: u32::try_from(count).unwrap_or(u32::MAX),
        vwap_exec: (total_size > 0.0).then(|| dollar_volume / total_size),
        dollar_volume,
        avg_trade_size: (count > 0).then(|| total_size / count as f64),
    }
}

/// Aggregates trades per interval from a store.
pub struct TradeAggregator<'a, S: MarketStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: MarketStore + ?Sized> TradeAggregator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Statistics for trades of `symbol` in `window`.
    pub fn aggregate(&self, symbol: &str, window: TimeRange) -> Result<TradeStats> {
        let trades: Vec<Trade> = self
            .store
            .trades(symbol, window)?
            .iter()
            .map(Trade::from_record)
            .collect();
        Ok(summarize(&trades))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;
    use snapshot_core::MemoryStore;

    fn trade(price: Option<f64>, size: Option<f64>) -> Trade {
        Trade { ts_ms: 0, price, size }
    }

    #[test]
    fn test_vwap_and_volume() {
        let stats = summarize(&[trade(Some(10.0), Some(100.0)), trade(Some(10.2), Some(50.0))]);
        assert_eq!(stats.trades_exec_count, 2);
        assert_relative_eq!(stats.vwap_exec.unwrap(), 10.0667, epsilon = 1e-4);
        assert_relative_eq!(stats.dollar_volume, 1010.0, epsilon = 1e-9);
        assert_relative_eq!(stats.avg_trade_size.unwrap(), 75.0);
    }

    #[test]
    fn test_incomplete_trades_count_but_do_not_sum() {
        let stats = summarize(&[
            trade(Some(10.0), Some(10.0)),
            trade(None, Some(500.0)),
            trade(Some(99.0), None),
            trade(Some(12.0), Some(10.0)),
        ]);
        assert_eq!(stats.trades_exec_count, 4);
        assert_relative_eq!(stats.dollar_volume, 220.0);
        assert_relative_eq!(stats.vwap_exec.unwrap(), 11.0);
        assert_relative_eq!(stats.avg_trade_size.unwrap(), 5.0);
    }

    #[test]
    fn test_empty_interval() {
        let stats = summarize(&[]);
        assert_eq!(stats, TradeStats::default());

        // Trades without sizes: counted, nothing to average by volume.
        let stats = summarize(&[trade(Some(1.0), None)]);
        assert_eq!(stats.trades_exec_count, 1);
        assert_eq!(stats.vwap_exec, None);
        assert_eq!(stats.avg_trade_size, Some(0.0));
    }

    #[test]
    fn test_aggregate_reads_window_only() {
        let store = MemoryStore::new();
        let docs = [
            json!({"t": 0, "p": 10.0, "s": 100}),
            json!({"t": 30_000, "price": "10.2", "size": 50}),
            json!({"t": 60_000, "Price": 11.0, "Size": 1}),
        ]
        .iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
        store.insert_trades("AAPL", docs).unwrap();

        let stats = TradeAggregator::new(&store)
            .aggregate("AAPL", TimeRange::new(0, 60_000))
            .unwrap();
        assert_eq!(stats.trades_exec_count, 2);
        assert_relative_eq!(stats.dollar_volume, 1510.0, epsilon = 1e-9);
    }
}
