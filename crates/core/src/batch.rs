//! Bounded batch writing.
//!
//! A `BatchWriter` owns a buffer of pending writes and the sink that
//! persists them. It is created for one symbol and consumed by `finish`.
//! A failed flush is logged and counted, its batch is dropped, and the
//! writer keeps accepting items.

use tracing::{debug, warn};

use crate::error::Result;

/// Result of one flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered.
    Empty,
    /// The sink accepted the batch; carries the sink's count.
    Written(usize),
    /// The sink failed; the batch was dropped.
    Failed,
}

/// Counters accumulated over a writer's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Successful flushes.
    pub flushes: usize,
    /// Items reported written by the sink.
    pub written: usize,
    /// Flushes that returned an error.
    pub failed_flushes: usize,
    /// Items lost to failed flushes.
    pub dropped: usize,
}

/// Buffer of pending writes with an explicit flush.
pub struct BatchWriter<T, F>
where
    F: FnMut(&[T]) -> Result<usize>,
{
    label: &'static str,
    capacity: usize,
    buffer: Vec<T>,
    sink: F,
    stats: BatchStats,
}

impl<T, F> BatchWriter<T, F>
where
    F: FnMut(&[T]) -> Result<usize>,
{
    /// Create a writer that flushes every `capacity` items.
    pub fn new(label: &'static str, capacity: usize, sink: F) -> Self {
        let capacity = capacity.max(1);
        Self {
            label,
            capacity,
            buffer: Vec::with_capacity(capacity),
            sink,
            stats: BatchStats::default(),
        }
    }

    /// Queue an item, flushing if the buffer is full.
    ///
    /// Returns the flush outcome when this push triggered one.
    pub fn push(&mut self, item: T) -> Option<FlushOutcome> {
        self.buffer.push(item);
        if self.buffer.len() >= self.capacity {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Write everything buffered.
    pub fn flush(&mut self) -> FlushOutcome {
        if self.buffer.is_empty() {
            return FlushOutcome::Empty;
        }
        let len = self.buffer.len();
        let outcome = match (self.sink)(&self.buffer) {
            Ok(written) => {
                self.stats.flushes += 1;
                self.stats.written += written;
                debug!(target: "batch", label = self.label, len, written, "flushed batch");
                FlushOutcome::Written(written)
            }
            Err(e) => {
                self.stats.failed_flushes += 1;
                self.stats.dropped += len;
                warn!(target: "batch", label = self.label, len, error = %e, "batch flush failed");
                FlushOutcome::Failed
            }
        };
        self.buffer.clear();
        outcome
    }

    /// Items waiting for the next flush.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Counters so far.
    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    /// Flush the remainder and release the writer.
    pub fn finish(mut self) -> (FlushOutcome, BatchStats) {
        let outcome = self.flush();
        (outcome, self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_flushes_at_capacity() {
        let mut batches: Vec<Vec<u32>> = Vec::new();
        let mut writer = BatchWriter::new("test", 3, |items: &[u32]| {
            batches.push(items.to_vec());
            Ok(items.len())
        });

        assert_eq!(writer.push(1), None);
        assert_eq!(writer.push(2), None);
        assert_eq!(writer.push(3), Some(FlushOutcome::Written(3)));
        assert!(writer.is_empty());
        assert_eq!(writer.push(4), None);

        let (outcome, stats) = writer.finish();
        assert_eq!(outcome, FlushOutcome::Written(1));
        assert_eq!(stats.flushes, 2);
        assert_eq!(stats.written, 4);
        assert_eq!(batches, vec![vec![1, 2, 3], vec![4]]);
    }

    #[test]
    fn test_failed_flush_continues() {
        let mut calls = 0;
        let mut writer = BatchWriter::new("test", 2, |items: &[u32]| {
            calls += 1;
            if calls == 1 {
                Err(Error::store("disk full"))
            } else {
                Ok(items.len())
            }
        });

        writer.push(1);
        assert_eq!(writer.push(2), Some(FlushOutcome::Failed));
        writer.push(3);
        assert_eq!(writer.push(4), Some(FlushOutcome::Written(2)));

        let (outcome, stats) = writer.finish();
        assert_eq!(outcome, FlushOutcome::Empty);
        assert_eq!(stats.failed_flushes, 1);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.written, 2);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut writer = BatchWriter::new("test", 0, |items: &[u32]| Ok(items.len()));
        assert_eq!(writer.push(7), Some(FlushOutcome::Written(1)));
    }
}
