//! Bounded row batching over a streamed sheet
//!
//! [`RowBatchCollector`] appends body rows to an in-memory batch and hands the
//! batch to a [`BatchSink`] whenever it fills up, so peak memory is bounded by
//! the batch capacity rather than by the sheet size. What the sink does with a
//! batch is up to the sink: [`MemorySink`] keeps everything, a sink backed by
//! a file or database can persist and drop it.

use crate::config::EngineConfig;
use crate::error::{ExcelError, Result};
use crate::progress::CancelToken;
use crate::reader::ExcelReader;
use crate::types::RowRecord;
use tracing::{debug, trace};

/// Receiver of full (or final, partial) batches
pub trait BatchSink {
    /// Take ownership of one batch of rows
    fn flush(&mut self, batch: Vec<RowRecord>) -> Result<()>;

    /// Drop any state accumulated for the previous sheet
    fn reset(&mut self) {}
}

impl<F> BatchSink for F
where
    F: FnMut(Vec<RowRecord>) -> Result<()>,
{
    fn flush(&mut self, batch: Vec<RowRecord>) -> Result<()> {
        self(batch)
    }
}

/// Sink that accumulates every batch into one in-memory list
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Vec<RowRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[RowRecord] {
        &self.rows
    }

    /// Move the accumulated rows out, leaving the sink empty
    pub fn take(&mut self) -> Vec<RowRecord> {
        std::mem::take(&mut self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl BatchSink for MemorySink {
    fn flush(&mut self, batch: Vec<RowRecord>) -> Result<()> {
        if self.rows.is_empty() {
            self.rows = batch;
        } else {
            self.rows.extend(batch);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.rows = Vec::new();
    }
}

/// Streams sheet bodies into bounded batches
pub struct RowBatchCollector<S: BatchSink> {
    sink: S,
    batch: Vec<RowRecord>,
    capacity: usize,
    cancel_check_interval: usize,
    rows_collected: u64,
    flush_count: usize,
}

impl<S: BatchSink> RowBatchCollector<S> {
    /// Create a collector with the given batch capacity
    pub fn new(sink: S, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ExcelError::Configuration(
                "batch capacity must be at least 1".to_string(),
            ));
        }

        Ok(RowBatchCollector {
            sink,
            batch: Vec::with_capacity(capacity.min(4096)),
            capacity,
            cancel_check_interval: EngineConfig::default().cancel_check_interval,
            rows_collected: 0,
            flush_count: 0,
        })
    }

    /// Create a collector sized from engine settings
    pub fn with_config(sink: S, config: &EngineConfig) -> Result<Self> {
        let mut collector = Self::new(sink, config.batch_capacity)?;
        collector.cancel_check_interval = config.cancel_check_interval.max(1);
        Ok(collector)
    }

    /// Append one row, flushing if the batch is now full
    pub fn push(&mut self, row: RowRecord) -> Result<()> {
        self.batch.push(row);
        self.rows_collected += 1;
        if self.batch.len() >= self.capacity {
            self.flush_batch()?;
        }
        Ok(())
    }

    /// Hand the remaining partial batch (if any) to the sink
    pub fn finish(&mut self) -> Result<()> {
        if !self.batch.is_empty() {
            self.flush_batch()?;
        }
        Ok(())
    }

    /// Stream every body row of `sheet` (the header row is skipped) into the sink.
    ///
    /// Returns the number of body rows collected.
    pub fn collect_sheet(
        &mut self,
        reader: &mut ExcelReader,
        sheet: &str,
        cancel: &CancelToken,
    ) -> Result<u64> {
        let start = self.rows_collected;

        for (position, row) in reader.rows(sheet)?.enumerate() {
            let row = row?;
            if position == 0 {
                continue;
            }
            if position % self.cancel_check_interval == 0 {
                cancel.check()?;
            }
            self.push(row)?;
        }
        self.finish()?;

        let collected = self.rows_collected - start;
        debug!(sheet, rows = collected, flushes = self.flush_count, "sheet collected");
        Ok(collected)
    }

    /// Reset batch, counters and sink so the collector can take the next sheet
    pub fn clear(&mut self) {
        self.batch.clear();
        self.rows_collected = 0;
        self.flush_count = 0;
        self.sink.reset();
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rows currently buffered and not yet flushed
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Rows pushed since the last `clear`
    pub fn rows_collected(&self) -> u64 {
        self.rows_collected
    }

    /// Times the sink was invoked since the last `clear`
    pub fn flush_count(&self) -> usize {
        self.flush_count
    }

    fn flush_batch(&mut self) -> Result<()> {
        let fresh = Vec::with_capacity(self.capacity.min(4096));
        let batch = std::mem::replace(&mut self.batch, fresh);
        trace!(rows = batch.len(), "flushing batch");
        self.flush_count += 1;
        self.sink.flush(batch)
    }
}
