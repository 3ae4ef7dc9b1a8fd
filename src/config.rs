//! Engine settings

use crate::error::{ExcelError, Result};

/// Rows held in memory before the batch sink is invoked
pub const DEFAULT_BATCH_CAPACITY: usize = 500_000;

/// Tunables shared by the batch collector and the output writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Rows per batch before the flush hook fires
    pub batch_capacity: usize,
    /// Deflate level for output workbooks (0-9)
    pub compression_level: i64,
    /// Rows written between flushes of the output ZIP stream
    pub flush_interval: u32,
    /// Rows streamed between cancellation checks
    pub cancel_check_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            compression_level: 6,
            flush_interval: 1000,
            cancel_check_interval: 4096,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_capacity == 0 {
            return Err(ExcelError::Configuration(
                "batch capacity must be at least 1".to_string(),
            ));
        }
        if !(0..=9).contains(&self.compression_level) {
            return Err(ExcelError::Configuration(format!(
                "compression level {} is outside 0-9",
                self.compression_level
            )));
        }
        if self.flush_interval == 0 || self.cancel_check_interval == 0 {
            return Err(ExcelError::Configuration(
                "flush and cancel-check intervals must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`]
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    batch_capacity: Option<usize>,
    compression_level: Option<i64>,
    flush_interval: Option<u32>,
    cancel_check_interval: Option<usize>,
}

impl EngineConfigBuilder {
    pub fn batch_capacity(mut self, rows: usize) -> Self {
        self.batch_capacity = Some(rows);
        self
    }

    pub fn compression_level(mut self, level: i64) -> Self {
        self.compression_level = Some(level);
        self
    }

    pub fn flush_interval(mut self, rows: u32) -> Self {
        self.flush_interval = Some(rows);
        self
    }

    pub fn cancel_check_interval(mut self, rows: usize) -> Self {
        self.cancel_check_interval = Some(rows);
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<EngineConfig> {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            batch_capacity: self.batch_capacity.unwrap_or(defaults.batch_capacity),
            compression_level: self.compression_level.unwrap_or(defaults.compression_level),
            flush_interval: self.flush_interval.unwrap_or(defaults.flush_interval),
            cancel_check_interval: self
                .cancel_check_interval
                .unwrap_or(defaults.cancel_check_interval),
        };
        config.validate()?;
        Ok(config)
    }
}
