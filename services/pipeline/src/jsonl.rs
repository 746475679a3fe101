//! JSON-lines price history, one [`PriceHistoryRow`] per line

use anyhow::{Context, Result};
use async_trait::async_trait;
use resampler::{PriceHistoryRow, PriceHistorySource};
use std::path::Path;
use tracing::info;

#[derive(Debug)]
pub struct JsonlHistory {
    /// Sorted by timestamp
    rows: Vec<PriceHistoryRow>,
}

impl JsonlHistory {
    pub async fn open(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read price history {}", path.display()))?;
        let history = Self::parse(&contents).with_context(|| format!("in {}", path.display()))?;
        info!(path = %path.display(), rows = history.rows.len(), "price history loaded");
        Ok(history)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut rows = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let row: PriceHistoryRow =
                serde_json::from_str(line).with_context(|| format!("malformed row on line {}", number + 1))?;
            rows.push(row);
        }
        rows.sort_by_key(|row| row.timestamp);
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.rows.first().map(|row| row.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.rows.last().map(|row| row.timestamp)
    }
}

#[async_trait]
impl PriceHistorySource for JsonlHistory {
    async fn rows(&self, from: i64, to: i64) -> Result<Vec<PriceHistoryRow>> {
        let start = self.rows.partition_point(|row| row.timestamp < from);
        let end = self.rows.partition_point(|row| row.timestamp < to);
        Ok(self.rows[start..end.max(start)].to_vec())
    }
}
