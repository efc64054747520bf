//! History usage report and operation timing

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use super::item::{format_size, ClipboardItem};

/// Total size above which the report suggests cleanup (200MB)
pub const SIZE_WARNING_THRESHOLD: u64 = 200 * 1024 * 1024;

/// Item count above which the report suggests cleanup
pub const COUNT_WARNING_THRESHOLD: usize = 5000;

/// Operations slower than this are logged as warnings
pub const SLOW_OPERATION: Duration = Duration::from_secs(1);

/// Aggregate numbers over a history snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryReport {
    pub item_count: usize,
    pub total_size: u64,
    pub average_size: u64,
    pub largest_size: u64,
    pub favorite_count: usize,
}

impl HistoryReport {
    pub fn from_items(items: &[ClipboardItem]) -> Self {
        let total_size: u64 = items.iter().map(ClipboardItem::size).sum();
        Self {
            item_count: items.len(),
            total_size,
            average_size: if items.is_empty() {
                0
            } else {
                total_size / items.len() as u64
            },
            largest_size: items.iter().map(ClipboardItem::size).max().unwrap_or(0),
            favorite_count: items.iter().filter(|item| item.is_favorite()).count(),
        }
    }

    /// Threshold warnings, empty when usage is fine
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.total_size > SIZE_WARNING_THRESHOLD {
            warnings.push(format!(
                "History uses {}; consider clearing old items",
                format_size(self.total_size)
            ));
        }
        if self.item_count > COUNT_WARNING_THRESHOLD {
            warnings.push(format!(
                "History holds {} items; consider reducing the limit",
                self.item_count
            ));
        }
        warnings
    }
}

impl fmt::Display for HistoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Items:      {}", self.item_count)?;
        writeln!(f, "Favorites:  {}", self.favorite_count)?;
        writeln!(f, "Total size: {}", format_size(self.total_size))?;
        writeln!(f, "Average:    {}", format_size(self.average_size))?;
        write!(f, "Largest:    {}", format_size(self.largest_size))
    }
}

/// Run `operation`, logging how long it took
pub async fn measure<F, T>(name: &str, operation: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let result = operation.await;
    let elapsed = start.elapsed();

    if elapsed > SLOW_OPERATION {
        warn!("{} took {:.2}s", name, elapsed.as_secs_f64());
    } else {
        debug!("{} took {:.1}ms", name, elapsed.as_secs_f64() * 1000.0);
    }
    result
}
