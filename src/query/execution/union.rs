//! Union aggregation: concatenate dependency results in declared order

use std::sync::Arc;

use super::result::TimeSeriesResult;

/// Combine `results`, which must already be in declared dependency order.
/// Nothing is deduplicated or reordered.
pub(crate) fn combine(results: &[Arc<TimeSeriesResult>]) -> TimeSeriesResult {
    TimeSeriesResult::concat(results.iter().map(|result| &**result))
}
