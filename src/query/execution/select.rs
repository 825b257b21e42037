//! Select stage: one remote query

use std::time::Instant;
use tracing::debug;

use super::result::TimeSeriesResult;
use crate::kairos::{MetricsQuery, QueryClient};
use crate::query::error::MqlResult;

/// Issue exactly one backend call for `query`
pub(crate) async fn fetch(client: &dyn QueryClient, query: &MetricsQuery) -> MqlResult<TimeSeriesResult> {
    let started = Instant::now();
    let response = client.query_metrics(query).await?;

    debug!(
        metrics = query.metrics.len(),
        queries = response.queries.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Select stage fetched"
    );

    Ok(TimeSeriesResult::new(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kairos::testing::RecordingClient;
    use crate::kairos::Metric;
    use crate::query::error::MqlError;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn query_for(metric: &str) -> MetricsQuery {
        MetricsQuery::new(
            Utc.timestamp_millis_opt(0).unwrap(),
            Utc.timestamp_millis_opt(10_000).unwrap(),
            vec![Metric::new(metric)],
        )
    }

    #[tokio::test]
    async fn test_fetch_maps_response() {
        let client = RecordingClient::new().with_series("cpu", vec![(1_000, json!(1.5))]);

        let result = fetch(&client, &query_for("cpu")).await.unwrap();

        assert_eq!(client.call_count(), 1);
        assert_eq!(client.calls()[0], query_for("cpu"));
        assert_eq!(result.response().data_points().count(), 1);
        assert_eq!(result.response().queries[0].results[0].name(), Some("cpu"));
    }

    #[tokio::test]
    async fn test_fetch_propagates_remote_error() {
        let client = RecordingClient::new().failing("cpu");

        let err = fetch(&client, &query_for("cpu")).await.unwrap_err();
        assert!(matches!(err, MqlError::Remote(_)));
    }
}
