use chrono::Utc;

use crate::config::QueryConfig;
use crate::error::GatewayError;
use crate::repository::TelemetryRepository;

/// A maximal contiguous subsequence of stored timestamps where consecutive
/// entries are closer together than the minimum-downtime threshold.
#[derive(Debug, PartialEq, Eq)]
struct Run {
    first: i64,
    last: i64,
    len: usize,
}

impl Run {
    fn span(&self) -> i64 {
        self.last - self.first
    }
}

/// Splits ascending timestamps into active runs: a new run starts whenever
/// the gap between consecutive timestamps reaches or exceeds `min_gap`.
fn split_runs(timestamps: &[i64], min_gap: i64) -> Vec<Run> {
    let mut runs = Vec::new();
    let Some(&first) = timestamps.first() else {
        return runs;
    };

    let mut current = Run {
        first,
        last: first,
        len: 1,
    };
    for pair in timestamps.windows(2) {
        let (previous, next) = (pair[0], pair[1]);
        if next - previous < min_gap {
            current.last = next;
            current.len += 1;
        } else {
            runs.push(current);
            current = Run {
                first: next,
                last: next,
                len: 1,
            };
        }
    }
    runs.push(current);
    runs
}

/// Sizes bounded queries over sparse, bursty telemetry.
///
/// Rows are recorded only while current flows, so a series is "chunked":
/// bursts of activity separated by long idle gaps. Answering "the last H
/// hours of active usage" with a plain row LIMIT or a wall-clock cutoff is
/// wrong; instead this walks backward batch by batch, accumulating only the
/// span of each active run toward the target duration while counting the
/// rows that required. The resulting count is the LIMIT for the actual
/// analytical query.
pub struct WindowedQueryEngine {
    telemetry: TelemetryRepository,
    min_gap: i64,
    batch_size: i64,
}

impl WindowedQueryEngine {
    pub fn new(telemetry: TelemetryRepository, config: &QueryConfig) -> Self {
        Self {
            telemetry,
            min_gap: config.min_gap_secs,
            batch_size: config.batch_size,
        }
    }

    /// How many most-recent rows cover `hours` of active time, counted back
    /// from now.
    pub async fn row_count_for_duration(
        &self,
        device_id: &str,
        hours: f64,
    ) -> Result<i64, GatewayError> {
        self.row_count_from(device_id, Utc::now().timestamp(), hours)
            .await
    }

    /// As `row_count_for_duration`, counted back from an explicit cursor.
    pub async fn row_count_from(
        &self,
        device_id: &str,
        cursor: i64,
        hours: f64,
    ) -> Result<i64, GatewayError> {
        let target = (hours * 3600.0).round() as i64;
        let mut cursor = cursor;
        let mut cumulative: i64 = 0;
        let mut count: i64 = 1; // at least one row is always needed

        // progressively fetch timestamp pages until the target is covered
        while cumulative < target {
            let mut timestamps = self
                .telemetry
                .timestamps_at_or_before(device_id, cursor, self.batch_size)
                .await?;
            if timestamps.is_empty() {
                break;
            }
            timestamps.reverse(); // oldest-to-newest

            let runs = split_runs(&timestamps, self.min_gap);
            for run in runs.iter().rev() {
                cumulative += run.span();
                count += run.len as i64;
                if cumulative >= target {
                    break; // no need to walk older runs or fetch further
                }
            }

            cursor = timestamps[0];
            // the oldest row of this page is re-fetched as the newest row of
            // the next (timestamp <= cursor), so it must not count twice
            count -= 1;
            if (timestamps.len() as i64) < self.batch_size {
                break; // no more data in the series
            }
        }

        Ok(count)
    }
}
