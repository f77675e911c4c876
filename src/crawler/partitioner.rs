//! Time-window partitioning
//!
//! A query whose result count reaches the platform cap cannot be drained in
//! full. The partitioner bisects (or n-sects) its time range depth-first until
//! every window probes under the cap, or until a window is too short to split
//! and has to be accepted as possibly truncated.

use crate::crawler::fetcher::CountProbe;
use crate::model::{Query, TimeRange, TimeWindow};
use crate::FetchError;
use std::time::Duration;

/// Splits a query's time range into windows that each fit under the platform cap
pub struct WindowPartitioner<'a, P: ?Sized> {
    probe: &'a P,
    min_granularity: Duration,
    fanout: u32,
}

impl<'a, P: CountProbe + ?Sized> WindowPartitioner<'a, P> {
    /// Creates a partitioner
    ///
    /// # Arguments
    ///
    /// * `probe` - Source of cap signals, normally the page fetcher
    /// * `min_granularity` - Capped windows this short are not split further
    /// * `fanout` - Number of sub-windows per split (at least 2)
    pub fn new(probe: &'a P, min_granularity: Duration, fanout: u32) -> Self {
        Self {
            probe,
            min_granularity,
            fanout: fanout.max(2),
        }
    }

    /// Maximum split depth for `range`
    ///
    /// The number of splits needed before a piece is no longer than the
    /// minimum granularity, i.e. `ceil(log_fanout(range / granularity))`.
    pub fn max_depth(&self, range: &TimeRange) -> u32 {
        let granularity_ms = (self.min_granularity.as_millis() as i64).max(1);
        let mut span_ms = range.duration_ms();
        let mut depth = 0;
        while span_ms > granularity_ms {
            span_ms = (span_ms + i64::from(self.fanout) - 1) / i64::from(self.fanout);
            depth += 1;
        }
        depth
    }

    /// Partitions `range` for `base`
    ///
    /// Windows are returned in chronological order; together they cover
    /// `range` exactly with no gaps or overlaps. A window that probes over
    /// the cap but cannot be split is returned with `possibly_truncated` set.
    /// A window whose probe fails is accepted unsplit with no estimate; the
    /// drain of that window reports truncation if it then hits the cap.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<TimeWindow>)` - The windows to drain
    /// * `Err(FetchError::Cancelled)` - The crawl was cancelled mid-partition
    pub async fn partition(
        &self,
        base: &Query,
        range: TimeRange,
    ) -> Result<Vec<TimeWindow>, FetchError> {
        let max_depth = self.max_depth(&range);
        let granularity_ms = self.min_granularity.as_millis() as i64;
        let mut accepted = Vec::new();
        let mut stack = vec![(range, 0u32)];

        while let Some((window, depth)) = stack.pop() {
            let probe = match self.probe.probe(&base.with_time_window(window)).await {
                Ok(probe) => probe,
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => {
                    tracing::warn!("Probe failed for window {}, accepting it unsplit: {}", window, e);
                    accepted.push(TimeWindow {
                        range: window,
                        estimated_count: None,
                        possibly_truncated: false,
                    });
                    continue;
                }
            };

            if !probe.hit_platform_cap {
                tracing::debug!(
                    "Window {} fits under the cap ({:?} records)",
                    window,
                    probe.estimated_count
                );
                accepted.push(TimeWindow {
                    range: window,
                    estimated_count: probe.estimated_count,
                    possibly_truncated: false,
                });
                continue;
            }

            let children = window.split(self.fanout);
            if window.duration_ms() <= granularity_ms || depth >= max_depth || children.len() < 2 {
                tracing::warn!(
                    "Window {} still hits the platform cap at minimum granularity; results may be truncated",
                    window
                );
                accepted.push(TimeWindow {
                    range: window,
                    estimated_count: probe.estimated_count,
                    possibly_truncated: true,
                });
                continue;
            }

            tracing::debug!(
                "Window {} hit the cap, splitting into {} at depth {}",
                window,
                children.len(),
                depth + 1
            );
            for child in children.into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }

        tracing::info!(
            "Partitioned {} into {} window(s), {} possibly truncated",
            range,
            accepted.len(),
            accepted.iter().filter(|w| w.possibly_truncated).count()
        );

        Ok(accepted)
    }
}
