//! Turning the `[query]` section into a crawlable [`Query`]

use crate::config::types::QueryConfig;
use crate::model::{Query, SortMode, TimeRange};
use crate::ConfigError;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

/// First day the platform has any content for
pub const PLATFORM_LAUNCH_DAY: &str = "2022-01-01";

/// Span crawled by a daily-ranking search when no dates are given
pub const DEFAULT_RANKING_SPAN_DAYS: i64 = 7;

/// Parses a `YYYY-MM-DD` day into midnight UTC
pub fn parse_day(day: &str) -> Result<DateTime<Utc>, ConfigError> {
    let date = NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d")
        .map_err(|_| ConfigError::InvalidDate(day.to_string()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ConfigError::InvalidDate(day.to_string()))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

impl QueryConfig {
    /// Resolves the configured query against the current time
    ///
    /// Missing day bounds are filled in the way the gallery site itself
    /// does: an open start begins at platform launch, an open end stops at
    /// `now`, and a daily-ranking search without dates covers the last week.
    ///
    /// # Arguments
    ///
    /// * `now` - Instant used for open-ended windows
    ///
    /// # Returns
    ///
    /// * `Ok(Query)` - The immutable query to crawl
    /// * `Err(ConfigError)` - Dates are malformed, inverted, or not allowed for this feed
    pub fn to_query(&self, now: DateTime<Utc>) -> Result<Query, ConfigError> {
        let query = Query::new(self.search_term.clone(), self.sort_mode);

        let window = match (&self.start_day, &self.end_day) {
            (None, None) => {
                if query.is_search() && self.sort_mode == SortMode::DailyRanking {
                    Some((now - Duration::days(DEFAULT_RANKING_SPAN_DAYS), now))
                } else {
                    None
                }
            }
            (start, end) => {
                let start = parse_day(start.as_deref().unwrap_or(PLATFORM_LAUNCH_DAY))?;
                let end = match end {
                    Some(day) => parse_day(day)?,
                    None => now,
                };
                Some((start, end))
            }
        };

        let Some((start, end)) = window else {
            return Ok(query);
        };

        if !query.is_search() {
            return Err(ConfigError::Validation(
                "start-day/end-day require a search-term; the home feed cannot be filtered by date"
                    .to_string(),
            ));
        }

        let range = TimeRange::new(start, end).ok_or_else(|| {
            ConfigError::Validation(format!(
                "start-day must be before end-day, got {} .. {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ))
        })?;

        Ok(query.with_time_window(range))
    }
}
