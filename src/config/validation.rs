use crate::config::query::parse_day;
use crate::config::types::{ApiConfig, Config, CrawlerConfig, OutputConfig, QueryConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_query_config(&config.query)?;
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the query section
fn validate_query_config(config: &QueryConfig) -> Result<(), ConfigError> {
    let is_search = config
        .search_term
        .as_deref()
        .map_or(false, |term| !term.trim().is_empty());

    if is_search && !config.sort_mode.supports_search() {
        return Err(ConfigError::Validation(format!(
            "sort-mode '{}' is only available on the home feed",
            config.sort_mode
        )));
    }

    if !is_search && (config.start_day.is_some() || config.end_day.is_some()) {
        return Err(ConfigError::Validation(
            "start-day/end-day require a search-term".to_string(),
        ));
    }

    let start = config.start_day.as_deref().map(parse_day).transpose()?;
    let end = config.end_day.as_deref().map(parse_day).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(ConfigError::Validation(format!(
                "start-day must be before end-day, got {} .. {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            )));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.min_window_granularity_secs < 1 {
        return Err(ConfigError::Validation(
            "min-window-granularity-secs must be >= 1".to_string(),
        ));
    }

    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.effective_probe_page_size() < 1 {
        return Err(ConfigError::Validation(
            "probe-page-size must be >= 1".to_string(),
        ));
    }

    if config.platform_cap_threshold < u64::from(config.page_size) {
        return Err(ConfigError::Validation(format!(
            "platform-cap-threshold must be >= page-size ({}), got {}",
            config.page_size, config.platform_cap_threshold
        )));
    }

    if config.partition_fanout < 2 || config.partition_fanout > 16 {
        return Err(ConfigError::Validation(format!(
            "partition-fanout must be between 2 and 16, got {}",
            config.partition_fanout
        )));
    }

    if config.max_concurrent_windows < 1 || config.max_concurrent_windows > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-windows must be between 1 and 64, got {}",
            config.max_concurrent_windows
        )));
    }

    if config.rate_limiter_budget < 1 {
        return Err(ConfigError::Validation(
            "rate-limiter-budget must be >= 1".to_string(),
        ));
    }

    if config.rate_limiter_interval_ms < 1 {
        return Err(ConfigError::Validation(
            "rate-limiter-interval-ms must be >= 1".to_string(),
        ));
    }

    let spacing_ms = config.rate_limiter_interval_ms / u64::from(config.rate_limiter_budget);
    if config.max_backoff_ms < spacing_ms {
        return Err(ConfigError::Validation(format!(
            "max-backoff-ms must be >= the request spacing ({}ms), got {}ms",
            spacing_ms, config.max_backoff_ms
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    Ok(())
}

/// Validates API endpoint configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint: {}", e)))?;

    if endpoint.scheme() != "https" && endpoint.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint '{}' must use http or https",
            config.endpoint
        )));
    }

    if config.connection_field.trim().is_empty() {
        return Err(ConfigError::Validation(
            "connection-field cannot be empty".to_string(),
        ));
    }

    // Spliced into the GraphQL document, so it must be a plain field name
    let mut chars = config.connection_field.chars();
    let valid_name = chars
        .next()
        .map_or(false, |c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric());
    if !valid_name {
        return Err(ConfigError::Validation(format!(
            "connection-field '{}' is not a valid GraphQL field name",
            config.connection_field
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.records_path.is_empty() {
        return Err(ConfigError::Validation(
            "records-path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint-path cannot be empty".to_string(),
        ));
    }

    if config.records_path == config.checkpoint_path {
        return Err(ConfigError::Validation(
            "records-path and checkpoint-path must differ".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SortMode;

    fn crawler_config() -> CrawlerConfig {
        CrawlerConfig {
            min_window_granularity_secs: 3600,
            platform_cap_threshold: 1000,
            page_size: 24,
            probe_page_size: None,
            partition_fanout: 2,
            max_concurrent_windows: 1,
            rate_limiter_budget: 2,
            rate_limiter_interval_ms: 1000,
            max_backoff_ms: 60_000,
            max_retries: 3,
            request_timeout_ms: 30_000,
            abort_on_window_failure: false,
        }
    }

    fn query_config(term: Option<&str>, mode: SortMode) -> QueryConfig {
        QueryConfig {
            search_term: term.map(str::to_string),
            sort_mode: mode,
            start_day: None,
            end_day: None,
        }
    }

    #[test]
    fn test_valid_crawler_config() {
        assert!(validate_crawler_config(&crawler_config()).is_ok());
    }

    #[test]
    fn test_crawler_config_ranges() {
        let mut config = crawler_config();
        config.partition_fanout = 1;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler_config();
        config.max_concurrent_windows = 0;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler_config();
        config.platform_cap_threshold = 10;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler_config();
        config.max_backoff_ms = 100;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler_config();
        config.probe_page_size = Some(0);
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_search_sort_modes() {
        assert!(validate_query_config(&query_config(Some("cat"), SortMode::Trending)).is_ok());
        assert!(validate_query_config(&query_config(Some("cat"), SortMode::Following)).is_err());
        assert!(validate_query_config(&query_config(Some("cat"), SortMode::Recommended)).is_err());
        assert!(validate_query_config(&query_config(None, SortMode::Following)).is_ok());
    }

    #[test]
    fn test_query_dates() {
        let mut config = query_config(Some("cat"), SortMode::Latest);
        config.start_day = Some("2024-02-01".to_string());
        config.end_day = Some("2024-01-01".to_string());
        assert!(validate_query_config(&config).is_err());

        config.end_day = Some("not a day".to_string());
        assert!(matches!(
            validate_query_config(&config),
            Err(ConfigError::InvalidDate(_))
        ));

        let mut config = query_config(None, SortMode::Latest);
        config.start_day = Some("2024-01-01".to_string());
        assert!(validate_query_config(&config).is_err());
    }

    #[test]
    fn test_api_config() {
        assert!(validate_api_config(&ApiConfig::default()).is_ok());

        let mut config = ApiConfig::default();
        config.endpoint = "ftp://example.com/graphql".to_string();
        assert!(validate_api_config(&config).is_err());

        let mut config = ApiConfig::default();
        config.endpoint = "not a url".to_string();
        assert!(matches!(
            validate_api_config(&config),
            Err(ConfigError::InvalidUrl(_))
        ));

        let mut config = ApiConfig::default();
        config.connection_field = "favoriteArtworks".to_string();
        assert!(validate_api_config(&config).is_ok());

        config.connection_field = "artworks { id }".to_string();
        assert!(validate_api_config(&config).is_err());

        config.connection_field = "1artworks".to_string();
        assert!(validate_api_config(&config).is_err());
    }

    #[test]
    fn test_output_paths_must_differ() {
        let config = OutputConfig {
            records_path: "./out".to_string(),
            checkpoint_path: "./out".to_string(),
        };
        assert!(validate_output_config(&config).is_err());
    }
}
