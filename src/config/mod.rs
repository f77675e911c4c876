//! Configuration module for Gallery-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and resolving the configured query against the current time.
//!
//! # Example
//!
//! ```no_run
//! use gallery_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweep.toml")).unwrap();
//! let query = config.query.to_query(chrono::Utc::now()).unwrap();
//! println!("Crawling {}", query);
//! ```

mod parser;
mod query;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, CrawlerConfig, OutputConfig, QueryConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use query::{parse_day, DEFAULT_RANKING_SPAN_DAYS, PLATFORM_LAUNCH_DAY};
