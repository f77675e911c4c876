//! Output module for emitted records and crawl reports
//!
//! This module handles:
//! - The `Sink` interface records and checkpoints flow through
//! - A JSON Lines sink with a SQLite checkpoint, and an in-memory sink
//! - Exporting records as a single JSON array
//! - Loading and printing crawl reports

mod json_sink;
mod memory;
pub mod stats;
mod traits;

pub use json_sink::{export_json_array, JsonSink};
pub use memory::MemorySink;
pub use stats::{load_report, print_report, require_checkpoint};
pub use traits::{CrawlReport, OutputError, OutputResult, Sink};
