//! State management for crawl windows and records
//!
//! This module defines the deduplication set, the per-window status machine
//! and the crawl-wide state that checkpoints persist.

mod crawl_state;
mod dedup;
mod window_state;

pub use crawl_state::{CrawlPhase, CrawlState, WindowEntry};
pub use dedup::Deduplicator;
pub use window_state::WindowStatus;
