//! Crawler module for fetching and walking the forum
//!
//! This module contains the crawl pipeline, including:
//! - HTTP fetching with retry, backoff and pacing
//! - Paginated traversal of listings
//! - The bounded worker pool for independent units
//! - Run orchestration across boards, threads, members and profiles

mod coordinator;
mod fetcher;
mod pool;
mod traversal;

pub use coordinator::{Archiver, Phase, RunReport};
pub use fetcher::{build_http_client, FetchError, Fetcher};
pub use pool::WorkerPool;
pub use traversal::{Traversal, TraversalOutcome};
