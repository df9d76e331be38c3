//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TraversalState`: where a paginated traversal is (start, fetching, extracting, ...)
//! - `TraversalStatus`: how a traversal unit ended (complete, partial, truncated, cancelled)
//! - `TraversalKind`: which kind of unit a traversal record describes

mod traversal;

pub use traversal::{TraversalKind, TraversalState, TraversalStatus};
