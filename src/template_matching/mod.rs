//! Approximate, alpha-aware template matching
//!
//! Pure scanning functions with no shared state: safe to call concurrently
//! on different frame/template pairs, from the automation loop or from
//! offline tools working on saved frames.

pub mod matcher;
pub mod types;

pub use matcher::{find_all, find_all_in_region, find_first};
pub use types::{Match, Region};
