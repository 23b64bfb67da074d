//! Whole genome identity (ANI) : service, cache of reports and batched computation

pub mod batcher;
pub mod cache;
pub mod fastani;

pub use batcher::AniBatcher;
pub use cache::IdentityCache;
pub use fastani::{AniRecord, AniService, FastAni, IdentityReport};
