//! 16S searches : identity recomputation, single and multi round search, stratified sampling of hits

pub mod compat;
pub mod exhaustive;
pub mod round;
pub mod sampler;
pub mod vsearch;

pub use exhaustive::{ExhaustiveSearch, SearchSummary};
pub use round::{search_round, SearchHit};
pub use sampler::{PctidKeyed, PctidSampler};
pub use vsearch::{RawHit, SearchRequest, SearchService, Vsearch};
