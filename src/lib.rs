//! stackcurves correlates 16S rRNA percent identity with whole genome average nucleotide identity (ANI)
//! across RefSeq bacterial assemblies.
//!
//! The 16S of a query assembly is searched (vsearch) against the 16S of all assemblies, possibly in several rounds
//! to get past the cap on accepted hits, hits are sampled so that each pctid value contributes a bounded number
//! of pairs, and ANI (fastANI) of query genome against retained subject genomes is computed in one batch.

pub mod ani;
pub mod answer;
pub mod app;
pub mod errors;
pub mod refseq;
pub mod search;
pub mod survey;
pub mod utils;

#[cfg(test)]
pub(crate) mod mock;

pub use errors::{Result, StackError};
