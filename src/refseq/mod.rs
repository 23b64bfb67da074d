//! RefSeq assemblies : summary registry, download and cache of genome/rna files, 16S marker database

pub mod assembly;
pub mod markers;
pub mod provider;
pub mod registry;

pub use assembly::{Assembly, AssemblyLevel};
pub use markers::{MarkerDb, SequenceRecord};
pub use provider::{GenomeSource, RefSeq};
pub use registry::AssemblyRegistry;
