//! contains utils used in reading/writing fasta files and parameters

pub mod files;
pub mod parameters;

pub use files::*;
pub use parameters::*;
