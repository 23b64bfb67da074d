//! registry of assemblies, keyed by accession

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use fxhash::FxHashMap;

use super::assembly::{parse_assembly_summary, Assembly};
use super::provider::get_url;
use crate::errors::{Result, StackError};

pub const SUMMARY_URL: &str =
    "https://ftp.ncbi.nlm.nih.gov/genomes/refseq/bacteria/assembly_summary.txt";

pub const SUMMARY_FILE: &str = "assembly_summary.txt";

/// Assemblies in summary order, with keyed access by accession.
/// Passed explicitly to whatever needs it, there is no process wide registry.
#[derive(Default)]
pub struct AssemblyRegistry {
    assemblies: Vec<Assembly>,
    index: FxHashMap<String, usize>,
}

impl AssemblyRegistry {
    pub fn from_assemblies(assemblies: Vec<Assembly>) -> Self {
        let mut registry = AssemblyRegistry::default();
        for assembly in assemblies {
            registry.insert(assembly);
        }
        registry
    }

    /// inserts an assembly, an accession already present is replaced
    pub fn insert(&mut self, assembly: Assembly) {
        match self.index.get(&assembly.accession) {
            Some(&rank) => {
                log::warn!("duplicate accession {} in registry, replaced", assembly.accession);
                self.assemblies[rank] = assembly;
            }
            None => {
                self.index.insert(assembly.accession.clone(), self.assemblies.len());
                self.assemblies.push(assembly);
            }
        }
    }

    /// parses an assembly summary file
    pub fn from_summary_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(Self::from_assemblies(parse_assembly_summary(reader)?))
    }

    /// loads the RefSeq bacteria summary from data_dir, downloading it first if absent
    pub fn load(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let summary_path = summary_path(data_dir);
        if !summary_path.exists() {
            get_url(SUMMARY_URL, &summary_path)
                .map_err(|e| StackError::acquisition("assembly summary", e))?;
        }
        let registry = Self::from_summary_file(&summary_path)?;
        log::info!("loaded {} assemblies from {:?}", registry.len(), summary_path);
        Ok(registry)
    } // end of load

    pub fn get(&self, accession: &str) -> Option<&Assembly> {
        self.index.get(accession).map(|&rank| &self.assemblies[rank])
    }

    pub fn require(&self, accession: &str) -> Result<&Assembly> {
        self.get(accession)
            .ok_or_else(|| StackError::UnknownAccession(accession.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assembly> {
        self.assemblies.iter()
    }

    pub fn as_slice(&self) -> &[Assembly] {
        &self.assemblies
    }

    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }
} // end of impl AssemblyRegistry

pub fn summary_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SUMMARY_FILE)
}
