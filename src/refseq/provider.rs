//! Acquisition of genome and rna fasta files.
//!
//! The engine only sees the [GenomeSource] trait : an accession is mapped to a local, decompressed, stable path.
//! [RefSeq] implements it by downloading gzipped files from NCBI once and caching them under a data directory.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use super::assembly::Assembly;
use super::registry::AssemblyRegistry;
use crate::errors::{Result, StackError};

/// Provides local paths to genome and rna (marker) fasta files of an assembly.
/// The same accession must always map to the same path.
pub trait GenomeSource {
    fn genome_path(&self, accession: &str) -> Result<PathBuf>;
    fn rna_path(&self, accession: &str) -> Result<PathBuf>;
}

/// downloads url into path
pub fn get_url(url: &str, path: &Path) -> Result<()> {
    log::info!("Downloading {}", url);
    let mut response = reqwest::blocking::get(url)?.error_for_status()?;
    let part = part_path(path);
    {
        let mut out = BufWriter::new(File::create(&part)?);
        io::copy(&mut response, &mut out)?;
        out.flush()?;
    }
    fs::rename(&part, path)?;
    Ok(())
} // end of get_url

/// downloads a gzipped url and decompresses it into path
pub fn get_gz_url(url: &str, path: &Path) -> Result<()> {
    log::info!("Downloading {}", url);
    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let part = part_path(path);
    {
        let mut decoder = MultiGzDecoder::new(response);
        let mut out = BufWriter::new(File::create(&part)?);
        io::copy(&mut decoder, &mut out)?;
        out.flush()?;
    }
    fs::rename(&part, path)?;
    Ok(())
} // end of get_gz_url

// a file is written under this name and renamed when complete, so an interrupted download is never taken as cached
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

//=================================================================================

/// RefSeq bacteria, cached under data_dir :
/// - genomes in data_dir/genome_fasta/{basename}_genomic.fna
/// - rna in data_dir/rna_fasta/{basename}_rna_from_genomic.fna
pub struct RefSeq {
    data_dir: PathBuf,
    registry: AssemblyRegistry,
}

impl RefSeq {
    pub fn new(data_dir: &Path, registry: AssemblyRegistry) -> Self {
        RefSeq {
            data_dir: data_dir.to_path_buf(),
            registry,
        }
    }

    /// loads (downloading if needed) the assembly summary of data_dir
    pub fn load(data_dir: &Path) -> Result<Self> {
        let registry = AssemblyRegistry::load(data_dir)?;
        Ok(RefSeq::new(data_dir, registry))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn registry(&self) -> &AssemblyRegistry {
        &self.registry
    }

    pub fn genome_dir(&self) -> PathBuf {
        self.data_dir.join("genome_fasta")
    }

    pub fn rna_dir(&self) -> PathBuf {
        self.data_dir.join("rna_fasta")
    }

    pub fn local_genome_path(&self, assembly: &Assembly) -> PathBuf {
        self.genome_dir().join(format!("{}_genomic.fna", assembly.basename()))
    }

    pub fn local_rna_path(&self, assembly: &Assembly) -> PathBuf {
        self.rna_dir().join(format!("{}_rna_from_genomic.fna", assembly.basename()))
    }

    fn collect(&self, accession: &str, dir: PathBuf, path: PathBuf, url: String) -> Result<PathBuf> {
        if path.exists() {
            return Ok(path);
        }
        fs::create_dir_all(&dir).map_err(|e| StackError::acquisition(accession, e))?;
        get_gz_url(&url, &path).map_err(|e| StackError::acquisition(accession, e))?;
        Ok(path)
    }
} // end of impl RefSeq

impl GenomeSource for RefSeq {
    fn genome_path(&self, accession: &str) -> Result<PathBuf> {
        let assembly = self.registry.require(accession)?;
        self.collect(
            accession,
            self.genome_dir(),
            self.local_genome_path(assembly),
            assembly.genome_url(),
        )
    }

    fn rna_path(&self, accession: &str) -> Result<PathBuf> {
        let assembly = self.registry.require(accession)?;
        self.collect(
            accession,
            self.rna_dir(),
            self.local_rna_path(assembly),
            assembly.rna_url(),
        )
    }
} // end of impl GenomeSource for RefSeq
