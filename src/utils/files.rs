//! This file contains fasta reading/writing and the scoped working directory used for tool exchange files

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::errors::{Result, StackError};

/// A fasta record as read from file : full header line (without '>') and sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct FastaRecord {
    pub desc: String,
    pub seq: String,
}

impl FastaRecord {
    /// sequence id is first whitespace delimited token of header
    pub fn seqid(&self) -> &str {
        self.desc.split_whitespace().next().unwrap_or("")
    }
} // end of impl FastaRecord

/// opens and parses a fasta file (possibly gzipped) with needletail.
/// Sequences are returned with U translated to T. An empty file gives an empty vector.
pub fn read_fasta(path: &Path) -> Result<Vec<FastaRecord>> {
    let mut records = Vec::<FastaRecord>::new();
    if fs::metadata(path)?.len() == 0 {
        log::debug!("read_fasta, empty file {:?}", path);
        return Ok(records);
    }
    let what = format!("fasta file {:?}", path);
    let mut reader =
        needletail::parse_fastx_file(path).map_err(|e| StackError::parse(&what, 0, e))?;
    while let Some(record) = reader.next() {
        let seqrec = record.map_err(|e| StackError::parse(&what, records.len() + 1, e))?;
        let desc = String::from_utf8_lossy(seqrec.id()).into_owned();
        let seq: String = seqrec
            .seq()
            .iter()
            .map(|c| if *c == b'U' { 'T' } else { *c as char })
            .collect();
        records.push(FastaRecord { desc, seq });
    }
    log::trace!("read_fasta {:?}, nb records : {}", path, records.len());
    Ok(records)
} // end of read_fasta

/// writes records as 2 line fasta
pub fn write_fasta<'a, W, I>(out: &mut W, records: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut nb_written = 0;
    for (id, seq) in records {
        writeln!(out, ">{}\n{}", id, seq)?;
        nb_written += 1;
    }
    Ok(nb_written)
} // end of write_fasta

/// writes a single record fasta file, as needed for a search query
pub fn write_single_fasta(path: &Path, id: &str, seq: &str) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_fasta(&mut out, [(id, seq)])?;
    out.flush()?;
    Ok(())
}

//=================================================================================

/// Directory where query, hit and filtered database files exchanged with tools are written.
/// Either a user supplied directory or an ephemeral one removed at drop.
/// Names given by [WorkDir::unique_path] are never reused, so a round cannot read
/// files left by a previous round. Callers [WorkDir::discard] their files once read.
pub struct WorkDir {
    dir: PathBuf,
    // keeps ephemeral directory alive
    _tmp: Option<TempDir>,
    nb_files: usize,
}

impl WorkDir {
    pub fn new(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                log::info!("working directory : {:?}", dir);
                Ok(WorkDir {
                    dir: dir.to_path_buf(),
                    _tmp: None,
                    nb_files: 0,
                })
            }
            None => {
                let tmp = tempfile::Builder::new().prefix("stackcurves").tempdir()?;
                log::info!("ephemeral working directory : {:?}", tmp.path());
                Ok(WorkDir {
                    dir: tmp.path().to_path_buf(),
                    _tmp: Some(tmp),
                    nb_files: 0,
                })
            }
        }
    } // end of new

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// returns a path dir/stem_NNNNN.ext never returned before by this WorkDir
    pub fn unique_path(&mut self, stem: &str, ext: &str) -> PathBuf {
        self.nb_files += 1;
        self.dir.join(format!("{}_{:05}.{}", stem, self.nb_files, ext))
    }

    /// removes exchange files. A file the tool did not write is not an error.
    pub fn discard<P: AsRef<Path>>(&self, paths: &[P]) {
        for path in paths {
            let path: &Path = path.as_ref();
            match fs::remove_file(path) {
                Ok(()) => log::trace!("removed {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("could not remove {:?} : {}", path, e),
            }
        }
    }
} // end of impl WorkDir

//=================================================================================

// end of mod tests
