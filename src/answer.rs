//! Results of a correlation run : a sampled search hit with its whole genome identity, and the
//! tab separated output file with one row per (query 16S, subject 16S) pair.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ani::fastani::IdentityReport;
use crate::errors::Result;
use crate::search::round::SearchHit;
use crate::search::sampler::PctidKeyed;

/// column names of output file, in order
pub const OUTPUT_FIELDS: [&str; 8] = [
    "query_assembly",
    "subject_assembly",
    "query_seqid",
    "subject_seqid",
    "pctid",
    "ani",
    "fragments_aligned",
    "fragments_total",
];

/// A sampled hit, waiting for its identity report.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    hit: SearchHit,
    identity: Option<IdentityReport>,
}

impl SearchResult {
    pub fn new(hit: SearchHit) -> Self {
        SearchResult { hit, identity: None }
    }

    pub fn hit(&self) -> &SearchHit {
        &self.hit
    }

    pub fn identity(&self) -> Option<&IdentityReport> {
        self.identity.as_ref()
    }

    /// sets identity report. It can be set only once, a second call is refused and returns false.
    pub fn set_identity(&mut self, report: IdentityReport) -> bool {
        if self.identity.is_some() {
            log::error!(
                "identity of {} -> {} already set, refusing to overwrite",
                self.hit.query_seqid,
                self.hit.subject_seqid
            );
            return false;
        }
        self.identity = Some(report);
        true
    }
} // end of impl SearchResult

impl PctidKeyed for SearchResult {
    fn pctid_key(&self) -> i64 {
        self.hit.pctid_key()
    }
}

//=================================================================================

/// One row of output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppResult {
    pub query_assembly: String,
    pub subject_assembly: String,
    pub query_seqid: String,
    pub subject_seqid: String,
    /// recomputed 16S identity, rounded to 2 decimals
    pub pctid: f64,
    pub ani: f64,
    pub fragments_aligned: u32,
    pub fragments_total: u32,
}

impl AppResult {
    pub fn new(hit: &SearchHit, report: &IdentityReport) -> Self {
        AppResult {
            query_assembly: hit.query_accession.clone(),
            subject_assembly: hit.subject_accession.clone(),
            query_seqid: hit.query_seqid.clone(),
            subject_seqid: hit.subject_seqid.clone(),
            pctid: (hit.pctid * 100.).round() / 100.,
            ani: report.ani(),
            fragments_aligned: report.fragments_aligned(),
            fragments_total: report.fragments_total(),
        }
    }

    /// None if result has no identity report
    pub fn from_result(result: &SearchResult) -> Option<Self> {
        result.identity().map(|report| AppResult::new(result.hit(), report))
    }
} // end of impl AppResult

/// Writes output rows, header first.
pub struct OutputWriter {
    writer: csv::Writer<File>,
    nb_rows: usize,
}

impl OutputWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(OUTPUT_FIELDS)?;
        log::info!("writing results in {:?}", path);
        Ok(OutputWriter { writer, nb_rows: 0 })
    }

    /// writes a row and flushes, so a long run leaves usable output if interrupted
    pub fn write(&mut self, result: &AppResult) -> Result<()> {
        self.writer.serialize(result)?;
        self.writer.flush()?;
        self.nb_rows += 1;
        Ok(())
    }

    pub fn nb_rows(&self) -> usize {
        self.nb_rows
    }
} // end of impl OutputWriter

/// reads back an output file
pub fn read_output(path: &Path) -> Result<Vec<AppResult>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;
    let mut results = Vec::new();
    for res in reader.deserialize() {
        let result: AppResult = res?;
        results.push(result);
    }
    log::debug!("read {} results from {:?}", results.len(), path);
    Ok(results)
}
