//! In memory stand-ins for vsearch, fastANI and RefSeq downloads, used by unit tests.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use fxhash::{FxHashMap, FxHashSet};

use crate::ani::fastani::{AniRecord, AniService, IdentityReport};
use crate::errors::{Result, StackError};
use crate::refseq::markers::MarkerDb;
use crate::refseq::provider::GenomeSource;
use crate::search::compat;
use crate::search::vsearch::{RawHit, SearchRequest, SearchService};
use crate::utils::files::{read_fasta, WorkDir};

/// builds a marker database from (accession, seqid, sequence) triples and writes its fasta in dir
pub(crate) fn marker_db(dir: &Path, seqs: &[(&str, &str, &str)]) -> MarkerDb {
    let mut db = MarkerDb::new(&dir.join("markers.fasta"));
    for (accession, seqid, seq) in seqs {
        db.add_assembly_seqs(accession, vec![(seqid.to_string(), seq.to_string())]);
    }
    db.write_fasta_file().unwrap();
    db
}

/// Search service aligning sequences of same length position by position.
/// Returns subjects reaching min_pctid in subject file order, truncated to max_hits.
#[derive(Default)]
pub(crate) struct TableSearch {
    nb_calls: Cell<usize>,
    // if set, searches this file whatever the request subject
    forced_subject: Option<PathBuf>,
}

impl TableSearch {
    pub(crate) fn always_full_db(path: &Path) -> Self {
        TableSearch {
            nb_calls: Cell::new(0),
            forced_subject: Some(path.to_path_buf()),
        }
    }

    pub(crate) fn nb_calls(&self) -> usize {
        self.nb_calls.get()
    }
}

impl SearchService for TableSearch {
    fn name(&self) -> &str {
        "table"
    }

    fn search(&self, request: &SearchRequest) -> Result<Vec<RawHit>> {
        self.nb_calls.set(self.nb_calls.get() + 1);
        let queries = read_fasta(request.query_fasta)?;
        let subject_path = self.forced_subject.as_deref().unwrap_or(request.subject_fasta);
        let subjects = read_fasta(subject_path)?;
        let mut hits = Vec::new();
        for query in &queries {
            for subject in &subjects {
                if query.seqid() == subject.seqid() || query.seq.len() != subject.seq.len() {
                    continue;
                }
                let pctid = compat::pctid(&query.seq, &subject.seq);
                if pctid < request.min_pctid {
                    continue;
                }
                if request.max_hits.is_some_and(|max| hits.len() >= max) {
                    break;
                }
                hits.push(RawHit {
                    query_seqid: query.seqid().to_string(),
                    subject_seqid: subject.seqid().to_string(),
                    reported_pctid: pctid,
                    qrow: query.seq.clone(),
                    srow: subject.seq.clone(),
                });
            }
        }
        Ok(hits)
    }
} // end of impl SearchService for TableSearch

/// Search service that always fails
pub(crate) struct FailingSearch;

impl SearchService for FailingSearch {
    fn name(&self) -> &str {
        "failing"
    }

    fn search(&self, _request: &SearchRequest) -> Result<Vec<RawHit>> {
        Err(StackError::ToolInvocation {
            tool: "failing".to_string(),
            status: Some(1),
            stderr: "mock failure".to_string(),
        })
    }
}

//=================================================================================

/// Genome files are named {accession}_genomic.fna in a fixed directory. Nothing is written on disk.
pub(crate) struct MockGenomes {
    dir: PathBuf,
    missing: FxHashSet<String>,
    requests: RefCell<Vec<String>>,
}

impl MockGenomes {
    /// accessions in missing give an acquisition error
    pub(crate) fn new(missing: &[&str]) -> Self {
        MockGenomes {
            dir: PathBuf::from("mock_genomes"),
            missing: missing.iter().map(|s| s.to_string()).collect(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn nb_requests(&self, accession: &str) -> usize {
        self.requests.borrow().iter().filter(|a| *a == accession).count()
    }
}

impl GenomeSource for MockGenomes {
    fn genome_path(&self, accession: &str) -> Result<PathBuf> {
        self.requests.borrow_mut().push(accession.to_string());
        if self.missing.contains(accession) {
            return Err(StackError::acquisition(accession, "mock download failure"));
        }
        Ok(self.dir.join(format!("{}_genomic.fna", accession)))
    }

    fn rna_path(&self, accession: &str) -> Result<PathBuf> {
        if self.missing.contains(accession) {
            return Err(StackError::acquisition(accession, "mock download failure"));
        }
        Ok(self.dir.join(format!("{}_rna_from_genomic.fna", accession)))
    }
}

/// ANI service answering from a table of subject accession -> report. The query genome is ignored.
pub(crate) struct MockAni {
    reports: FxHashMap<String, IdentityReport>,
    calls: RefCell<Vec<Vec<PathBuf>>>,
    fail: bool,
}

impl MockAni {
    /// table entries are (subject accession, ani, fragments aligned, fragments total)
    pub(crate) fn new(table: &[(&str, f64, u32, u32)]) -> Self {
        let reports = table
            .iter()
            .map(|(acc, ani, aligned, total)| (acc.to_string(), IdentityReport::new(*ani, *aligned, *total).unwrap()))
            .collect();
        MockAni {
            reports,
            calls: RefCell::new(Vec::new()),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        MockAni {
            reports: FxHashMap::default(),
            calls: RefCell::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn nb_calls(&self) -> usize {
        self.calls.borrow().len()
    }

    pub(crate) fn requested_subjects(&self) -> Vec<Vec<PathBuf>> {
        self.calls.borrow().clone()
    }
}

impl AniService for MockAni {
    fn name(&self) -> &str {
        "mock ani"
    }

    fn compute(
        &self,
        query: &Path,
        subjects: &[PathBuf],
        _threads: Option<usize>,
        _workdir: &mut WorkDir,
    ) -> Result<Vec<AniRecord>> {
        self.calls.borrow_mut().push(subjects.to_vec());
        if self.fail {
            return Err(StackError::ToolInvocation {
                tool: "mock ani".to_string(),
                status: Some(1),
                stderr: "mock failure".to_string(),
            });
        }
        let mut records = Vec::new();
        for subject in subjects {
            let name = subject.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            let accession = name.trim_end_matches("_genomic.fna");
            if let Some(report) = self.reports.get(accession) {
                records.push(AniRecord {
                    query_path: query.to_path_buf(),
                    subject_path: subject.clone(),
                    report: *report,
                });
            }
        }
        Ok(records)
    }
} // end of impl AniService for MockAni
