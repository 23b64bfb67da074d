//! One invocation of the search service for one 16S query, with conversion of raw hits into [SearchHit].

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::compat;
use super::vsearch::{RawHit, SearchRequest, SearchService};
use crate::errors::Result;
use crate::refseq::markers::{MarkerDb, SequenceRecord};
use crate::utils::files::{write_single_fasta, WorkDir};
use crate::utils::parameters::SearchParams;

/// A hit between two 16S of different assemblies, with identity recomputed from aligned rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub query_seqid: String,
    pub subject_seqid: String,
    pub query_accession: String,
    pub subject_accession: String,
    /// identity recomputed accounting for ambiguity codes
    pub pctid: f64,
    /// identity as reported by search tool
    pub reported_pctid: f64,
}

impl SearchHit {
    /// Converts a raw hit. Returns None for a self hit or a hit between sequences of the same assembly.
    pub fn from_raw(raw: RawHit, db: &MarkerDb) -> Result<Option<Self>> {
        if raw.query_seqid == raw.subject_seqid {
            return Ok(None);
        }
        let query_accession = db.accession_of(&raw.query_seqid)?;
        let subject_accession = db.accession_of(&raw.subject_seqid)?;
        if query_accession == subject_accession {
            log::trace!("dropping paralog hit {} -> {}", raw.query_seqid, raw.subject_seqid);
            return Ok(None);
        }
        let pctid = compat::pctid(&raw.qrow, &raw.srow);
        Ok(Some(SearchHit {
            query_accession: query_accession.to_string(),
            subject_accession: subject_accession.to_string(),
            query_seqid: raw.query_seqid,
            subject_seqid: raw.subject_seqid,
            pctid,
            reported_pctid: raw.reported_pctid,
        }))
    } // end of from_raw

    /// identity rounded to one decimal, as a count of tenths of percent. Hits with same key are peers in sampling.
    pub fn pctid_key(&self) -> i64 {
        (self.pctid * 10.).round() as i64
    }
} // end of impl SearchHit

/// Runs the search service once for query against subject_fasta.
/// Query fasta and hit file get fresh names in workdir at each call and are removed before returning.
/// Hits are returned in the order the service returned them.
pub fn search_round<S: SearchService>(
    service: &S,
    db: &MarkerDb,
    query: &SequenceRecord,
    subject_fasta: &Path,
    transient_db: bool,
    params: &SearchParams,
    workdir: &mut WorkDir,
) -> Result<Vec<SearchHit>> {
    let query_fasta = workdir.unique_path("query", "fasta");
    let hits_path = workdir.unique_path("hits", "txt");
    write_single_fasta(&query_fasta, &query.seqid, &query.seq)?;
    //
    let request = SearchRequest {
        query_fasta: &query_fasta,
        subject_fasta,
        hits_path: &hits_path,
        min_pctid: params.min_pctid,
        max_hits: params.max_hits,
        threads: params.threads,
        transient_db,
    };
    log::debug!("{} search of {} against {:?}, min pctid {:.1}", service.name(), query.seqid, subject_fasta, params.min_pctid);
    let raw_hits = service.search(&request);
    workdir.discard(&[&query_fasta, &hits_path]);
    let raw_hits = raw_hits?;
    let nb_raw = raw_hits.len();
    let mut hits = Vec::with_capacity(nb_raw);
    for raw in raw_hits {
        if let Some(hit) = SearchHit::from_raw(raw, db)? {
            hits.push(hit);
        }
    }
    log::debug!("search_round {} : {} raw hits, {} kept", query.seqid, nb_raw, hits.len());
    Ok(hits)
} // end of search_round
