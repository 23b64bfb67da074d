//! Multi round search.
//!
//! vsearch stops after max_hits accepted hits for a query, so when a 16S has more matches than that
//! one search misses some. We search again against a database from which every subject already found
//! has been removed, until a round brings nothing new or the round ceiling is reached.
//! A subject sequence is never returned twice, so each round can use a small max_hits.

use fxhash::FxHashSet;

use super::round::{search_round, SearchHit};
use super::vsearch::SearchService;
use crate::errors::Result;
use crate::refseq::markers::{MarkerDb, SequenceRecord};
use crate::utils::files::WorkDir;
use crate::utils::parameters::SearchParams;

/// Statistics of an exhaustive search
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SearchSummary {
    /// number of rounds run, round 0 included
    pub nb_rounds: usize,
    pub nb_hits: usize,
    /// true if round ceiling was reached while rounds still brought new hits
    pub exhausted: bool,
}

/// Drives repeated [search_round] calls against a shrinking database.
pub struct ExhaustiveSearch<'a, S: SearchService> {
    service: &'a S,
    db: &'a MarkerDb,
    params: SearchParams,
}

impl<'a, S: SearchService> ExhaustiveSearch<'a, S> {
    pub fn new(service: &'a S, db: &'a MarkerDb, params: SearchParams) -> Self {
        ExhaustiveSearch { service, db, params }
    }

    /// Returns all hits of query, each subject sequence at most once.
    /// Sequences of the query assembly are excluded from follow-up databases as they can never give a hit.
    pub fn search(&self, query: &SequenceRecord, workdir: &mut WorkDir) -> Result<(Vec<SearchHit>, SearchSummary)> {
        let mut already_found = FxHashSet::<String>::default();
        already_found.insert(query.seqid.clone());
        for seqid in self.db.seqids_of(&query.accession) {
            already_found.insert(seqid.clone());
        }
        //
        let mut all_hits = Vec::<SearchHit>::new();
        let mut summary = SearchSummary::default();
        for round in 0..self.params.max_rounds {
            let hits = if round == 0 {
                search_round(self.service, self.db, query, self.db.fasta_path(), false, &self.params, workdir)?
            } else {
                let filtered = workdir.unique_path("filtered_subject", "fasta");
                let nb_subjects = self.db.save_filtered(&filtered, &already_found)?;
                if nb_subjects == 0 {
                    log::info!("no subject left for {} after {} rounds", query.seqid, round);
                    summary.nb_rounds = round;
                    summary.nb_hits = all_hits.len();
                    return Ok((all_hits, summary));
                }
                let hits = search_round(self.service, self.db, query, &filtered, true, &self.params, workdir);
                workdir.discard(&[&filtered]);
                hits?
            };
            summary.nb_rounds = round + 1;
            let mut nb_new = 0;
            for hit in hits {
                if already_found.insert(hit.subject_seqid.clone()) {
                    nb_new += 1;
                    all_hits.push(hit);
                } else {
                    log::debug!("round {} returned {} again, dropped", round, hit.subject_seqid);
                }
            }
            log::info!("search of {}, round {} : {} new hits", query.seqid, round, nb_new);
            if nb_new == 0 {
                summary.nb_hits = all_hits.len();
                return Ok((all_hits, summary));
            }
        }
        log::warn!(
            "search of {} exhausted {} rounds while still finding hits, {} hits collected",
            query.seqid,
            self.params.max_rounds,
            all_hits.len()
        );
        summary.nb_hits = all_hits.len();
        summary.exhausted = true;
        Ok((all_hits, summary))
    } // end of search
} // end of impl ExhaustiveSearch
