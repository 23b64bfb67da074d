//! Global survey of the 16S pctid / ANI relation.
//!
//! For each pctid value from 100 down to a minimum, by steps of 0.1, we pick random 16S of random assemblies
//! until one has a hit at exactly that (rounded) pctid, then compute ANI of one such pair chosen at random.
//! This gives a sample of pairs evenly spread over pctid values, whatever the density of hits at each value.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use crate::ani::batcher::AniBatcher;
use crate::ani::fastani::AniService;
use crate::answer::{AppResult, OutputWriter};
use crate::errors::{Result, StackError};
use crate::refseq::markers::MarkerDb;
use crate::refseq::provider::GenomeSource;
use crate::search::round::{search_round, SearchHit};
use crate::search::vsearch::SearchService;
use crate::utils::files::WorkDir;
use crate::utils::parameters::{SearchParams, SurveyParams};

/// Target pctid values as tenths of percent : 1000, 999, ... while value is strictly above min_pctid.
/// min_pctid must be in (50, 100].
pub fn pctid_range(min_pctid: f64) -> Result<Vec<i64>> {
    if !(min_pctid > 50. && min_pctid <= 100.) {
        return Err(StackError::InvalidParameter(format!(
            "pctid range minimum must be in (50,100], got {}",
            min_pctid
        )));
    }
    let mut range = Vec::new();
    let mut tenths = 1000_i64;
    while tenths as f64 / 10. > min_pctid {
        range.push(tenths);
        tenths -= 1;
    }
    Ok(range)
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SurveySummary {
    pub nb_rows: usize,
    /// targets abandoned after max_attempts picks
    pub nb_skipped: usize,
}

pub struct Survey<'a, S: SearchService, A: AniService, G: GenomeSource> {
    search: &'a S,
    db: &'a MarkerDb,
    batcher: AniBatcher<'a, A, G>,
    params: SurveyParams,
    workdir: WorkDir,
    // assembly and 16S choice
    query_rng: StdRng,
    // choice among hits at target pctid
    pair_rng: StdRng,
}

impl<'a, S, A, G> Survey<'a, S, A, G>
where
    S: SearchService,
    A: AniService,
    G: GenomeSource,
{
    pub fn new(search: &'a S, db: &'a MarkerDb, batcher: AniBatcher<'a, A, G>, params: SurveyParams, workdir: WorkDir) -> Result<Self> {
        params.check()?;
        Ok(Survey {
            search,
            db,
            batcher,
            params,
            workdir,
            query_rng: StdRng::seed_from_u64(params.seed),
            pair_rng: StdRng::seed_from_u64(params.seed.wrapping_add(1)),
        })
    }

    /// One random attempt at a pair with pctid rounding to target (in tenths).
    /// Ok(None) if the picked 16S has no hit at target or the pair has no ANI.
    fn try_target(&mut self, accessions: &[&str], target: i64) -> Result<Option<AppResult>> {
        let accession = match accessions.choose(&mut self.query_rng) {
            Some(accession) => *accession,
            None => return Ok(None),
        };
        let seqid = match self.db.seqids_of(accession).choose(&mut self.query_rng) {
            Some(seqid) => seqid,
            None => return Ok(None),
        };
        let query = self
            .db
            .get(seqid)
            .ok_or_else(|| StackError::UnknownSeqid(seqid.clone()))?;
        let min_pctid = target as f64 / 10.;
        log::debug!("survey, searching {} at {:.1}", seqid, min_pctid);
        let search_params = SearchParams::new(min_pctid, SearchParams::default().max_hits, self.params.threads);
        let hits: Vec<SearchHit> = search_round(
            self.search,
            self.db,
            query,
            self.db.fasta_path(),
            false,
            &search_params,
            &mut self.workdir,
        )?
        .into_iter()
        .filter(|h| h.pctid_key() == target)
        .collect();
        let hit = match hits.choose(&mut self.pair_rng) {
            Some(hit) => hit,
            None => return Ok(None),
        };
        let report = self
            .batcher
            .get_or_compute(&hit.query_accession, &hit.subject_accession, &mut self.workdir)?;
        Ok(report.map(|report| AppResult::new(hit, &report)))
    } // end of try_target

    /// runs the survey, writing a row for each pair found
    pub fn run(&mut self, writer: &mut OutputWriter) -> Result<SurveySummary> {
        let db = self.db;
        let accessions = db.accessions();
        let range = pctid_range(self.params.min_pctid)?;
        log::info!(
            "survey over {} pctid values, {} pairs each, {} assemblies with 16S",
            range.len(),
            self.params.num_ani,
            accessions.len()
        );
        let mut summary = SurveySummary::default();
        for _ in 0..self.params.num_ani {
            for &target in &range {
                let mut found = false;
                for _ in 0..self.params.max_attempts {
                    match self.try_target(&accessions, target) {
                        Ok(Some(answer)) => {
                            writer.write(&answer)?;
                            summary.nb_rows += 1;
                            found = true;
                            break;
                        }
                        Ok(None) => {}
                        Err(e) => log::error!("survey at {:.1} : {}, trying another pick", target as f64 / 10., e),
                    }
                }
                if !found {
                    log::warn!(
                        "survey : no pair found at {:.1} after {} attempts, skipping",
                        target as f64 / 10.,
                        self.params.max_attempts
                    );
                    summary.nb_skipped += 1;
                }
            }
        }
        log::info!("survey done, {} rows, {} targets skipped", summary.nb_rows, summary.nb_skipped);
        Ok(summary)
    } // end of run
} // end of impl Survey
