//! The correlation engine.
//!
//! For a query assembly : search its first 16S against the marker database, cap hits per percent identity value,
//! compute ANI of the query genome against subject genomes of retained hits, and return one [AppResult]
//! for each hit that got an identity report.
//!
//! The marker database, genome source and identity cache are passed in, so several runs
//! (and several engines) can share them.

use crate::ani::batcher::AniBatcher;
use crate::ani::cache::IdentityCache;
use crate::ani::fastani::AniService;
use crate::answer::{AppResult, SearchResult};
use crate::errors::{Result, StackError};
use crate::refseq::markers::MarkerDb;
use crate::refseq::provider::GenomeSource;
use crate::search::exhaustive::ExhaustiveSearch;
use crate::search::round::{search_round, SearchHit};
use crate::search::sampler::PctidSampler;
use crate::search::vsearch::SearchService;
use crate::utils::files::WorkDir;
use crate::utils::parameters::AppParams;

pub struct CorrelationApp<'a, S: SearchService, A: AniService, G: GenomeSource> {
    search: &'a S,
    db: &'a MarkerDb,
    batcher: AniBatcher<'a, A, G>,
    params: AppParams,
    workdir: WorkDir,
}

impl<'a, S, A, G> CorrelationApp<'a, S, A, G>
where
    S: SearchService,
    A: AniService,
    G: GenomeSource,
{
    pub fn new(
        search: &'a S,
        ani: &'a A,
        source: &'a G,
        db: &'a MarkerDb,
        cache: IdentityCache,
        params: AppParams,
        workdir: WorkDir,
    ) -> Result<Self> {
        params.check()?;
        Ok(CorrelationApp {
            search,
            db,
            batcher: AniBatcher::new(ani, source, cache, params.ani),
            params,
            workdir,
        })
    }

    pub fn params(&self) -> &AppParams {
        &self.params
    }

    pub fn cache(&self) -> &IdentityCache {
        self.batcher.cache()
    }

    pub fn into_cache(self) -> IdentityCache {
        self.batcher.into_cache()
    }

    /// Hits of the first 16S of query assembly against all other assemblies, before sampling.
    pub fn search(&mut self, query_accession: &str) -> Result<Vec<SearchHit>> {
        let seqid = self
            .db
            .seqids_of(query_accession)
            .first()
            .ok_or_else(|| StackError::UnknownAccession(query_accession.to_string()))?;
        let query = self
            .db
            .get(seqid)
            .ok_or_else(|| StackError::UnknownSeqid(seqid.clone()))?;
        log::info!("searching 16S {} of {}", query.seqid, query_accession);
        //
        if self.params.search.exhaustive {
            let (hits, summary) =
                ExhaustiveSearch::new(self.search, self.db, self.params.search).search(query, &mut self.workdir)?;
            log::info!("exhaustive search of {} : {} hits in {} rounds", query_accession, summary.nb_hits, summary.nb_rounds);
            Ok(hits)
        } else {
            search_round(
                self.search,
                self.db,
                query,
                self.db.fasta_path(),
                false,
                &self.params.search,
                &mut self.workdir,
            )
        }
    } // end of search

    /// Full processing of a query assembly. Hits whose subject got no ANI are omitted.
    pub fn run(&mut self, query_accession: &str) -> Result<Vec<AppResult>> {
        let hits = self.search(query_accession)?;
        if hits.is_empty() {
            log::info!("no 16S hit for {}", query_accession);
            return Ok(Vec::new());
        }
        let mut sampler = PctidSampler::new(self.params.sampling.max_unique_pctid, self.params.sampling.seed);
        let mut results: Vec<SearchResult> = sampler.sample(hits).into_iter().map(SearchResult::new).collect();
        //
        self.batcher.compute_batch(&mut results, &mut self.workdir)?;
        let mut answers = Vec::with_capacity(results.len());
        for result in &results {
            match AppResult::from_result(result) {
                Some(answer) => answers.push(answer),
                None => log::info!(
                    "no ani for {} -> {}, hit omitted",
                    result.hit().query_seqid,
                    result.hit().subject_seqid
                ),
            }
        }
        log::info!("{} : {} hits sampled, {} with ani", query_accession, results.len(), answers.len());
        Ok(answers)
    } // end of run
} // end of impl CorrelationApp
