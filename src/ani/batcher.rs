//! Batched whole genome identity computation.
//!
//! Search results of one query 16S reference many subject 16S, often several of the same subject assembly.
//! ANI is a genome level quantity, so we run the service once with the deduplicated list of subject genomes,
//! then give each result the report of its subject assembly.

use std::path::PathBuf;

use fxhash::{FxHashMap, FxHashSet};

use super::cache::IdentityCache;
use super::fastani::{AniService, IdentityReport};
use crate::answer::SearchResult;
use crate::errors::{Result, StackError};
use crate::refseq::provider::GenomeSource;
use crate::utils::files::WorkDir;
use crate::utils::parameters::AniParams;

pub struct AniBatcher<'a, A: AniService, G: GenomeSource> {
    service: &'a A,
    source: &'a G,
    cache: IdentityCache,
    params: AniParams,
}

impl<'a, A: AniService, G: GenomeSource> AniBatcher<'a, A, G> {
    pub fn new(service: &'a A, source: &'a G, cache: IdentityCache, params: AniParams) -> Self {
        AniBatcher {
            service,
            source,
            cache,
            params,
        }
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// gives back the cache, to be passed to a next batcher
    pub fn into_cache(self) -> IdentityCache {
        self.cache
    }

    /// Computes the reports of uncached (query, subject) pairs with one service call and stores them in cache,
    /// subjects without result being stored as unknown.
    /// Subjects whose genome cannot be acquired are skipped and not cached. Returns the reports obtained.
    fn compute_uncached(
        &mut self,
        query: &str,
        subjects: &[&str],
        workdir: &mut WorkDir,
    ) -> Result<FxHashMap<String, IdentityReport>> {
        let mut found = FxHashMap::<String, IdentityReport>::default();
        if subjects.is_empty() {
            return Ok(found);
        }
        let query_path = self.source.genome_path(query)?;
        let mut path_to_subject = FxHashMap::<PathBuf, &str>::default();
        let mut subject_paths = Vec::<PathBuf>::with_capacity(subjects.len());
        for subject in subjects {
            match self.source.genome_path(subject) {
                Ok(path) => {
                    path_to_subject.insert(path.clone(), *subject);
                    subject_paths.push(path);
                }
                Err(e) => log::warn!("ani of {} : skipping subject {} : {}", query, subject, e),
            }
        }
        if subject_paths.is_empty() {
            return Ok(found);
        }
        //
        log::info!("{} : query {}, {} subjects", self.service.name(), query, subject_paths.len());
        let records = self.service.compute(&query_path, &subject_paths, self.params.threads, workdir)?;
        for record in records {
            match path_to_subject.get(&record.subject_path) {
                Some(subject) => {
                    self.cache.insert(query, subject, record.report);
                    found.insert(subject.to_string(), record.report);
                }
                None => log::warn!("{} returned a result for unrequested file {:?}", self.service.name(), record.subject_path),
            }
        }
        for subject in path_to_subject.values() {
            if !found.contains_key(*subject) {
                log::info!("no ani for ({}, {}), identity unknown", query, subject);
                self.cache.insert_unknown(query, subject);
            }
        }
        Ok(found)
    } // end of compute_uncached

    /// Assigns their identity report to results, which must all have the same query assembly.
    /// Results whose subject has no report are left unset. Returns the number of results that got a report.
    pub fn compute_batch(&mut self, results: &mut [SearchResult], workdir: &mut WorkDir) -> Result<usize> {
        let query = match results.first() {
            Some(result) => result.hit().query_accession.clone(),
            None => return Ok(0),
        };
        if let Some(other) = results.iter().find(|r| r.hit().query_accession != query) {
            return Err(StackError::InvalidParameter(format!(
                "ani batch mixes query assemblies {} and {}",
                query,
                other.hit().query_accession
            )));
        }
        // distinct subjects, in order of first reference
        let mut seen = FxHashSet::<&str>::default();
        let subjects: Vec<String> = results
            .iter()
            .map(|r| r.hit().subject_accession.as_str())
            .filter(|s| seen.insert(*s))
            .map(str::to_string)
            .collect();
        //
        let mut reports = FxHashMap::<String, IdentityReport>::default();
        let mut uncached = Vec::<&str>::new();
        for subject in &subjects {
            match self.cache.get(&query, subject) {
                Some(Some(report)) => {
                    reports.insert(subject.clone(), report);
                }
                Some(None) => log::trace!("ani of ({}, {}) known to be unknown", query, subject),
                None => uncached.push(subject),
            }
        }
        reports.extend(self.compute_uncached(&query, &uncached, workdir)?);
        //
        let mut nb_assigned = 0;
        for result in results.iter_mut() {
            if let Some(report) = reports.get(&result.hit().subject_accession) {
                if result.set_identity(*report) {
                    nb_assigned += 1;
                }
            }
        }
        log::debug!("ani batch of {} : {} results, {} with identity", query, results.len(), nb_assigned);
        Ok(nb_assigned)
    } // end of compute_batch

    /// identity of one pair, from cache or by a batch of one. None if the service gives no result.
    pub fn get_or_compute(&mut self, query: &str, subject: &str, workdir: &mut WorkDir) -> Result<Option<IdentityReport>> {
        if let Some(entry) = self.cache.get(query, subject) {
            return Ok(entry);
        }
        let found = self.compute_uncached(query, &[subject], workdir)?;
        Ok(found.get(subject).copied())
    }
} // end of impl AniBatcher
