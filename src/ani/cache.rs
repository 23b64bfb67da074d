//! Memoization of whole genome identity by (query accession, subject accession).
//!
//! The key is ordered : (A,B) and (B,A) are distinct entries as the service is not symmetric.
//! A pair the service gave no result for is stored as unknown, so it is not asked again.

use fxhash::FxHashMap;

use super::fastani::IdentityReport;

#[derive(Debug, Default)]
pub struct IdentityCache {
    // None for a pair with unknown identity
    reports: FxHashMap<(String, String), Option<IdentityReport>>,
    nb_hits: usize,
    nb_misses: usize,
}

impl IdentityCache {
    pub fn new() -> Self {
        IdentityCache::default()
    }

    /// looks up a pair, counting hits and misses.
    /// Returns None if the pair was never computed, Some(None) if its identity is known to be unknown.
    pub fn get(&mut self, query: &str, subject: &str) -> Option<Option<IdentityReport>> {
        match self.reports.get(&(query.to_string(), subject.to_string())) {
            Some(entry) => {
                self.nb_hits += 1;
                log::debug!("ani cache hit for ({}, {}), known : {}", query, subject, entry.is_some());
                Some(*entry)
            }
            None => {
                self.nb_misses += 1;
                log::debug!("ani cache miss for ({}, {})", query, subject);
                None
            }
        }
    }

    pub fn insert(&mut self, query: &str, subject: &str, report: IdentityReport) {
        self.reports.insert((query.to_string(), subject.to_string()), Some(report));
    }

    /// records that the service gave no result for the pair
    pub fn insert_unknown(&mut self, query: &str, subject: &str) {
        self.reports.insert((query.to_string(), subject.to_string()), None);
    }

    pub fn contains(&self, query: &str, subject: &str) -> bool {
        self.reports.contains_key(&(query.to_string(), subject.to_string()))
    }

    /// number of pairs stored, unknown ones included
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// number of pairs with a report
    pub fn nb_known(&self) -> usize {
        self.reports.values().filter(|r| r.is_some()).count()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (usize, usize) {
        (self.nb_hits, self.nb_misses)
    }
} // end of impl IdentityCache
