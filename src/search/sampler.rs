//! Percent identity stratified sampling.
//!
//! An ANI computation costs far more than a 16S search, so for each percent identity value (rounded to one decimal)
//! we keep at most nmax hits, drawn uniformly without replacement.

use fxhash::FxHashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::round::SearchHit;

/// Records carrying a rounded percent identity. Records with same key fall in the same bucket.
pub trait PctidKeyed {
    fn pctid_key(&self) -> i64;
}

impl PctidKeyed for SearchHit {
    fn pctid_key(&self) -> i64 {
        SearchHit::pctid_key(self)
    }
}

/// Caps the number of records per percent identity bucket.
pub struct PctidSampler {
    nmax: usize,
    rng: StdRng,
}

impl PctidSampler {
    /// nmax is the maximum number of records retained per bucket. Same seed gives same samples.
    pub fn new(nmax: usize, seed: u64) -> Self {
        PctidSampler {
            nmax,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Buckets come out in order of first appearance of their key, records of a bucket in input order.
    pub fn sample<T: PctidKeyed>(&mut self, records: Vec<T>) -> Vec<T> {
        let nb_in = records.len();
        let mut bucket_rank = FxHashMap::<i64, usize>::default();
        let mut buckets = Vec::<Vec<T>>::new();
        for record in records {
            let key = record.pctid_key();
            let rank = *bucket_rank.entry(key).or_insert_with(|| {
                buckets.push(Vec::new());
                buckets.len() - 1
            });
            buckets[rank].push(record);
        }
        //
        let mut sampled = Vec::with_capacity(nb_in.min(buckets.len() * self.nmax));
        for bucket in buckets {
            if bucket.len() <= self.nmax {
                sampled.extend(bucket);
                continue;
            }
            let mut chosen = rand::seq::index::sample(&mut self.rng, bucket.len(), self.nmax).into_vec();
            chosen.sort_unstable();
            let mut chosen = chosen.into_iter().peekable();
            for (rank, record) in bucket.into_iter().enumerate() {
                if chosen.peek() == Some(&rank) {
                    chosen.next();
                    sampled.push(record);
                }
            }
        }
        log::debug!("pctid sampling, nmax {} : {} records in, {} out", self.nmax, nb_in, sampled.len());
        sampled
    } // end of sample
} // end of impl PctidSampler

#[cfg(test)]
mod tests {

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Rec {
        id: usize,
        pctid: f64,
    }

    impl PctidKeyed for Rec {
        fn pctid_key(&self) -> i64 {
            (self.pctid * 10.).round() as i64
        }
    }

    fn recs(pctids: &[f64]) -> Vec<Rec> {
        pctids.iter().enumerate().map(|(id, &pctid)| Rec { id, pctid }).collect()
    }

    #[test]
    fn test_caps_large_bucket() {
        let mut sampler = PctidSampler::new(2, 42);
        let out = sampler.sample(recs(&[90.1, 90.1, 90.1, 90.0]));
        assert_eq!(out.len(), 3);
        assert_eq!(out.iter().filter(|r| r.pctid_key() == 901).count(), 2);
        assert_eq!(out.iter().filter(|r| r.pctid_key() == 900).count(), 1);
    }

    #[test]
    fn test_small_buckets_unchanged() {
        let input = recs(&[99.0, 98.04, 98.0, 97.5, 99.0]);
        let mut sampler = PctidSampler::new(2, 7);
        let out = sampler.sample(input.clone());
        let mut ids: Vec<usize> = out.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_seed_reproducible() {
        let input = recs(&[95.0; 50]);
        let out1 = PctidSampler::new(5, 3).sample(input.clone());
        let out2 = PctidSampler::new(5, 3).sample(input);
        assert_eq!(out1.len(), 5);
        assert_eq!(out1, out2);
        // no record drawn twice
        let mut ids: Vec<usize> = out1.iter().map(|r| r.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }
}
