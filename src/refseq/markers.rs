//! The 16S marker database.
//!
//! Each assembly contributes its full length, good quality 16S rRNA genes, extracted from the
//! `_rna_from_genomic.fna` file of the assembly. Headers there look like :
//!
//! `lcl|NZ_CP015402.2_rrna_41 [locus_tag=A4V02_RS00205] [product=16S ribosomal RNA] [location=43361..44890] [gbkey=rRNA]`
//!
//! The database is materialized as one fasta file (the subject universe of searches) and a
//! tab separated `seqid accession` file, reloaded at next run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use fxhash::{FxHashMap, FxHashSet};
use rayon::prelude::*;

use super::provider::GenomeSource;
use super::registry::AssemblyRegistry;
use crate::errors::{Result, StackError};
use crate::utils::files::{read_fasta, write_fasta};

pub const SSU_FASTA_FILE: &str = "refseq_16S.fasta";
pub const SSU_ACCESSION_FILE: &str = "refseq_16S_accessions.txt";

/// a 16S with a run of that many N is considered low quality
pub const DEFAULT_MAX_N: usize = 5;

const SSU_PRODUCT: &str = "16S ribosomal RNA";

/// A marker sequence : (sequence-id, sequence, owning assembly accession)
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceRecord {
    pub seqid: String,
    pub seq: String,
    pub accession: String,
}

/// splits a header in its id and its `[key=value]` attributes
pub fn parse_desc(desc: &str) -> (String, FxHashMap<String, String>) {
    let (seqid, rest) = match desc.split_once(' ') {
        Some((seqid, rest)) => (seqid, rest),
        None => (desc, ""),
    };
    let mut attrs = FxHashMap::default();
    let mut remaining = rest;
    while let Some(start) = remaining.find('[') {
        let after = &remaining[start + 1..];
        let end = match after.find(']') {
            Some(end) => end,
            None => break,
        };
        let token = &after[..end];
        let (key, val) = token.split_once('=').unwrap_or((token, ""));
        attrs.insert(key.to_string(), val.to_string());
        remaining = &after[end + 1..];
    }
    (seqid.to_string(), attrs)
} // end of parse_desc

/// a 16S whose location is not truncated (no '<' or '>')
pub fn is_full_length_16s(desc: &str) -> bool {
    let (_, attrs) = parse_desc(desc);
    if attrs.get("product").map(String::as_str) != Some(SSU_PRODUCT) {
        return false;
    }
    let location = attrs.get("location").map(String::as_str).unwrap_or("");
    !location.contains('<') && !location.contains('>')
}

/// true if seq contains a run of max_n N
pub fn is_low_quality(seq: &str, max_n: usize) -> bool {
    let mut run = 0;
    for c in seq.bytes() {
        if c == b'N' {
            run += 1;
            if run >= max_n {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// extracts (seqid, sequence) of full length good quality 16S of a rna fasta file
pub fn extract_16s(rna_path: &Path, max_n: usize) -> Result<Vec<(String, String)>> {
    let mut seqs = Vec::new();
    for record in read_fasta(rna_path)? {
        if is_full_length_16s(&record.desc) && !is_low_quality(&record.seq, max_n) {
            log::trace!("16S : {}", record.desc);
            seqs.push((record.seqid().to_string(), record.seq));
        }
    }
    Ok(seqs)
}

//=================================================================================

/// Marker sequences of all assemblies, in insertion order.
pub struct MarkerDb {
    records: Vec<SequenceRecord>,
    index: FxHashMap<String, usize>,
    accession_seqids: FxHashMap<String, Vec<String>>,
    /// fasta file holding the whole universe, subject database of first search round
    fasta_path: PathBuf,
}

impl MarkerDb {
    pub fn new(fasta_path: &Path) -> Self {
        MarkerDb {
            records: Vec::new(),
            index: FxHashMap::default(),
            accession_seqids: FxHashMap::default(),
            fasta_path: fasta_path.to_path_buf(),
        }
    }

    /// Adds sequences of an assembly. A sequence identical to one already added for this
    /// assembly is skipped, as is a sequence id already present in database.
    /// Returns number of sequences added.
    pub fn add_assembly_seqs(&mut self, accession: &str, seqs: Vec<(String, String)>) -> usize {
        let mut seen = FxHashSet::<String>::default();
        if let Some(seqids) = self.accession_seqids.get(accession) {
            for seqid in seqids {
                seen.insert(self.records[self.index[seqid]].seq.clone());
            }
        }
        let mut nb_added = 0;
        for (seqid, seq) in seqs {
            if self.index.contains_key(&seqid) {
                log::warn!("sequence id {} already in database, skipped for {}", seqid, accession);
                continue;
            }
            if !seen.insert(seq.clone()) {
                log::debug!("{} duplicates a sequence of {}, skipped", seqid, accession);
                continue;
            }
            self.insert(SequenceRecord {
                seqid,
                seq,
                accession: accession.to_string(),
            });
            nb_added += 1;
        }
        nb_added
    } // end of add_assembly_seqs

    fn insert(&mut self, record: SequenceRecord) {
        self.index.insert(record.seqid.clone(), self.records.len());
        self.accession_seqids
            .entry(record.accession.clone())
            .or_default()
            .push(record.seqid.clone());
        self.records.push(record);
    }

    /// Downloads rna files and extracts 16S of all assemblies of registry, in parallel.
    /// Assemblies we cannot acquire are logged and skipped.
    pub fn collect<G: GenomeSource + Sync>(
        &mut self,
        source: &G,
        registry: &AssemblyRegistry,
        max_n: usize,
    ) -> usize {
        let collected: Vec<(String, Vec<(String, String)>)> = registry
            .as_slice()
            .par_iter()
            .filter_map(|assembly| {
                let res = source
                    .rna_path(&assembly.accession)
                    .and_then(|rna_path| extract_16s(&rna_path, max_n));
                match res {
                    Ok(seqs) => Some((assembly.accession.clone(), seqs)),
                    Err(e) => {
                        log::warn!("skipping assembly {} : {}", assembly.accession, e);
                        None
                    }
                }
            })
            .collect();
        // collect keeps registry order, so the database is the same whatever the scheduling
        let mut nb_added = 0;
        for (accession, seqs) in collected {
            nb_added += self.add_assembly_seqs(&accession, seqs);
        }
        log::info!("collected {} 16S sequences from {} assemblies", nb_added, self.accession_seqids.len());
        nb_added
    } // end of collect

    /// writes the universe fasta and the seqid/accession file
    pub fn save(&self, accession_path: &Path) -> Result<()> {
        self.write_fasta_file()?;
        let mut out = BufWriter::new(File::create(accession_path)?);
        for record in &self.records {
            writeln!(out, "{}\t{}", record.seqid, record.accession)?;
        }
        out.flush()?;
        log::info!("saved {} 16S sequences in {:?}", self.records.len(), self.fasta_path);
        Ok(())
    }

    /// writes the whole universe in fasta_path
    pub fn write_fasta_file(&self) -> Result<()> {
        let mut out = BufWriter::new(File::create(&self.fasta_path)?);
        write_fasta(
            &mut out,
            self.records.iter().map(|r| (r.seqid.as_str(), r.seq.as_str())),
        )?;
        out.flush()?;
        Ok(())
    }

    /// reloads a database saved by [MarkerDb::save]
    pub fn reload(fasta_path: &Path, accession_path: &Path) -> Result<Self> {
        let mut seqs = FxHashMap::<String, String>::default();
        for record in read_fasta(fasta_path)? {
            seqs.insert(record.seqid().to_string(), record.seq);
        }
        let mut db = MarkerDb::new(fasta_path);
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .quoting(false)
            .trim(Trim::All)
            .from_path(accession_path)?;
        for res in reader.records() {
            let rec = res?;
            if rec.len() < 2 {
                let line = rec.position().map(|p| p.line() as usize).unwrap_or(0);
                return Err(StackError::parse("16S accession file", line, "expected 2 columns"));
            }
            let (seqid, accession) = (&rec[0], &rec[1]);
            let seq = seqs
                .remove(seqid)
                .ok_or_else(|| StackError::UnknownSeqid(seqid.to_string()))?;
            db.insert(SequenceRecord {
                seqid: seqid.to_string(),
                seq,
                accession: accession.to_string(),
            });
        }
        log::info!("reloaded {} 16S sequences from {:?}", db.len(), fasta_path);
        Ok(db)
    } // end of reload

    /// reloads the database of data_dir if present, else collects and saves it
    pub fn load_or_collect<G: GenomeSource + Sync>(
        data_dir: &Path,
        source: &G,
        registry: &AssemblyRegistry,
        max_n: usize,
    ) -> Result<Self> {
        let fasta_path = data_dir.join(SSU_FASTA_FILE);
        let accession_path = data_dir.join(SSU_ACCESSION_FILE);
        if accession_path.exists() {
            return Self::reload(&fasta_path, &accession_path);
        }
        let mut db = MarkerDb::new(&fasta_path);
        db.collect(source, registry, max_n);
        db.save(&accession_path)?;
        Ok(db)
    }

    /// Writes in path all sequences not in excluded. This is the subject database of a follow-up search round.
    pub fn save_filtered(&self, path: &Path, excluded: &FxHashSet<String>) -> Result<usize> {
        let mut out = BufWriter::new(File::create(path)?);
        let nb_written = write_fasta(
            &mut out,
            self.records
                .iter()
                .filter(|r| !excluded.contains(&r.seqid))
                .map(|r| (r.seqid.as_str(), r.seq.as_str())),
        )?;
        out.flush()?;
        log::debug!("save_filtered {:?} : {} sequences, {} excluded", path, nb_written, self.records.len() - nb_written);
        Ok(nb_written)
    }

    pub fn get(&self, seqid: &str) -> Option<&SequenceRecord> {
        self.index.get(seqid).map(|&rank| &self.records[rank])
    }

    pub fn accession_of(&self, seqid: &str) -> Result<&str> {
        self.get(seqid)
            .map(|r| r.accession.as_str())
            .ok_or_else(|| StackError::UnknownSeqid(seqid.to_string()))
    }

    /// sequence ids of an assembly, in insertion order. Empty if assembly has no 16S.
    pub fn seqids_of(&self, accession: &str) -> &[String] {
        self.accession_seqids
            .get(accession)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// accessions having at least one marker, sorted
    pub fn accessions(&self) -> Vec<&str> {
        let mut accessions: Vec<&str> = self.accession_seqids.keys().map(String::as_str).collect();
        accessions.sort_unstable();
        accessions
    }

    pub fn fasta_path(&self) -> &Path {
        &self.fasta_path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
} // end of impl MarkerDb

//=================================================================================

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_parse_desc() {
        let (seqid, attrs) = parse_desc(
            "lcl|NZ_VSMC01000076.1_rrna_55 [locus_tag=FW767_RS13005] \
             [db_xref=RFAM:RF00177] [product=16S ribosomal RNA] \
             [location=complement(482..>596)] [gbkey=rRNA]",
        );
        assert_eq!(seqid, "lcl|NZ_VSMC01000076.1_rrna_55");
        assert_eq!(attrs.len(), 5);
        assert_eq!(attrs["locus_tag"], "FW767_RS13005");
        assert_eq!(attrs["db_xref"], "RFAM:RF00177");
        assert_eq!(attrs["product"], "16S ribosomal RNA");
        assert_eq!(attrs["location"], "complement(482..>596)");
        assert_eq!(attrs["gbkey"], "rRNA");
    }

    #[test]
    fn test_full_length() {
        assert!(is_full_length_16s("s1 [product=16S ribosomal RNA] [location=1..1500]"));
        assert!(!is_full_length_16s("s1 [product=16S ribosomal RNA] [location=complement(482..>596)]"));
        assert!(!is_full_length_16s("s1 [product=23S ribosomal RNA] [location=1..2900]"));
        assert!(!is_full_length_16s("s1"));
    }

    #[test]
    fn test_is_low_quality() {
        assert!(is_low_quality("ACGTNNNNCGT", 4));
        assert!(!is_low_quality("ACGTNNNNCGT", 5));
        assert!(!is_low_quality("ACGTNNANNCGT", 3));
    }

    #[test]
    fn test_add_assembly_skips_duplicates() {
        let mut db = MarkerDb::new(Path::new("unused.fasta"));
        let seqs = vec![
            ("seq1".to_string(), "GCTCGCATCGAT".to_string()),
            ("seq2".to_string(), "GCTCGCATCGAT".to_string()),
            ("seq3".to_string(), "TGCTCAGTCGT".to_string()),
        ];
        assert_eq!(db.add_assembly_seqs("GCF_001688845.2", seqs), 2);
        assert_eq!(db.accession_of("seq1").unwrap(), "GCF_001688845.2");
        assert!(db.get("seq2").is_none());
        assert_eq!(db.get("seq3").unwrap().seq, "TGCTCAGTCGT");
        assert_eq!(db.seqids_of("GCF_001688845.2"), ["seq1".to_string(), "seq3".to_string()]);
        // same sequence in another assembly is kept
        assert_eq!(db.add_assembly_seqs("GCF_2.1", vec![("seq4".to_string(), "GCTCGCATCGAT".to_string())]), 1);
        assert!(db.seqids_of("GCF_9.9").is_empty());
    }

    #[test]
    fn test_save_reload_and_filter() {
        let dir = tempfile::tempdir().unwrap();
        let fasta_path = dir.path().join(SSU_FASTA_FILE);
        let accession_path = dir.path().join(SSU_ACCESSION_FILE);
        let mut db = MarkerDb::new(&fasta_path);
        db.add_assembly_seqs("A", vec![("a1".to_string(), "ACGT".to_string()), ("a2".to_string(), "ACGA".to_string())]);
        db.add_assembly_seqs("B", vec![("b1".to_string(), "TCGT".to_string())]);
        db.save(&accession_path).unwrap();
        //
        let reloaded = MarkerDb::reload(&fasta_path, &accession_path).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.accession_of("b1").unwrap(), "B");
        assert_eq!(reloaded.seqids_of("A").len(), 2);
        assert_eq!(reloaded.accessions(), vec!["A", "B"]);
        //
        let filtered_path = dir.path().join("filtered.fasta");
        let excluded: FxHashSet<String> = ["a1".to_string(), "b1".to_string()].into_iter().collect();
        assert_eq!(reloaded.save_filtered(&filtered_path, &excluded).unwrap(), 1);
        let kept = read_fasta(&filtered_path).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].seqid(), "a2");
    }

    #[test]
    fn test_reload_malformed_accession_file() {
        let dir = tempfile::tempdir().unwrap();
        let fasta_path = dir.path().join(SSU_FASTA_FILE);
        let accession_path = dir.path().join(SSU_ACCESSION_FILE);
        std::fs::write(&fasta_path, ">a1\nACGT\n>b1\nTCGT\n").unwrap();
        std::fs::write(&accession_path, "# seqid accession\na1\tA\nb1\n").unwrap();
        assert!(matches!(MarkerDb::reload(&fasta_path, &accession_path), Err(StackError::Parse { .. })));
        std::fs::write(&accession_path, "a1\tA\nzz\tB\n").unwrap();
        assert!(matches!(MarkerDb::reload(&fasta_path, &accession_path), Err(StackError::UnknownSeqid(_))));
    }
} // end of mod tests
