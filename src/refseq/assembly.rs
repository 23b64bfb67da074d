//! A bacterial genome assembly from NCBI RefSeq, as described by one line of assembly_summary.txt
//!
//! The summary is a tab separated file, lines beginning with '#' are comments.
//! The columns we rely on are listed in [SUMMARY_COLUMNS], newer summaries have additional trailing columns
//! which are ignored.

use std::io::Read;
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord};
use strum_macros::{Display, EnumString};

use crate::errors::{Result, StackError};

/// columns of assembly_summary.txt, in order
pub const SUMMARY_COLUMNS: [&str; 22] = [
    "assembly_accession",
    "bioproject",
    "biosample",
    "wgs_master",
    "refseq_category",
    "taxid",
    "species_taxid",
    "organism_name",
    "infraspecific_name",
    "isolate",
    "version_status",
    "assembly_level",
    "release_type",
    "genome_rep",
    "seq_rel_date",
    "asm_name",
    "submitter",
    "gbrs_paired_asm",
    "paired_asm_comp",
    "ftp_path",
    "excluded_from_refseq",
    "relation_to_type_material",
];

// ftp_path is the last column we cannot do without
const FTP_PATH_COL: usize = 19;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString)]
pub enum AssemblyLevel {
    #[strum(serialize = "Complete Genome")]
    CompleteGenome,
    Chromosome,
    Scaffold,
    Contig,
}

/// An assembly. Immutable once loaded, owned by [super::registry::AssemblyRegistry].
/// Missing values ("na" or empty in summary) are None.
#[derive(Clone, Debug, PartialEq)]
pub struct Assembly {
    pub accession: String,
    pub bioproject: Option<String>,
    pub biosample: Option<String>,
    pub wgs_master: Option<String>,
    pub refseq_category: Option<String>,
    pub taxid: Option<u32>,
    pub species_taxid: Option<u32>,
    pub organism_name: Option<String>,
    pub infraspecific_name: Option<String>,
    pub isolate: Option<String>,
    pub version_status: Option<String>,
    pub assembly_level: Option<AssemblyLevel>,
    pub release_type: Option<String>,
    pub genome_rep: Option<String>,
    pub seq_rel_date: Option<String>,
    pub asm_name: Option<String>,
    pub submitter: Option<String>,
    pub gbrs_paired_asm: Option<String>,
    pub paired_asm_comp: Option<String>,
    pub ftp_path: String,
    pub excluded_from_refseq: Option<String>,
    pub relation_to_type_material: Option<String>,
} // end of Assembly

fn optional(rec: &StringRecord, col: usize) -> Option<String> {
    match rec.get(col).map(str::trim) {
        None | Some("") | Some("na") => None,
        Some(val) => Some(val.to_string()),
    }
}

fn optional_parsed<T: FromStr>(rec: &StringRecord, col: usize, line: usize) -> Result<Option<T>> {
    match optional(rec, col) {
        None => Ok(None),
        Some(val) => val.parse::<T>().map(Some).map_err(|_| {
            StackError::parse(
                "assembly summary",
                line,
                format!("bad value {:?} in column {}", val, SUMMARY_COLUMNS[col]),
            )
        }),
    }
}

impl Assembly {
    /// a minimal assembly, other fields None
    pub fn new(accession: &str, ftp_path: &str) -> Self {
        Assembly {
            accession: accession.to_string(),
            bioproject: None,
            biosample: None,
            wgs_master: None,
            refseq_category: None,
            taxid: None,
            species_taxid: None,
            organism_name: None,
            infraspecific_name: None,
            isolate: None,
            version_status: None,
            assembly_level: None,
            release_type: None,
            genome_rep: None,
            seq_rel_date: None,
            asm_name: None,
            submitter: None,
            gbrs_paired_asm: None,
            paired_asm_comp: None,
            ftp_path: ftp_path.to_string(),
            excluded_from_refseq: None,
            relation_to_type_material: None,
        }
    } // end of new

    /// Builds an assembly from a summary record. Returns None for assemblies without ftp path.
    pub fn from_record(rec: &StringRecord, line: usize) -> Result<Option<Self>> {
        if rec.len() <= FTP_PATH_COL {
            return Err(StackError::parse(
                "assembly summary",
                line,
                format!("expected at least {} columns, got {}", FTP_PATH_COL + 1, rec.len()),
            ));
        }
        let accession = match optional(rec, 0) {
            Some(accession) => accession,
            None => return Err(StackError::parse("assembly summary", line, "missing accession")),
        };
        let ftp_path = match optional(rec, FTP_PATH_COL) {
            Some(ftp_path) => ftp_path,
            None => {
                log::trace!("assembly {} has no ftp path, skipped", accession);
                return Ok(None);
            }
        };
        let assembly_level = match optional(rec, 11) {
            Some(level) => Some(AssemblyLevel::from_str(&level).map_err(|_| {
                StackError::parse("assembly summary", line, format!("unknown assembly level {:?}", level))
            })?),
            None => None,
        };
        Ok(Some(Assembly {
            accession,
            bioproject: optional(rec, 1),
            biosample: optional(rec, 2),
            wgs_master: optional(rec, 3),
            refseq_category: optional(rec, 4),
            taxid: optional_parsed(rec, 5, line)?,
            species_taxid: optional_parsed(rec, 6, line)?,
            organism_name: optional(rec, 7),
            infraspecific_name: optional(rec, 8),
            isolate: optional(rec, 9),
            version_status: optional(rec, 10),
            assembly_level,
            release_type: optional(rec, 12),
            genome_rep: optional(rec, 13),
            seq_rel_date: optional(rec, 14),
            asm_name: optional(rec, 15),
            submitter: optional(rec, 16),
            gbrs_paired_asm: optional(rec, 17),
            paired_asm_comp: optional(rec, 18),
            ftp_path,
            excluded_from_refseq: optional(rec, 20),
            relation_to_type_material: optional(rec, 21),
        }))
    } // end of from_record

    /// ftp paths in summary are served over https too
    pub fn base_url(&self) -> String {
        match self.ftp_path.strip_prefix("ftp://") {
            Some(rest) => format!("https://{}", rest),
            None => self.ftp_path.clone(),
        }
    }

    /// last component of ftp path, e.g GCF_001688845.2_ASM168884v2
    pub fn basename(&self) -> &str {
        self.ftp_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.ftp_path)
    }

    pub fn genome_url(&self) -> String {
        format!("{}/{}_genomic.fna.gz", self.base_url(), self.basename())
    }

    pub fn rna_url(&self) -> String {
        format!("{}/{}_rna_from_genomic.fna.gz", self.base_url(), self.basename())
    }
} // end of impl Assembly

/// parses a whole assembly summary
pub fn parse_assembly_summary<R: Read>(reader: R) -> Result<Vec<Assembly>> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .quoting(false)
        .from_reader(reader);
    //
    let mut assemblies = Vec::<Assembly>::new();
    let mut nb_skipped = 0;
    for res in csv_reader.records() {
        let rec = res?;
        let line = rec.position().map(|p| p.line() as usize).unwrap_or(0);
        if rec.len() == 1 && rec[0].trim().is_empty() {
            continue;
        }
        match Assembly::from_record(&rec, line)? {
            Some(assembly) => assemblies.push(assembly),
            None => nb_skipped += 1,
        }
    }
    log::info!("parsed assembly summary, nb assemblies : {}, skipped (no ftp path) : {}", assemblies.len(), nb_skipped);
    Ok(assemblies)
} // end of parse_assembly_summary

//=================================================================================

// end of mod tests
