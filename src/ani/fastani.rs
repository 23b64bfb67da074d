//! The whole genome identity service and its fastANI implementation.
//!
//! One invocation compares one query genome to a list of subject genomes.
//! fastANI writes nothing for a subject it could not align, so the output may have fewer rows than subjects.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StackError};
use crate::search::vsearch::run_tool;
use crate::utils::files::WorkDir;

/// Whole genome identity of a (query, subject) genome pair.
/// ani is in (0,100], fragments_total > 0 and fragments_aligned <= fragments_total.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityReport {
    ani: f64,
    fragments_aligned: u32,
    fragments_total: u32,
}

impl IdentityReport {
    /// returns None if values are not consistent
    pub fn new(ani: f64, fragments_aligned: u32, fragments_total: u32) -> Option<Self> {
        if !(ani > 0. && ani <= 100.) || fragments_total == 0 || fragments_aligned > fragments_total {
            return None;
        }
        Some(IdentityReport {
            ani,
            fragments_aligned,
            fragments_total,
        })
    }

    pub fn ani(&self) -> f64 {
        self.ani
    }

    pub fn fragments_aligned(&self) -> u32 {
        self.fragments_aligned
    }

    pub fn fragments_total(&self) -> u32 {
        self.fragments_total
    }
} // end of impl IdentityReport

/// One row of service output
#[derive(Clone, Debug, PartialEq)]
pub struct AniRecord {
    pub query_path: PathBuf,
    pub subject_path: PathBuf,
    pub report: IdentityReport,
}

/// A pairwise whole genome identity service.
/// Subjects absent from the returned records have unknown identity, this is not an error.
pub trait AniService {
    fn name(&self) -> &str;
    fn compute(
        &self,
        query: &Path,
        subjects: &[PathBuf],
        threads: Option<usize>,
        workdir: &mut WorkDir,
    ) -> Result<Vec<AniRecord>>;
}

//=================================================================================

pub struct FastAni {
    program: String,
}

impl Default for FastAni {
    fn default() -> Self {
        FastAni {
            program: "fastANI".to_string(),
        }
    }
}

impl FastAni {
    pub fn new(program: &str) -> Self {
        FastAni {
            program: program.to_string(),
        }
    }
}

impl AniService for FastAni {
    fn name(&self) -> &str {
        "fastANI"
    }

    fn compute(
        &self,
        query: &Path,
        subjects: &[PathBuf],
        threads: Option<usize>,
        workdir: &mut WorkDir,
    ) -> Result<Vec<AniRecord>> {
        let list_path = workdir.unique_path("ani_subjects", "txt");
        let out_path = workdir.unique_path("ani", "txt");
        {
            let mut out = BufWriter::new(File::create(&list_path)?);
            for subject in subjects {
                writeln!(out, "{}", subject.display())?;
            }
            out.flush()?;
        }
        let mut args = vec![
            "-q".to_string(),
            query.to_string_lossy().to_string(),
            "--rl".to_string(),
            list_path.to_string_lossy().to_string(),
            "-o".to_string(),
            out_path.to_string_lossy().to_string(),
        ];
        if let Some(threads) = threads {
            args.push("-t".to_string());
            args.push(threads.to_string());
        }
        let records = run_tool(&self.program, &args).and_then(|_| parse_fastani_output(&out_path));
        workdir.discard(&[&list_path, &out_path]);
        records
    } // end of compute
} // end of impl AniService for FastAni

/// parses fastANI tab separated output : query_path ref_path ani fragments_aligned fragments_total
pub fn parse_fastani_output(path: &Path) -> Result<Vec<AniRecord>> {
    const WHAT: &str = "fastANI output";
    if !path.exists() {
        log::info!("no fastANI output file {:?}, no subject aligned", path);
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_path(path)?;
    let mut records = Vec::new();
    for res in reader.records() {
        let rec = res?;
        let line = rec.position().map(|p| p.line() as usize).unwrap_or(0);
        if rec.len() < 5 {
            return Err(StackError::parse(WHAT, line, format!("expected 5 fields, got {}", rec.len())));
        }
        let ani = rec[2].parse::<f64>().map_err(|e| StackError::parse(WHAT, line, e))?;
        let aligned = rec[3].parse::<u32>().map_err(|e| StackError::parse(WHAT, line, e))?;
        let total = rec[4].parse::<u32>().map_err(|e| StackError::parse(WHAT, line, e))?;
        let report = IdentityReport::new(ani, aligned, total).ok_or_else(|| {
            StackError::parse(WHAT, line, format!("inconsistent values ani {} fragments {}/{}", ani, aligned, total))
        })?;
        records.push(AniRecord {
            query_path: PathBuf::from(&rec[0]),
            subject_path: PathBuf::from(&rec[1]),
            report,
        });
    }
    log::debug!("parsed {} ani records from {:?}", records.len(), path);
    Ok(records)
} // end of parse_fastani_output

#[cfg(test)]
mod tests {

    use super::*;
    use std::fs;

    #[test]
    fn test_report_invariants() {
        assert!(IdentityReport::new(99.9, 10, 12).is_some());
        assert!(IdentityReport::new(100., 12, 12).is_some());
        assert!(IdentityReport::new(0., 10, 12).is_none());
        assert!(IdentityReport::new(100.5, 10, 12).is_none());
        assert!(IdentityReport::new(90., 13, 12).is_none());
        assert!(IdentityReport::new(90., 0, 0).is_none());
    }

    #[test]
    fn test_parse_fastani_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ani.txt");
        fs::write(
            &path,
            "q.fna\tgenome_fasta/GCF_002201515.1_ASM220151v1_genomic.fna\t99.996\t1420\t1434\n\
             q.fna\tgenome_fasta/GCF_003024805.1_ASM302480v1_genomic.fna\t81.9096\t974\t1434\n",
        )
        .unwrap();
        let records = parse_fastani_output(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].report.ani(), 81.9096);
        assert_eq!(records[1].report.fragments_aligned(), 974);
        assert_eq!(records[1].report.fragments_total(), 1434);
        assert_eq!(
            records[0].subject_path,
            PathBuf::from("genome_fasta/GCF_002201515.1_ASM220151v1_genomic.fna")
        );
        // no output at all means no subject aligned
        assert!(parse_fastani_output(&dir.path().join("absent.txt")).unwrap().is_empty());
    }

    #[test]
    fn test_inconsistent_row_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ani.txt");
        fs::write(&path, "q.fna\ts.fna\t99.0\t20\t10\n").unwrap();
        assert!(matches!(parse_fastani_output(&path), Err(StackError::Parse { .. })));
        fs::write(&path, "q.fna\ts.fna\t99.0\n").unwrap();
        assert!(matches!(parse_fastani_output(&path), Err(StackError::Parse { .. })));
    }

    // a stand-in fastANI recording its arguments and answering for every reference of the list
    #[cfg(unix)]
    fn stub_fastani(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fastANI");
        let args_log = dir.join("args.txt");
        let body = format!(
            "#!/bin/sh\n\
             echo \"$@\" > {}\n\
             while [ $# -gt 0 ]; do\n\
               case \"$1\" in\n\
                 -q) query=\"$2\" ;;\n\
                 --rl) list=\"$2\" ;;\n\
                 -o) out=\"$2\" ;;\n\
               esac\n\
               shift\n\
             done\n\
             while read -r r; do printf '%s\\t%s\\t97.25\\t800\\t1000\\n' \"$query\" \"$r\" >> \"$out\"; done < \"$list\"\n",
            args_log.display()
        );
        fs::write(&script, body).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn test_fastani_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let fastani = FastAni::new(&stub_fastani(dir.path()).to_string_lossy());
        let mut workdir = WorkDir::new(Some(&dir.path().join("work"))).unwrap();
        let subjects = vec![PathBuf::from("s1_genomic.fna"), PathBuf::from("s2_genomic.fna")];
        let records = fastani
            .compute(Path::new("q_genomic.fna"), &subjects, Some(3), &mut workdir)
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].subject_path, PathBuf::from("s2_genomic.fna"));
        assert_eq!(records[0].query_path, PathBuf::from("q_genomic.fna"));
        assert_eq!(records[0].report.ani(), 97.25);
        //
        let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
        let args: Vec<&str> = args.split_whitespace().collect();
        assert_eq!(args[..2], ["-q", "q_genomic.fna"]);
        assert_eq!(args[2], "--rl");
        assert_eq!(args[4], "-o");
        assert_eq!(args[6..], ["-t", "3"]);
        // subject list and output are removed once read
        assert_eq!(fs::read_dir(workdir.path()).unwrap().count(), 0);
        // without thread count fastANI chooses
        fastani.compute(Path::new("q_genomic.fna"), &subjects, None, &mut workdir).unwrap();
        let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
        assert_eq!(args.split_whitespace().count(), 6);
    }

    #[test]
    fn test_failing_fastani_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let fastani = FastAni::new("surely-not-an-installed-fastani");
        let mut workdir = WorkDir::new(Some(dir.path())).unwrap();
        let res = fastani.compute(Path::new("q.fna"), &[PathBuf::from("s.fna")], None, &mut workdir);
        assert!(matches!(res, Err(StackError::ToolInvocation { .. })));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
