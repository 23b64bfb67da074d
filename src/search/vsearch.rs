//! The sequence similarity search service and its vsearch implementation.
//!
//! A search takes a single record query fasta and a subject fasta, and returns candidate alignments
//! with the identity reported by the tool and the aligned rows.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use csv::ReaderBuilder;

use crate::errors::{Result, StackError};

/// One line of search tool output
#[derive(Clone, Debug, PartialEq)]
pub struct RawHit {
    pub query_seqid: String,
    pub subject_seqid: String,
    /// identity as reported by the tool
    pub reported_pctid: f64,
    pub qrow: String,
    pub srow: String,
}

/// All a search service needs for one invocation
#[derive(Clone, Debug)]
pub struct SearchRequest<'a> {
    pub query_fasta: &'a Path,
    pub subject_fasta: &'a Path,
    /// where the tool writes its tabular output
    pub hits_path: &'a Path,
    pub min_pctid: f64,
    pub max_hits: Option<usize>,
    pub threads: Option<usize>,
    /// true if subject fasta is a filtered database built for this request only
    pub transient_db: bool,
}

/// A sequence similarity search service.
/// Rows with a query id equal to subject id must not be returned.
pub trait SearchService {
    fn name(&self) -> &str;
    fn search(&self, request: &SearchRequest) -> Result<Vec<RawHit>>;
}

/// runs a command to completion, a non zero exit is a [StackError::ToolInvocation]
pub(crate) fn run_tool(tool: &str, args: &[String]) -> Result<()> {
    log::debug!("Running '{} {}'", tool, args.join(" "));
    let output = Command::new(tool).args(args).output().map_err(|e| StackError::ToolInvocation {
        tool: tool.to_string(),
        status: None,
        stderr: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(StackError::ToolInvocation {
            tool: tool.to_string(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
} // end of run_tool

//=================================================================================

/// vsearch --usearch_global with userfields query+target+id2+qrow+trow
pub struct Vsearch {
    program: String,
}

impl Default for Vsearch {
    fn default() -> Self {
        Vsearch {
            program: "vsearch".to_string(),
        }
    }
}

impl Vsearch {
    /// program may be a full path to vsearch executable
    pub fn new(program: &str) -> Self {
        Vsearch {
            program: program.to_string(),
        }
    }

    pub fn udb_path(subject_fasta: &Path) -> PathBuf {
        subject_fasta.with_extension("udb")
    }

    /// indexes subject fasta, once
    pub fn make_udb(&self, subject_fasta: &Path) -> Result<PathBuf> {
        let udb = Self::udb_path(subject_fasta);
        if udb.exists() {
            return Ok(udb);
        }
        let args = vec![
            "--makeudb_usearch".to_string(),
            subject_fasta.to_string_lossy().to_string(),
            "--output".to_string(),
            udb.to_string_lossy().to_string(),
        ];
        run_tool(&self.program, &args)?;
        Ok(udb)
    }

    fn search_args(request: &SearchRequest, udb: &Path) -> Vec<String> {
        let mut args = vec![
            "--usearch_global".to_string(),
            request.query_fasta.to_string_lossy().to_string(),
            "--db".to_string(),
            udb.to_string_lossy().to_string(),
            "--userout".to_string(),
            request.hits_path.to_string_lossy().to_string(),
            "--iddef".to_string(),
            "2".to_string(),
            "--id".to_string(),
            // 97.0 -> 0.970
            format!("{:.3}", request.min_pctid / 100.),
            "--userfields".to_string(),
            "query+target+id2+qrow+trow".to_string(),
        ];
        // vsearch stops at its first accepted hit by default, 0 removes the cap
        args.push("--maxaccepts".to_string());
        args.push(request.max_hits.unwrap_or(0).to_string());
        if let Some(threads) = request.threads {
            args.push("--threads".to_string());
            args.push(threads.to_string());
        }
        args
    } // end of search_args
} // end of impl Vsearch

impl SearchService for Vsearch {
    fn name(&self) -> &str {
        "vsearch"
    }

    fn search(&self, request: &SearchRequest) -> Result<Vec<RawHit>> {
        let udb = self.make_udb(request.subject_fasta)?;
        let res = run_tool(&self.program, &Self::search_args(request, &udb));
        if request.transient_db {
            if let Err(e) = fs::remove_file(&udb) {
                log::warn!("could not remove {:?} : {}", udb, e);
            }
        }
        res?;
        parse_userout(request.hits_path)
    }
} // end of impl SearchService for Vsearch

/// parses a vsearch userout file (query, target, id2, qrow, trow), dropping self hits
pub fn parse_userout(path: &Path) -> Result<Vec<RawHit>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .quoting(false)
        .from_path(path)?;
    //
    let mut hits = Vec::new();
    for res in reader.records() {
        let rec = res?;
        let line = rec.position().map(|p| p.line() as usize).unwrap_or(0);
        if rec.len() < 5 {
            return Err(StackError::parse(
                "vsearch output",
                line,
                format!("expected 5 fields, got {}", rec.len()),
            ));
        }
        let reported_pctid = rec[2]
            .trim()
            .parse::<f64>()
            .map_err(|e| StackError::parse("vsearch output", line, e))?;
        if rec[0] == rec[1] {
            continue;
        }
        hits.push(RawHit {
            query_seqid: rec[0].to_string(),
            subject_seqid: rec[1].to_string(),
            reported_pctid,
            qrow: rec[3].to_string(),
            srow: rec[4].to_string(),
        });
    }
    log::debug!("parsed {} hits from {:?}", hits.len(), path);
    Ok(hits)
} // end of parse_userout

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_parse_userout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.txt");
        fs::write(
            &path,
            "# comment\nq1\ts1\t99.5\tACGT\tACGA\nq1\tq1\t100.0\tACGT\tACGT\nq1\ts2\t90.0\tAC-T\tACGT\n",
        )
        .unwrap();
        let hits = parse_userout(&path).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].subject_seqid, "s1");
        assert_eq!(hits[0].reported_pctid, 99.5);
        assert_eq!(hits[1].qrow, "AC-T");
    }

    #[test]
    fn test_malformed_userout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.txt");
        fs::write(&path, "q1\ts1\tnot_a_number\tACGT\tACGA\n").unwrap();
        assert!(matches!(parse_userout(&path), Err(StackError::Parse { .. })));
        fs::write(&path, "q1\ts1\t99.0\n").unwrap();
        assert!(matches!(parse_userout(&path), Err(StackError::Parse { .. })));
    }

    #[test]
    fn test_search_args() {
        let request = SearchRequest {
            query_fasta: Path::new("q.fasta"),
            subject_fasta: Path::new("db.fasta"),
            hits_path: Path::new("hits.txt"),
            min_pctid: 97.0,
            max_hits: Some(7),
            threads: Some(2),
            transient_db: false,
        };
        let args = Vsearch::search_args(&request, Path::new("db.udb"));
        let joined = args.join(" ");
        assert!(joined.contains("--id 0.970"));
        assert!(joined.contains("--maxaccepts 7"));
        assert!(joined.contains("--threads 2"));
        assert!(joined.contains("--db db.udb"));
        assert_eq!(Vsearch::udb_path(Path::new("dir/db.fasta")), PathBuf::from("dir/db.udb"));
        // no cap means all accepted hits
        let uncapped = SearchRequest {
            max_hits: None,
            threads: None,
            ..request
        };
        let joined = Vsearch::search_args(&uncapped, Path::new("db.udb")).join(" ");
        assert!(joined.contains("--maxaccepts 0"));
        assert!(!joined.contains("--threads"));
    }

    // a stand-in vsearch logging each invocation, writing an empty index and one hit
    #[cfg(unix)]
    fn stub_vsearch(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("vsearch");
        let body = format!(
            "#!/bin/sh\n\
             echo \"$@\" >> {}\n\
             case \"$1\" in\n\
               --makeudb_usearch) : > \"$4\" ;;\n\
               --usearch_global) printf 'q1\\ts1\\t99.0\\tACGT\\tACGA\\n' > \"$6\" ;;\n\
             esac\n",
            dir.join("calls.txt").display()
        );
        fs::write(&script, body).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn test_udb_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let vsearch = Vsearch::new(&stub_vsearch(dir.path()).to_string_lossy());
        let calls = |dir: &Path| -> Vec<String> {
            fs::read_to_string(dir.join("calls.txt")).unwrap().lines().map(str::to_string).collect()
        };
        let subject = dir.path().join("db.fasta");
        fs::write(&subject, ">s1\nACGA\n").unwrap();
        let mut request = SearchRequest {
            query_fasta: &dir.path().join("q.fasta"),
            subject_fasta: &subject,
            hits_path: &dir.path().join("hits.txt"),
            min_pctid: 97.0,
            max_hits: Some(10),
            threads: None,
            transient_db: false,
        };
        // persistent database : indexed once, index kept
        let hits = vsearch.search(&request).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].subject_seqid, "s1");
        assert!(Vsearch::udb_path(&subject).exists());
        vsearch.search(&request).unwrap();
        let log = calls(dir.path());
        assert_eq!(log.len(), 3);
        assert!(log[0].starts_with("--makeudb_usearch"));
        assert!(log[1].starts_with("--usearch_global"));
        assert!(log[1].contains("--maxaccepts 10"));
        // transient database : index removed after the search
        let filtered = dir.path().join("filtered.fasta");
        fs::write(&filtered, ">s1\nACGA\n").unwrap();
        request.subject_fasta = &filtered;
        request.transient_db = true;
        vsearch.search(&request).unwrap();
        assert!(!Vsearch::udb_path(&filtered).exists());
        assert_eq!(calls(dir.path()).len(), 5);
    }

    #[test]
    fn test_missing_tool_is_invocation_error() {
        let res = run_tool("surely-not-an-installed-program-xyz", &[]);
        assert!(matches!(res, Err(StackError::ToolInvocation { status: None, .. })));
    }
}
