//! Error taxonomy of the engine.
//!
//! - Acquisition errors (genome or rna file could not be fetched) : the affected assembly is skipped.
//! - Tool invocation errors (vsearch or fastANI exited non zero) : the affected query or pair is skipped.
//! - Parse errors (malformed tabular output) : fatal for the invocation that produced them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("could not acquire data for assembly {accession} : {msg}")]
    Acquisition { accession: String, msg: String },

    #[error("{tool} failed (exit status {status:?}) : {stderr}")]
    ToolInvocation {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("malformed {what} at line {line} : {msg}")]
    Parse {
        what: String,
        line: usize,
        msg: String,
    },

    #[error("unknown assembly accession {0}")]
    UnknownAccession(String),

    #[error("unknown sequence id {0}")]
    UnknownSeqid(String),

    #[error("invalid parameter : {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
} // end of StackError

impl StackError {
    pub fn acquisition(accession: &str, msg: impl ToString) -> Self {
        StackError::Acquisition {
            accession: accession.to_string(),
            msg: msg.to_string(),
        }
    }

    pub fn parse(what: &str, line: usize, msg: impl ToString) -> Self {
        StackError::Parse {
            what: what.to_string(),
            line,
            msg: msg.to_string(),
        }
    }

    /// true if the error only means some assembly data is missing, so a driver can skip and continue
    pub fn is_acquisition(&self) -> bool {
        matches!(self, StackError::Acquisition { .. })
    }
} // end of impl StackError

pub type Result<T> = std::result::Result<T, StackError>;
