//! structures related to processing parameters

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::to_writer;

use crate::errors::{Result, StackError};

/// name of parameter dump in an output or working directory
pub const PARAMETERS_FILE: &str = "parameters.json";

/// ceiling on the number of rounds of an exhaustive search
pub const DEFAULT_MAX_ROUNDS: usize = 10;

//===========================================================

/// parameters of 16S searches.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// minimum percent identity (in 0..100) a hit must reach
    pub min_pctid: f64,
    /// maximum number of accepted hits per search invocation. None accepts all hits.
    pub max_hits: Option<usize>,
    /// thread count forwarded to the search tool
    pub threads: Option<usize>,
    /// if true we run repeated rounds against a shrinking database
    pub exhaustive: bool,
    /// ceiling on number of rounds in exhaustive mode (round 0 included)
    pub max_rounds: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            min_pctid: 90.0,
            max_hits: Some(10000),
            threads: None,
            exhaustive: false,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
} // end of Default for SearchParams

impl SearchParams {
    pub fn new(min_pctid: f64, max_hits: Option<usize>, threads: Option<usize>) -> Self {
        SearchParams {
            min_pctid,
            max_hits,
            threads,
            ..Default::default()
        }
    }

    /// switch to multi round search, with at most max_rounds rounds
    pub fn with_exhaustive(mut self, max_rounds: usize) -> Self {
        self.exhaustive = true;
        self.max_rounds = max_rounds;
        self
    }

    pub fn check(&self) -> Result<()> {
        if !(self.min_pctid > 0. && self.min_pctid <= 100.) {
            return Err(StackError::InvalidParameter(format!(
                "min_pctid must be in (0,100], got {}",
                self.min_pctid
            )));
        }
        if self.max_hits == Some(0) {
            return Err(StackError::InvalidParameter("max_hits must be positive".to_string()));
        }
        if self.max_rounds == 0 {
            return Err(StackError::InvalidParameter("max_rounds must be positive".to_string()));
        }
        Ok(())
    }
} // end of impl SearchParams

//===========================================================

/// parameters of percent identity stratified sampling
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// maximum number of hits retained for each (rounded) percent identity value
    pub max_unique_pctid: usize,
    /// random seed
    pub seed: u64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        SamplingParams {
            max_unique_pctid: 100,
            seed: 42,
        }
    }
}

impl SamplingParams {
    pub fn new(max_unique_pctid: usize, seed: u64) -> Self {
        SamplingParams {
            max_unique_pctid,
            seed,
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.max_unique_pctid == 0 {
            return Err(StackError::InvalidParameter(
                "max_unique_pctid must be positive".to_string(),
            ));
        }
        Ok(())
    }
} // end of impl SamplingParams

//===========================================================

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AniParams {
    /// thread count forwarded to fastANI
    pub threads: Option<usize>,
}

//==========================================================================================

/// Gathers parameters of a correlation run.
/// Dumped in output directory so a result file can be traced back to what produced it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppParams {
    pub search: SearchParams,
    pub sampling: SamplingParams,
    pub ani: AniParams,
} // end of AppParams

impl AppParams {
    pub fn new(search: SearchParams, sampling: SamplingParams, ani: AniParams) -> Self {
        AppParams {
            search,
            sampling,
            ani,
        }
    }

    pub fn check(&self) -> Result<()> {
        self.search.check()?;
        self.sampling.check()
    }

    pub fn dump_json(&self, dirpath: &Path) -> Result<()> {
        //
        let filepath = dirpath.join(PARAMETERS_FILE);
        //
        log::info!("dumping AppParams in json file : {:?}", filepath);
        //
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&filepath)
            .map_err(|e| {
                log::error!("AppParams dump : could not open file {:?}", filepath.as_os_str());
                e
            })?;
        let mut writer = BufWriter::new(file);
        to_writer(&mut writer, &self)?;
        //
        Ok(())
    } // end of dump_json

    /// reload from a json dump
    pub fn reload_json(dirpath: &Path) -> Result<Self> {
        log::info!("in reload_json");
        //
        let filepath = dirpath.join(PARAMETERS_FILE);
        let file = OpenOptions::new().read(true).open(&filepath).map_err(|e| {
            log::error!("AppParams reload_json : could not open file {:?}", filepath.as_os_str());
            e
        })?;
        let reader = BufReader::new(file);
        let params: Self = serde_json::from_reader(reader)?;
        //
        log::info!("AppParams reload, min pctid : {}, exhaustive : {}", params.search.min_pctid, params.search.exhaustive);
        //
        Ok(params)
    } // end of reload_json
} // end of impl AppParams

//==========================================================================================

/// parameters of a global survey over pctid values
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurveyParams {
    /// targets go from 100 down by 0.1 while strictly above min_pctid
    pub min_pctid: f64,
    /// number of pairs evaluated for each target pctid
    pub num_ani: usize,
    pub seed: u64,
    /// random picks tried for a target before giving up on it
    pub max_attempts: usize,
    /// thread count forwarded to search and ani tools
    pub threads: Option<usize>,
}

impl Default for SurveyParams {
    fn default() -> Self {
        SurveyParams {
            min_pctid: 97.0,
            num_ani: 100,
            seed: 42,
            max_attempts: 1000,
            threads: None,
        }
    }
}

impl SurveyParams {
    pub fn check(&self) -> Result<()> {
        if !(self.min_pctid > 50. && self.min_pctid <= 100.) {
            return Err(StackError::InvalidParameter(format!(
                "survey min_pctid must be in (50,100], got {}",
                self.min_pctid
            )));
        }
        if self.max_attempts == 0 {
            return Err(StackError::InvalidParameter("max_attempts must be positive".to_string()));
        }
        Ok(())
    }
} // end of impl SurveyParams

//=====================================================================================

// end of mod tests
