//! stackcurves : 16S percent identity versus whole genome ANI over RefSeq bacteria.
//!
//! stackcurves run accession... \[--output-file file\] \[--data-dir dir\] \[--work-dir dir\] \[--min-pctid f\] \[--max-hits n\]
//!         \[--max-unique-pctid n\] \[--num-threads n\] \[--seed n\] \[--exhaustive\] \[--max-rounds n\]
//!
//! - for each query assembly, searches its 16S against 16S of all RefSeq assemblies, samples hits and computes ANI.
//!   Default output for a single accession is assembly_{accession}_pctid_ani.txt, for several accessions
//!   one such file per accession unless --output-file is given.
//!
//! stackcurves survey \[--output-file file\] \[--min-pctid f\] \[--num-ani n\] \[--seed n\] \[--max-attempts n\] ...
//!
//! - for each pctid from 100 down to min-pctid by 0.1, finds num-ani random pairs with that 16S pctid and computes their ANI.
//!
//! RefSeq summary, genomes, rna files and the 16S database are cached in data-dir.
//! Verbosity is set by RUST_LOG.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use cpu_time::ProcessTime;
use env_logger::Builder;

use stackcurves::ani::{AniBatcher, FastAni, IdentityCache};
use stackcurves::answer::OutputWriter;
use stackcurves::app::CorrelationApp;
use stackcurves::refseq::markers::DEFAULT_MAX_N;
use stackcurves::refseq::{MarkerDb, RefSeq};
use stackcurves::search::Vsearch;
use stackcurves::survey::Survey;
use stackcurves::utils::*;

// install a logger facility
pub fn init_log() -> u64 {
    Builder::from_default_env().init();
    println!("\n ************** initializing logger *****************\n");
    1
}

fn common_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("data_dir")
            .long("data-dir")
            .value_name("DIR")
            .help("directory caching RefSeq summary, genomes and 16S database")
            .default_value(".")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("work_dir")
            .long("work-dir")
            .value_name("DIR")
            .help("directory for vsearch and fastANI exchange files, default is an ephemeral directory")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("output_file")
            .short('o')
            .long("output-file")
            .value_name("FILE")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("num_threads")
            .short('t')
            .long("num-threads")
            .help("threads given to vsearch and fastANI, default lets them use all cpus")
            .value_parser(clap::value_parser!(usize))
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("seed")
            .long("seed")
            .default_value("42")
            .value_parser(clap::value_parser!(u64))
            .action(ArgAction::Set),
    )
}

/// loads RefSeq registry and 16S database, downloading what is missing
fn load_refseq(data_dir: &Path) -> anyhow::Result<(RefSeq, MarkerDb)> {
    std::fs::create_dir_all(data_dir).with_context(|| format!("cannot create data dir {:?}", data_dir))?;
    let refseq = RefSeq::load(data_dir).context("loading assembly summary")?;
    log::info!("nb assemblies in registry : {}", refseq.registry().len());
    let db = MarkerDb::load_or_collect(data_dir, &refseq, refseq.registry(), DEFAULT_MAX_N).context("loading 16S database")?;
    Ok((refseq, db))
}

fn output_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn run_cmd(matches: &ArgMatches) -> anyhow::Result<()> {
    let accessions: Vec<String> = matches
        .get_many::<String>("accessions")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();
    let data_dir = PathBuf::from(matches.get_one::<String>("data_dir").map(String::as_str).unwrap_or("."));
    let work_dir = matches.get_one::<String>("work_dir").map(PathBuf::from);
    let threads = matches.get_one::<usize>("num_threads").copied();
    let seed = matches.get_one::<u64>("seed").copied().unwrap_or(42);
    let min_pctid = matches.get_one::<f64>("min_pctid").copied().unwrap_or(90.);
    let max_hits = matches.get_one::<usize>("max_hits").copied();
    let max_unique_pctid = matches.get_one::<usize>("max_unique_pctid").copied().unwrap_or(100);
    //
    let mut search = SearchParams::new(min_pctid, max_hits, threads);
    if matches.get_flag("exhaustive") {
        let max_rounds = matches.get_one::<usize>("max_rounds").copied().unwrap_or(DEFAULT_MAX_ROUNDS);
        search = search.with_exhaustive(max_rounds);
    }
    let params = AppParams::new(search, SamplingParams::new(max_unique_pctid, seed), AniParams { threads });
    params.check()?;
    log::info!("parameters : {:?}", params);
    //
    let (refseq, db) = load_refseq(&data_dir)?;
    let (vsearch, fastani) = (Vsearch::default(), FastAni::default());
    let workdir = WorkDir::new(work_dir.as_deref())?;
    let mut app = CorrelationApp::new(&vsearch, &fastani, &refseq, &db, IdentityCache::new(), params, workdir)?;
    //
    let mut shared_writer = match matches.get_one::<String>("output_file") {
        Some(output) => {
            let output = PathBuf::from(output);
            params.dump_json(&output_dir(&output))?;
            Some(OutputWriter::create(&output)?)
        }
        None => {
            params.dump_json(Path::new("."))?;
            None
        }
    };
    //
    let mut nb_failed = 0;
    for accession in &accessions {
        let answers = match app.run(accession) {
            Ok(answers) => answers,
            Err(e) => {
                log::error!("processing of {} failed : {}", accession, e);
                nb_failed += 1;
                continue;
            }
        };
        let mut own_writer;
        let writer = match shared_writer.as_mut() {
            Some(writer) => writer,
            None => {
                own_writer = OutputWriter::create(Path::new(&format!("assembly_{}_pctid_ani.txt", accession)))?;
                &mut own_writer
            }
        };
        for answer in &answers {
            writer.write(answer)?;
        }
        println!("{} : {} pairs written", accession, answers.len());
    }
    let (nb_hits, nb_misses) = app.cache().stats();
    log::info!("ani cache : {} hits, {} misses", nb_hits, nb_misses);
    if nb_failed > 0 {
        log::warn!("{} accessions out of {} failed", nb_failed, accessions.len());
    }
    Ok(())
} // end of run_cmd

fn survey_cmd(matches: &ArgMatches) -> anyhow::Result<()> {
    let data_dir = PathBuf::from(matches.get_one::<String>("data_dir").map(String::as_str).unwrap_or("."));
    let work_dir = matches.get_one::<String>("work_dir").map(PathBuf::from);
    let output = PathBuf::from(
        matches
            .get_one::<String>("output_file")
            .map(String::as_str)
            .unwrap_or("refseq_pctid_ani.tsv"),
    );
    let threads = matches.get_one::<usize>("num_threads").copied();
    let params = SurveyParams {
        min_pctid: matches.get_one::<f64>("min_pctid").copied().unwrap_or(97.),
        num_ani: matches.get_one::<usize>("num_ani").copied().unwrap_or(100),
        seed: matches.get_one::<u64>("seed").copied().unwrap_or(42),
        max_attempts: matches.get_one::<usize>("max_attempts").copied().unwrap_or(1000),
        threads,
    };
    params.check()?;
    log::info!("survey parameters : {:?}", params);
    //
    let (refseq, db) = load_refseq(&data_dir)?;
    let (vsearch, fastani) = (Vsearch::default(), FastAni::default());
    let batcher = AniBatcher::new(&fastani, &refseq, IdentityCache::new(), AniParams { threads });
    let mut survey = Survey::new(&vsearch, &db, batcher, params, WorkDir::new(work_dir.as_deref())?)?;
    let mut writer = OutputWriter::create(&output)?;
    let summary = survey.run(&mut writer)?;
    println!("survey : {} pairs written in {:?}, {} pctid values skipped", summary.nb_rows, output, summary.nb_skipped);
    Ok(())
} // end of survey_cmd

//============================================================================================

fn main() -> anyhow::Result<()> {
    let _ = init_log();
    //
    let run_cmd_def = common_args(
        Command::new("run")
            .about("correlate 16S pctid and ANI for query assemblies")
            .arg(
                Arg::new("accessions")
                    .help("accessions of query assemblies")
                    .required(true)
                    .num_args(1..)
                    .action(ArgAction::Append),
            )
            .arg(
                Arg::new("min_pctid")
                    .long("min-pctid")
                    .default_value("90.0")
                    .value_parser(clap::value_parser!(f64))
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("max_hits")
                    .long("max-hits")
                    .help("maximum number of hits accepted by one vsearch invocation")
                    .default_value("10000")
                    .value_parser(clap::value_parser!(usize))
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("max_unique_pctid")
                    .long("max-unique-pctid")
                    .help("maximum number of hits kept for each pctid value")
                    .default_value("100")
                    .value_parser(clap::value_parser!(usize))
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("exhaustive")
                    .long("exhaustive")
                    .help("repeat searches against remaining 16S until no new hit appears")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("max_rounds")
                    .long("max-rounds")
                    .default_value("10")
                    .value_parser(clap::value_parser!(usize))
                    .action(ArgAction::Set),
            ),
    );
    //
    let survey_cmd_def = common_args(
        Command::new("survey")
            .about("sample random 16S pairs at each pctid value and compute their ANI")
            .arg(
                Arg::new("min_pctid")
                    .long("min-pctid")
                    .default_value("97.0")
                    .value_parser(clap::value_parser!(f64))
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("num_ani")
                    .long("num-ani")
                    .help("number of genome pairs evaluated at each pctid value")
                    .default_value("100")
                    .value_parser(clap::value_parser!(usize))
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("max_attempts")
                    .long("max-attempts")
                    .default_value("1000")
                    .value_parser(clap::value_parser!(usize))
                    .action(ArgAction::Set),
            ),
    );
    //
    let matches = Command::new("stackcurves")
        .version("0.1.0")
        .about("16S rRNA percent identity versus whole genome ANI")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(run_cmd_def)
        .subcommand(survey_cmd_def)
        .get_matches();
    //
    let start_t = chrono::Local::now();
    log::info!("stackcurves begins at time : {:?}", start_t);
    let cpu_start = ProcessTime::now();
    //
    match matches.subcommand() {
        Some(("run", sub)) => run_cmd(sub)?,
        Some(("survey", sub)) => survey_cmd(sub)?,
        _ => unreachable!("subcommand is required"),
    }
    //
    let end_t = chrono::Local::now();
    log::info!("stackcurves ends at time : {:?}", end_t);
    log::info!(
        "elapsed time(s) : {}, cpu time(s) : {}",
        (end_t - start_t).num_seconds(),
        cpu_start.elapsed().as_secs()
    );
    Ok(())
} // end of main
