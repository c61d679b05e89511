/// `pbsanalyze` -- Analyze PBS log files
///
/// Run with --help for brief help.
///
/// Every log type has its own option (--sched, --server, --mom, --accounting, --generic), each
/// naming a file or a directory of daily files, and each repeatable.  The result is a single JSON
/// object on stdout with one section per log type that was given.
///
/// Quirks
///
/// The --start and --end values are used *both* for filtering files in log directories (by the
/// local day of each file's first record) *and* for filtering individual records.  A directory file
/// whose first record is on a day within the window is read in full, and reading stops at the first
/// record past --end.
///
/// A --config-file supplies defaults.  Log sources and conditionals from the command line are added
/// to those from the file; everything else given on the command line replaces the file's value.
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use pbslog::PbsLogAnalyzer;
use pbsutils::{decode_value, read_analysis_config, AnalysisConfig, DecodedValue};
use serde_json::Value;
use std::io::{self, Write};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print information about the program
    Version,

    /// Analyze scheduler, server, mom, accounting and generic logs and print a JSON summary
    Analyze(AnalyzeCmdArgs),

    /// Print the typed interpretation of raw attribute values
    Decode(DecodeCmdArgs),
}

#[derive(Args, Debug, Default)]
pub struct AnalyzeCmdArgs {
    #[command(flatten)]
    source_args: SourceArgs,

    #[command(flatten)]
    sched_args: SchedArgs,

    #[command(flatten)]
    accounting_args: AccountingArgs,

    #[command(flatten)]
    match_args: MatchArgs,

    #[command(flatten)]
    meta_args: MetaArgs,
}

#[derive(Args, Debug, Default)]
pub struct DecodeCmdArgs {
    /// Raw values, eg 150mb or 01:02:03
    values: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct SourceArgs {
    /// Scheduler log file or directory (repeatable)
    #[arg(long)]
    sched: Vec<String>,

    /// Server log file or directory (repeatable)
    #[arg(long)]
    server: Vec<String>,

    /// Mom log file or directory (repeatable)
    #[arg(long)]
    mom: Vec<String>,

    /// Accounting log file or directory (repeatable)
    #[arg(long)]
    accounting: Vec<String>,

    /// Any other timestamped log, for --custom and --conditional (repeatable)
    #[arg(long)]
    generic: Vec<String>,

    /// File containing JSON data with default settings for all of these options [default: none]
    #[arg(long)]
    config_file: Option<String>,

    /// Select records at this time and later, format "MM/DD/YYYY HH:MM:SS" [default: no limit]
    #[arg(long, short)]
    start: Option<String>,

    /// Select records at this time and earlier, format "MM/DD/YYYY HH:MM:SS" [default: no limit]
    #[arg(long, short)]
    end: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct SchedArgs {
    /// Report per-job times within each scheduling cycle
    #[arg(long, default_value_t = false)]
    show_jobs: bool,

    /// Also collect the estimated start times of top jobs
    #[arg(long, default_value_t = false)]
    estimated_info: bool,

    /// Collect only the estimated start times of top jobs
    #[arg(long, default_value_t = false)]
    estimated_info_only: bool,

    /// Summarize only cycles that started at this time or later [default: all cycles]
    #[arg(long)]
    cycles_from: Option<String>,

    /// Summarize only cycles that ended before this time [default: now, if --cycles-from is given]
    #[arg(long)]
    cycles_to: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct AccountingArgs {
    /// Compute cpu and node utilization, needs --total-ncpus and --num-nodes
    #[arg(long, default_value_t = false)]
    utilization: bool,

    /// Report the decoded attributes of every ended job
    #[arg(long, default_value_t = false)]
    workload: bool,

    /// Report the raw attributes of this job only
    #[arg(long)]
    job_info: Option<String>,

    /// The number of cpus in the cluster
    #[arg(long)]
    total_ncpus: Option<u64>,

    /// The number of nodes in the cluster
    #[arg(long)]
    num_nodes: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct MatchArgs {
    /// Regular expression to match against generic log records, named groups are collected
    #[arg(long)]
    custom: Option<String>,

    /// Seconds between successive custom matches within one burst [default: 60]
    #[arg(long)]
    custom_frequency: Option<u64>,

    /// Regular expression matched against consecutive lines, most recent line first (repeatable)
    #[arg(long)]
    conditional: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct MetaArgs {
    /// Print debug logging to stderr (overridden by RUST_LOG)
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn main() {
    match pbsanalyze() {
        Ok(()) => {}
        Err(msg) => {
            eprintln!("ERROR: {}", msg);
            process::exit(1);
        }
    }
}

fn pbsanalyze() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            // Syntax: space-separated keyword(value) components, "pbsanalyze" first.
            println!("pbsanalyze version({})", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Decode(ref decode_args) => {
            let mut output = io::stdout();
            for v in &decode_args.values {
                let (kind, json) = describe_value(&decode_value(v));
                writeln!(output, "{v}\t{kind}\t{json}")?;
            }
            Ok(())
        }
        Commands::Analyze(ref analyze_args) => {
            init_logging(analyze_args.meta_args.verbose);
            let config = merge_config(analyze_args)?;
            debug!(?config, "analysis configuration");
            let info = PbsLogAnalyzer::new(&config)?.run()?;
            let mut output = io::stdout();
            serde_json::to_writer_pretty(&mut output, &Value::Object(info))?;
            writeln!(output)?;
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn describe_value(v: &DecodedValue) -> (&'static str, Value) {
    let kind = match v {
        DecodedValue::Integer(_) => "integer",
        DecodedValue::Float(_) => "float",
        DecodedValue::Duration(_) => "duration",
        DecodedValue::SizeKb(_) => "size",
        DecodedValue::String(_) => "string",
    };
    (kind, v.to_json())
}

// The config file, if any, provides the defaults.  Lists from the command line extend the file's
// lists, other options given on the command line replace the file's values.

fn merge_config(args: &AnalyzeCmdArgs) -> Result<AnalysisConfig> {
    let src = &args.source_args;
    let mut config = match &src.config_file {
        Some(filename) => read_analysis_config(filename)?,
        None => AnalysisConfig::default(),
    };

    config.sched_logs.extend(src.sched.iter().cloned());
    config.server_logs.extend(src.server.iter().cloned());
    config.mom_logs.extend(src.mom.iter().cloned());
    config.accounting_logs.extend(src.accounting.iter().cloned());
    config.generic_logs.extend(src.generic.iter().cloned());
    if src.start.is_some() {
        config.start = src.start.clone();
    }
    if src.end.is_some() {
        config.end = src.end.clone();
    }

    let sched = &args.sched_args;
    config.show_jobs |= sched.show_jobs;
    config.estimated_info |= sched.estimated_info;
    config.estimated_info_only |= sched.estimated_info_only;
    if sched.cycles_from.is_some() {
        config.cycles_from = sched.cycles_from.clone();
    }
    if sched.cycles_to.is_some() {
        config.cycles_to = sched.cycles_to.clone();
    }

    let acct = &args.accounting_args;
    config.utilization |= acct.utilization;
    config.workload |= acct.workload;
    if acct.job_info.is_some() {
        config.job_info = acct.job_info.clone();
    }
    if acct.total_ncpus.is_some() {
        config.total_ncpus = acct.total_ncpus;
    }
    if acct.num_nodes.is_some() {
        config.num_nodes = acct.num_nodes;
    }

    let m = &args.match_args;
    if m.custom.is_some() {
        config.custom_pattern = m.custom.clone();
    }
    if let Some(f) = m.custom_frequency {
        config.custom_frequency = f;
    }
    config.conditionals.extend(m.conditional.iter().cloned());

    if !config.has_sources() {
        bail!("No log sources given, use --sched, --server, --mom, --accounting or --generic");
    }
    if config.utilization && (config.total_ncpus.is_none() || config.num_nodes.is_none()) {
        bail!("--utilization requires --total-ncpus and --num-nodes");
    }
    Ok(config)
}

#[test]
fn test_merge_config() {
    let mut args = AnalyzeCmdArgs::default();
    assert!(merge_config(&args).is_err());

    args.source_args.sched = vec!["sched.log".to_string()];
    args.sched_args.show_jobs = true;
    args.match_args.conditional = vec!["a".to_string(), "b".to_string()];
    let c = merge_config(&args).unwrap();
    assert!(c.sched_logs == vec!["sched.log".to_string()]);
    assert!(c.show_jobs);
    assert!(c.conditionals.len() == 2);
    assert!(c.custom_frequency == pbsutils::DEFAULT_CUSTOM_FREQUENCY);

    args.accounting_args.utilization = true;
    args.accounting_args.total_ncpus = Some(128);
    assert!(merge_config(&args).is_err());
    args.accounting_args.num_nodes = Some(4);
    assert!(merge_config(&args).is_ok());
}

#[test]
fn test_merge_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"server_logs": ["server.log"], "start": "01/15/2024 00:00:00", "custom_pattern": "Exit", "custom_frequency": 30, "cycles_from": "01/15/2024 06:00:00"}"#,
    )
    .unwrap();
    let mut args = AnalyzeCmdArgs::default();
    args.source_args.config_file = Some(path.to_str().unwrap().to_string());
    args.source_args.server = vec!["more.log".to_string()];
    args.source_args.start = Some("01/16/2024 00:00:00".to_string());
    args.sched_args.cycles_to = Some("01/16/2024 12:00:00".to_string());
    let c = merge_config(&args).unwrap();
    assert!(c.server_logs == vec!["server.log".to_string(), "more.log".to_string()]);
    assert!(c.start.as_deref() == Some("01/16/2024 00:00:00"));
    assert!(c.custom_frequency == 30);
    assert!(c.cycles_from.as_deref() == Some("01/15/2024 06:00:00"));
    assert!(c.cycles_to.as_deref() == Some("01/16/2024 12:00:00"));
}

#[test]
fn test_describe_value() {
    assert!(describe_value(&decode_value("150mb")).0 == "size");
    assert!(describe_value(&decode_value("01:02:03")) == ("duration", Value::from(3723)));
    assert!(describe_value(&decode_value("hello")).0 == "string");
}
