/// PBS logs come in four kinds, written by the scheduler, the server, the moms (one per node) and
/// the accounting subsystem, plus whatever other timestamped logs a site wants to look at.  Each
/// kind is a stream of *records*, one per line, each starting with a timestamp.  Logs are usually
/// found as *log directories* holding one file per day.
///
/// This library reads log files line by line in time order, recognizes the records it cares about,
/// and accumulates them into per-log-type state:
///
/// - Scheduler logs are reconstructed into *scheduling cycles*, with the time spent on each job
///   considered within a cycle; optionally the estimated start times of top jobs are tracked.
///
/// - Server, mom and accounting logs are reduced to per-job lifecycle tables (queued, started,
///   ended) from which wait times, run times, rates and utilization are derived.
///
/// - Generic logs can be searched with a custom pattern, yielding match intervals and bursts, and
///   with a conditional, a list of patterns that must match consecutive lines.
///
/// Each analyzer produces a summary, a nested JSON-compatible mapping whose key names are fixed
/// (see keys.rs).  Summarizing does not change the analyzer's state.
///
/// Errors: a line that can't be understood is skipped (and sometimes counted), never fatal.  Only
/// structural problems such as missing files or bad configuration are returned as errors.
mod accounting;
mod analyzer;
mod custom;
mod cycles;
mod estimates;
pub mod keys;
mod logfile;
mod logtree;
mod mom;
mod records;
mod server;
mod summary;

// The nested summary mapping.

pub use summary::Info;

// Run all the analyses of an AnalysisConfig and produce the combined summary.

pub use analyzer::PbsLogAnalyzer;

// Set scheduler in-cycle times from server run times.

pub use analyzer::correlate_insched;

// The per-line analyzer protocol, the time window gate, and the driver that runs files and
// directories through an analyzer.

pub use logfile::analyze_paths;
pub use logfile::parse_logfile;
pub use logfile::LineAnalyzer;
pub use logfile::ParseStatus;
pub use logfile::TimeWindow;

// Find the log files of a file or directory, filtered by time window.

pub use logtree::find_logfiles;

// Record recognition: the ordered pattern tables and the accounting record parser.

pub use records::estimate_patterns;
pub use records::mom_patterns;
pub use records::parse_attributes;
pub use records::sched_patterns;
pub use records::server_patterns;
pub use records::AccountingKind;
pub use records::AccountingParser;
pub use records::AccountingRecord;
pub use records::EstimateRecordKind;
pub use records::LogRecord;
pub use records::MomRecordKind;
pub use records::PatternTable;
pub use records::RecordTime;
pub use records::SchedRecordKind;
pub use records::ServerRecordKind;

// Scheduler cycle reconstruction.

pub use cycles::array_parent;
pub use cycles::CycleReconstructor;
pub use cycles::CycleState;
pub use cycles::SchedulerAnalyzer;
pub use cycles::SchedulingCycle;

// Estimated start times of top jobs.

pub use estimates::EstimateTracker;
pub use estimates::JobEstimatedStartTimeInfo;

// Per-log-type job trackers.

pub use accounting::exec_hosts;
pub use accounting::parse_exechost;
pub use accounting::AccountingOptions;
pub use accounting::AccountingTracker;
pub use accounting::ExecChunk;
pub use accounting::Reconciled;
pub use mom::MomTracker;
pub use server::ServerTracker;

// Custom pattern and conditional matching.

pub use custom::bursts;
pub use custom::Burst;
pub use custom::ConditionalMatcher;
pub use custom::CustomMatcher;
pub use custom::GenericAnalyzer;
