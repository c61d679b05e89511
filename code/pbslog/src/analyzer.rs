/// Run a complete analysis: every configured source through its analyzer, then the cross-log
/// correlation, then the summaries.
///
/// Each log type has its own analyzer and its own state; nothing is shared between them while
/// reading.  The only cross-log step is the correlation of scheduler cycles with the server's run
/// times, which happens after all files have been read.
use crate::accounting::{AccountingOptions, AccountingTracker};
use crate::custom::{ConditionalMatcher, CustomMatcher, GenericAnalyzer};
use crate::cycles::{SchedulerAnalyzer, SchedulingCycle};
use crate::logfile::{analyze_paths, TimeWindow};
use crate::mom::MomTracker;
use crate::server::ServerTracker;
use crate::summary::Info;

use anyhow::{bail, Result};
use pbsutils::{parse_timestamp, AnalysisConfig, Timestamp};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};
use ustr::Ustr;

pub struct PbsLogAnalyzer {
    config: AnalysisConfig,
    window: TimeWindow,
    cycle_range: (Option<Timestamp>, Option<Timestamp>),
}

fn window_bound(s: &Option<String>, what: &str) -> Result<Option<Timestamp>> {
    match s {
        None => Ok(None),
        Some(s) => match parse_timestamp(s, None) {
            Some(t) => Ok(Some(t)),
            None => bail!("Bad {what} time '{s}', expected MM/DD/YYYY HH:MM:SS"),
        },
    }
}

impl PbsLogAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Result<PbsLogAnalyzer> {
        if !config.has_sources() {
            bail!("No log sources given");
        }
        let window = TimeWindow::new(
            window_bound(&config.start, "start")?,
            window_bound(&config.end, "end")?,
        );
        if let (Some(s), Some(e)) = (window.start, window.end) {
            if s > e {
                bail!("The start time is after the end time");
            }
        }
        let cycle_range = (
            window_bound(&config.cycles_from, "cycles-from")?,
            window_bound(&config.cycles_to, "cycles-to")?,
        );
        Ok(PbsLogAnalyzer {
            config: config.clone(),
            window,
            cycle_range,
        })
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    /// Analyze all sources.  The result has one section per kind of source that was given:
    /// "scheduler", "server", "mom", "accounting", and "custom" and "conditional" for generic logs.
    pub fn run(&self) -> Result<Info> {
        let cfg = &self.config;
        let mut info = Info::new();

        let mut server = None;
        if !cfg.server_logs.is_empty() {
            let mut s = ServerTracker::new()?;
            analyze_paths(&cfg.server_logs, &mut s, &self.window)?;
            server = Some(s);
        }

        if !cfg.sched_logs.is_empty() {
            let mut sched =
                SchedulerAnalyzer::new(cfg.show_jobs, cfg.estimated_info, cfg.estimated_info_only)?;
            sched.cycle_range = self.cycle_range;
            analyze_paths(&cfg.sched_logs, &mut sched, &self.window)?;
            if let Some(s) = &server {
                correlate_insched(sched.cycles_mut(), s.server_job_run());
            }
            info.insert("scheduler".to_string(), Value::Object(sched.summary()));
        }

        if let Some(s) = &server {
            info.insert("server".to_string(), Value::Object(s.summary()));
        }

        if !cfg.mom_logs.is_empty() {
            let mut mom = MomTracker::new()?;
            analyze_paths(&cfg.mom_logs, &mut mom, &self.window)?;
            info.insert("mom".to_string(), Value::Object(mom.summary()));
        }

        if !cfg.accounting_logs.is_empty() {
            let mut acct = AccountingTracker::new(AccountingOptions {
                utilization: cfg.utilization,
                workload: cfg.workload,
                job_info: cfg.job_info.clone(),
                total_ncpus: cfg.total_ncpus,
                num_nodes: cfg.num_nodes,
                window_start: self.window.start,
            })?;
            analyze_paths(&cfg.accounting_logs, &mut acct, &self.window)?;
            info.insert("accounting".to_string(), Value::Object(acct.summary()));
        }

        let custom = match &cfg.custom_pattern {
            Some(p) => Some(CustomMatcher::new(p, cfg.custom_frequency)?),
            None => None,
        };
        let conditional = if cfg.conditionals.is_empty() {
            None
        } else {
            Some(ConditionalMatcher::new(&cfg.conditionals)?)
        };
        if cfg.generic_logs.is_empty() {
            if custom.is_some() || conditional.is_some() {
                warn!("custom pattern and conditionals apply only to generic logs, none were given");
            }
        } else if custom.is_none() && conditional.is_none() {
            warn!("generic logs need a custom pattern or conditionals, ignoring them");
        } else {
            let mut generic = GenericAnalyzer::new(custom, conditional)?;
            analyze_paths(&cfg.generic_logs, &mut generic, &self.window)?;
            if let Some(c) = &generic.custom {
                info.insert("custom".to_string(), Value::Object(c.summary()));
            }
            if let Some(c) = &generic.conditional {
                info.insert("conditional".to_string(), Value::Object(c.summary()));
            }
        }

        Ok(info)
    }
}

/// The scheduler log shows when a job was considered but the server log shows when the job was
/// actually run.  For each job run by the scheduler within a resolved cycle, a server run time
/// strictly inside the cycle gives the job's time in the scheduler.  Array subjobs are skipped
/// since their consider time is the array's.

pub fn correlate_insched(cycles: &mut [SchedulingCycle], server_runs: &HashMap<Ustr, Vec<Timestamp>>) {
    if server_runs.is_empty() {
        return;
    }
    let mut num_correlated = 0;
    for cycle in cycles {
        let Some(end) = cycle.end else {
            continue;
        };
        let start = cycle.start;
        let jobs = cycle.sched_job_run.keys().copied().collect::<Vec<Ustr>>();
        for jid in jobs {
            if jid.contains('[') {
                continue;
            }
            let (Some(runs), Some(consider)) = (server_runs.get(&jid), cycle.consider.get(&jid).copied())
            else {
                continue;
            };
            for t in runs {
                if *t > start && *t < end {
                    cycle.inschedduration.insert(jid, t - consider);
                    num_correlated += 1;
                }
            }
        }
    }
    debug!(num_correlated = num_correlated, "correlated scheduler and server run times");
}

#[cfg(test)]
fn fixture(name: &str) -> Vec<String> {
    vec![format!("../tests/pbslog/{name}")]
}

#[test]
fn test_no_sources() {
    assert!(PbsLogAnalyzer::new(&AnalysisConfig::default()).is_err());
    let cfg = AnalysisConfig {
        sched_logs: fixture("sched.log"),
        start: Some("yesterday".to_string()),
        ..Default::default()
    };
    assert!(PbsLogAnalyzer::new(&cfg).is_err());
    let cfg = AnalysisConfig {
        sched_logs: fixture("sched.log"),
        start: Some("01/16/2024 00:00:00".to_string()),
        end: Some("01/15/2024 00:00:00".to_string()),
        ..Default::default()
    };
    assert!(PbsLogAnalyzer::new(&cfg).is_err());
}

#[test]
fn test_missing_file() {
    let cfg = AnalysisConfig {
        mom_logs: fixture("no-such-file"),
        ..Default::default()
    };
    assert!(PbsLogAnalyzer::new(&cfg).unwrap().run().is_err());
}

#[test]
fn test_sched_and_server() {
    use crate::keys::*;
    let cfg = AnalysisConfig {
        sched_logs: fixture("sched.log"),
        server_logs: fixture("server.log"),
        show_jobs: true,
        ..Default::default()
    };
    let info = PbsLogAnalyzer::new(&cfg).unwrap().run().unwrap();
    assert!(info.keys().cloned().collect::<Vec<String>>() == vec!["scheduler", "server"]);
    let sched = &info["scheduler"];
    // 100 considered at 10:00:01, run by the server at 10:00:03
    let jobs = sched["0"][JOBS].as_array().unwrap();
    assert!(jobs[0][JOB_ID] == "100.pbs01");
    assert!(jobs[0][TIME_IN_SCHED] == 2);
    // 101 was given up on at the end of the cycle
    assert!(jobs[1][TIME_TO_DISCARD] == 7);
    assert!(sched["0"][SCHEDULER_SOLVER_TIME] == 9);
    assert!(sched["1"][SCHEDULER_SOLVER_TIME] == 2);
    assert!(info["server"][NUM_JOBS_RUN] == 3);
}

#[test]
fn test_cycle_range() {
    use crate::keys::*;
    let mut cfg = AnalysisConfig {
        sched_logs: fixture("sched.log"),
        cycles_from: Some("01/15/2024 10:05:00".to_string()),
        ..Default::default()
    };
    let info = PbsLogAnalyzer::new(&cfg).unwrap().run().unwrap();
    let sched = &info["scheduler"];
    assert!(sched[SUMMARY][NUM_CYCLES] == 2);
    assert!(sched["0"][CYCLE_DURATION] == "0:00:05");
    assert!(sched.get("2").is_none());

    // The cycle ending at 10:20:20 is not before the upper bound
    cfg.cycles_to = Some("01/15/2024 10:20:20".to_string());
    let info = PbsLogAnalyzer::new(&cfg).unwrap().run().unwrap();
    assert!(info["scheduler"][SUMMARY][NUM_CYCLES] == 1);

    cfg.cycles_to = Some("tomorrow".to_string());
    assert!(PbsLogAnalyzer::new(&cfg).is_err());
}

#[test]
fn test_estimates_only() {
    use crate::keys::*;
    let cfg = AnalysisConfig {
        sched_logs: fixture("sched.log"),
        estimated_info_only: true,
        ..Default::default()
    };
    let info = PbsLogAnalyzer::new(&cfg).unwrap().run().unwrap();
    let sched = info["scheduler"].as_object().unwrap();
    assert!(sched.len() == 1);
    let jobs = sched[ESTIMATES][ESTIMATED_JOBS].as_array().unwrap();
    assert!(jobs.len() == 1);
    assert!(jobs[0][JOB_ID] == "102.pbs01");
}

#[test]
fn test_accounting_and_generic() {
    use crate::keys::*;
    let cfg = AnalysisConfig {
        accounting_logs: fixture("accounting.log"),
        mom_logs: fixture("mom.log"),
        generic_logs: fixture("generic.log"),
        custom_pattern: Some(r"Job;(?P<jobid>[^;]+);Exit_status".to_string()),
        conditionals: vec!["Type 20".to_string(), "Exit_status".to_string()],
        ..Default::default()
    };
    let info = PbsLogAnalyzer::new(&cfg).unwrap().run().unwrap();
    assert!(info.keys().cloned().collect::<Vec<String>>() == vec!["mom", "accounting", "custom", "conditional"]);
    assert!(info["accounting"][NUM_JOBS_ENDED] == 3);
    assert!(info["custom"][CUSTOM_GROUPS]["jobid"].as_array().unwrap().len() == 3);
    assert!(info["conditional"][NUM_CONDITIONAL_MATCHES] == 2);
}

#[test]
fn test_correlate_skips_unresolved() {
    let mut cycle = SchedulingCycle::new(100.0);
    let j = Ustr::from("1.pbs01");
    cycle.consider.insert(j, 101.0);
    cycle.sched_job_run.insert(j, 102.0);
    let mut runs = HashMap::new();
    runs.insert(j, vec![103.0]);
    let mut cycles = vec![cycle];
    correlate_insched(&mut cycles, &runs);
    assert!(cycles[0].inschedduration.is_empty());
    cycles[0].end = Some(103.0);
    correlate_insched(&mut cycles, &runs);
    // Strictly inside the cycle
    assert!(cycles[0].inschedduration.is_empty());
    cycles[0].end = Some(110.0);
    correlate_insched(&mut cycles, &runs);
    assert!(cycles[0].inschedduration[&j] == 2.0);
}
