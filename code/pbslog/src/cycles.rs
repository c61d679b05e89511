/// Reconstruct scheduling cycles from a scheduler log.
///
/// A cycle runs from "Starting Scheduling" to "Leaving Scheduling" (or an alarm that cuts it
/// short).  Between those, the scheduler considers jobs in priority order and for each either runs
/// it, calendars it as a top job, or moves on.  The time between considering a job and resolving it
/// is what we're after: `runduration` for jobs that ran, `calendarduration` for jobs that were
/// calendared, and `cantrunduration` for jobs the scheduler gave up on, which is only visible as the
/// time until the next job was considered or the cycle ended.
///
/// The reconstructor is a two-state machine.  With no cycle open, a cycle start opens one and job
/// records are attributed to the most recent cycle, if any; trailing job records after a cycle has
/// ended still belong to it.  The cycle closes when its end is resolved.
use crate::estimates::EstimateTracker;
use crate::keys::*;
use crate::logfile::{LineAnalyzer, ParseStatus, TimeWindow};
use crate::records::{sched_patterns, LogRecord, PatternTable, RecordTime, SchedRecordKind};
use crate::summary::{
    duration_value, note_version, number_value, rate_value, sorted_copy, versions_value, Info,
};

use anyhow::Result;
use chrono::Local;
use pbsutils::{format_timestamp, mean, percentile, Timestamp};
use serde_json::Value;
use std::collections::HashMap;
use ustr::Ustr;

#[derive(Debug, Clone, Default)]
pub struct SchedulingCycle {
    pub start: Timestamp,

    /// None while the cycle is open.
    pub end: Option<Timestamp>,

    /// Only set when the cycle ends with an explicit "Leaving Scheduling"; cycles cut short by an
    /// alarm or by the next cycle start have a resolved end but no duration.
    pub duration: Option<f64>,

    /// Job id -> time of "Considering job to run".  Array subjobs that ran or were calendared
    /// inherit the entry of their parent `id[]`.
    pub consider: HashMap<Ustr, Timestamp>,

    /// Keys of `consider` in order of insertion.
    pub consider_order: Vec<Ustr>,

    pub num_considered: usize,
    pub sched_job_run: HashMap<Ustr, Timestamp>,
    pub calendared_jobs: HashMap<Ustr, Timestamp>,
    pub run_failure: HashMap<Ustr, Timestamp>,

    /// Job id of the job being considered -> the jobs preempted on its behalf.
    pub preempted_jobs: HashMap<Ustr, Vec<Ustr>>,

    pub runduration: HashMap<Ustr, f64>,
    pub cantrunduration: HashMap<Ustr, f64>,
    pub inschedduration: HashMap<Ustr, f64>,
    pub calendarduration: HashMap<Ustr, f64>,
    pub num_preempted: usize,
    pub num_preempt_failure: usize,

    /// Time from the start of the cycle to the first job considered.
    pub queryduration: Option<f64>,

    /// Jobs in the order they were considered, with repetitions.
    pub political_order: Vec<Ustr>,

    pub lastjob: Option<Ustr>,
}

impl SchedulingCycle {
    pub fn new(start: Timestamp) -> SchedulingCycle {
        SchedulingCycle {
            start,
            ..Default::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Time spent deciding about jobs: in-scheduler time for jobs that ran, plus time spent on
    /// jobs that could not run, plus time spent calendaring.
    pub fn solver_time(&self) -> f64 {
        self.inschedduration.values().sum::<f64>()
            + self.cantrunduration.values().sum::<f64>()
            + self.calendarduration.values().sum::<f64>()
    }

    pub fn calendar_time(&self) -> f64 {
        self.calendarduration.values().sum()
    }

    fn set_consider(&mut self, job: Ustr, t: Timestamp) {
        if self.consider.insert(job, t).is_none() {
            self.consider_order.push(job);
        }
    }

    // The last considered job neither ran nor was calendared by time `t`.
    fn resolve_lastjob(&mut self, t: Timestamp) {
        if let Some(last) = self.lastjob {
            if !self.sched_job_run.contains_key(&last) && !self.calendared_jobs.contains_key(&last) {
                if let Some(c) = self.consider.get(&last) {
                    self.cantrunduration.insert(last, t - c);
                }
            }
        }
    }

    pub fn summary(&self, show_jobs: bool) -> Info {
        let mut info = Info::new();
        info.insert(
            CYCLE_START_TIME.to_string(),
            Value::from(format_timestamp(self.start, "%Y-%m-%d %H:%M:%S")),
        );
        let elapsed = self.end.map(|e| e - self.start).unwrap_or(0.0);
        info.insert(CYCLE_DURATION.to_string(), duration_value(elapsed));
        info.insert(
            QUERY_DURATION.to_string(),
            duration_value(self.queryduration.unwrap_or(0.0)),
        );
        // May differ from the size of `consider`: an array is considered once per subjob under
        // the parent id.
        info.insert(NUM_JOBS_CONSIDERED.to_string(), Value::from(self.num_considered));
        info.insert(NUM_JOBS_RUN.to_string(), Value::from(self.sched_job_run.len()));
        info.insert(NUM_JOBS_FAILED_TO_RUN.to_string(), Value::from(self.run_failure.len()));
        info.insert(SCHEDULER_SOLVER_TIME.to_string(), number_value(self.solver_time()));
        info.insert(NUM_JOBS_CALENDARED.to_string(), Value::from(self.calendared_jobs.len()));
        info.insert(NUM_JOBS_FAILED_TO_PREEMPT.to_string(), Value::from(self.num_preempt_failure));
        info.insert(NUM_JOBS_PREEMPTED.to_string(), Value::from(self.num_preempted));
        info.insert(TIME_TO_CALENDAR.to_string(), number_value(self.calendar_time()));

        if show_jobs {
            let mut jobs = vec![];
            for j in &self.consider_order {
                let mut s = Info::new();
                s.insert(JOB_ID.to_string(), Value::from(j.as_str()));
                let times = [
                    (TIME_TO_RUN, &self.runduration),
                    (TIME_TO_DISCARD, &self.cantrunduration),
                    (TIME_IN_SCHED, &self.inschedduration),
                    (TIME_TO_CALENDAR, &self.calendarduration),
                ];
                for (key, map) in times {
                    if let Some(d) = map.get(j) {
                        s.insert(key.to_string(), number_value(*d));
                    }
                }
                jobs.push(Value::Object(s));
            }
            if !jobs.is_empty() {
                info.insert(JOBS.to_string(), Value::Array(jobs));
            }
        }
        info
    }
}

/// The array parent of a subjob id, `123[4].server` -> `123[].server`.  None for ids that are not
/// subjobs.

pub fn array_parent(job: &str) -> Option<String> {
    let open = job.find('[')?;
    let close = open + job[open..].find(']')?;
    if close == open + 1 {
        return None;
    }
    Some(format!("{}[]{}", &job[..open], &job[close + 1..]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    NoActiveCycle,
    CycleOpen,
}

pub struct CycleReconstructor {
    pub cycles: Vec<SchedulingCycle>,
    pub versions: Vec<String>,
    table: PatternTable<SchedRecordKind>,
    record_time: RecordTime,
}

impl CycleReconstructor {
    pub fn new() -> Result<CycleReconstructor> {
        Ok(CycleReconstructor {
            cycles: vec![],
            versions: vec![],
            table: sched_patterns()?,
            record_time: RecordTime::new()?,
        })
    }

    pub fn state(&self) -> CycleState {
        match self.cycles.last() {
            Some(c) if c.is_open() => CycleState::CycleOpen,
            _ => CycleState::NoActiveCycle,
        }
    }

    /// Feed one classified record to the state machine.
    pub fn apply(&mut self, rec: &LogRecord<SchedRecordKind>) {
        let t = rec.time;
        if rec.kind == SchedRecordKind::CycleStart {
            if let Some(prev) = self.cycles.last_mut() {
                if prev.is_open() {
                    prev.end = Some(t);
                }
            }
            self.cycles.push(SchedulingCycle::new(t));
            return;
        }

        let Some(cycle) = self.cycles.last_mut() else {
            return;
        };
        let job = rec.job_id().map(Ustr::from);
        match (rec.kind, job) {
            (SchedRecordKind::CycleEnd, _) => {
                cycle.end = Some(t);
                cycle.duration = Some(t - cycle.start);
                cycle.resolve_lastjob(t);
            }
            (SchedRecordKind::Alarm, _) => {
                cycle.end = Some(t);
            }
            (SchedRecordKind::JobConsidered, Some(jid)) => {
                cycle.num_considered += 1;
                cycle.set_consider(jid, t);
                cycle.political_order.push(jid);
                cycle.resolve_lastjob(t);
                cycle.lastjob = Some(jid);
                if cycle.queryduration.is_none() {
                    cycle.queryduration = Some(t - cycle.start);
                }
            }
            (SchedRecordKind::JobRun, Some(jid)) => {
                cycle.sched_job_run.insert(jid, t);
                // "Considering job to run" names only the array, not the subjob that runs.
                if !cycle.consider.contains_key(&jid) {
                    if let Some(parent) = array_parent(&jid) {
                        if let Some(pt) = cycle.consider.get(&Ustr::from(parent.as_str())).copied() {
                            cycle.set_consider(jid, pt);
                        }
                    }
                }
                // Jobs rerun after a preemption failure are not considered, and are skipped.
                if let Some(c) = cycle.consider.get(&jid) {
                    cycle.runduration.insert(jid, t - c);
                }
            }
            (SchedRecordKind::JobRunFailed, Some(jid)) => {
                cycle.run_failure.insert(jid, t);
            }
            (SchedRecordKind::PreemptFailed, _) => {
                cycle.num_preempt_failure += 1;
            }
            (SchedRecordKind::JobPreempted, Some(jid)) => {
                if let Some(last) = cycle.lastjob {
                    cycle.preempted_jobs.entry(last).or_default().push(jid);
                }
                cycle.num_preempted += 1;
            }
            (SchedRecordKind::JobCalendared, Some(jid)) => {
                cycle.calendared_jobs.insert(jid, t);
                if let Some(c) = cycle.consider.get(&jid) {
                    cycle.calendarduration.insert(jid, t - c);
                } else if let Some(parent) = array_parent(&jid) {
                    if let Some(pt) = cycle.consider.get(&Ustr::from(parent.as_str())).copied() {
                        cycle.set_consider(jid, pt);
                        cycle.calendarduration.insert(jid, t - pt);
                    }
                }
            }
            _ => {}
        }
    }

    /// A stream that ends in the middle of a cycle has no end record; the last record read stands
    /// in for it.
    pub fn end_of_stream(&mut self, last_line: Option<&str>) {
        let Some(cycle) = self.cycles.last_mut() else {
            return;
        };
        if cycle.is_open() {
            if let Some(t) = last_line.and_then(|l| self.record_time.of(l)) {
                cycle.end = Some(t);
            }
        }
    }

    /// The cycles that started at or after `from` and ended before `to`.  With neither bound, all
    /// cycles.  A missing upper bound means "now"; a missing lower bound means no lower bound.
    /// Open cycles are excluded when there is any bound.
    pub fn cycles_between(&self, from: Option<Timestamp>, to: Option<Timestamp>) -> Vec<&SchedulingCycle> {
        if from.is_none() && to.is_none() {
            return self.cycles.iter().collect();
        }
        let to = to.unwrap_or_else(|| Local::now().timestamp() as f64);
        self.cycles
            .iter()
            .filter(|c| from.map_or(true, |f| c.start >= f))
            .filter(|c| c.end.map_or(false, |e| e < to))
            .collect()
    }

    /// Summarize the cycles selected by `cycles_between(from, to)`, numbered from zero.

    pub fn summary(&self, from: Option<Timestamp>, to: Option<Timestamp>, show_jobs: bool) -> Info {
        let cycles = self.cycles_between(from, to);
        let mut info = Info::new();
        let mut summary = Info::new();
        let mut num_run = 0;
        let mut num_failed = 0;
        let mut num_considered = 0;
        let mut run_times = vec![];
        let mut durations = vec![];
        let mut min_cycle: Option<(f64, Timestamp)> = None;
        let mut max_cycle: Option<(f64, Timestamp)> = None;
        let mut calendar_time = 0.0;
        let mut solver_time = 0.0;

        for (i, c) in cycles.iter().enumerate() {
            info.insert(i.to_string(), Value::Object(c.summary(show_jobs)));
            num_run += c.sched_job_run.len();
            run_times.extend(c.sched_job_run.values().copied());
            num_failed += c.run_failure.len();
            num_considered += c.num_considered;

            let d = c.duration.unwrap_or(0.0);
            if max_cycle.map_or(true, |(m, _)| d > m) {
                max_cycle = Some((d, c.start));
            }
            if min_cycle.map_or(true, |(m, _)| d < m) {
                min_cycle = Some((d, c.start));
            }
            durations.push(d);
            calendar_time += c.calendar_time();
            solver_time += c.solver_time();
        }

        let run_times = sorted_copy(&run_times);
        let sorted = sorted_copy(&durations);
        summary.insert(NUM_CYCLES.to_string(), Value::from(cycles.len()));
        summary.insert(NUM_JOBS_RUN.to_string(), Value::from(num_run));
        summary.insert(NUM_JOBS_FAILED_TO_RUN.to_string(), Value::from(num_failed));
        summary.insert(JOB_RUN_RATE.to_string(), rate_value(&run_times));
        summary.insert(NUM_JOBS_CONSIDERED.to_string(), Value::from(num_considered));
        if let (Some((mind, mint)), Some((maxd, maxt))) = (min_cycle, max_cycle) {
            let pct = |p: f64| duration_value(percentile(&sorted, p).unwrap_or(0.0));
            summary.insert(CYCLE_DURATION_MIN.to_string(), duration_value(mind));
            summary.insert(CYCLE_DURATION_MAX.to_string(), duration_value(maxd));
            summary.insert(CYCLE_DURATION_25P.to_string(), pct(0.25));
            summary.insert(
                CYCLE_DURATION_MEAN.to_string(),
                duration_value(mean(&sorted).unwrap_or(0.0)),
            );
            summary.insert(CYCLE_DURATION_MEDIAN.to_string(), pct(0.5));
            summary.insert(CYCLE_DURATION_75P.to_string(), pct(0.75));
            summary.insert(
                MIN_CYCLE_TIME.to_string(),
                Value::from(format_timestamp(mint, "%Y-%m-%d %H:%M:%S")),
            );
            summary.insert(
                MAX_CYCLE_TIME.to_string(),
                Value::from(format_timestamp(maxt, "%Y-%m-%d %H:%M:%S")),
            );
        }
        summary.insert(DURATION.to_string(), duration_value(durations.iter().sum()));
        summary.insert(TIME_TO_CALENDAR.to_string(), duration_value(calendar_time));
        summary.insert(SCHEDULER_SOLVER_TIME.to_string(), duration_value(solver_time));
        summary.insert(PBS_VERSION.to_string(), versions_value(&self.versions));

        info.insert(SUMMARY.to_string(), Value::Object(summary));
        info
    }
}

/// The scheduler log analyzer: the cycle reconstructor, optionally joined by the estimated start
/// time tracker.

pub struct SchedulerAnalyzer {
    pub reconstructor: CycleReconstructor,
    pub estimates: Option<EstimateTracker>,
    pub estimates_only: bool,
    pub show_jobs: bool,

    /// Bounds on the cycles that are summarized, see `CycleReconstructor::cycles_between`.
    pub cycle_range: (Option<Timestamp>, Option<Timestamp>),
}

impl SchedulerAnalyzer {
    pub fn new(show_jobs: bool, estimated_info: bool, estimated_info_only: bool) -> Result<SchedulerAnalyzer> {
        let estimates = if estimated_info || estimated_info_only {
            Some(EstimateTracker::new()?)
        } else {
            None
        };
        Ok(SchedulerAnalyzer {
            reconstructor: CycleReconstructor::new()?,
            estimates,
            estimates_only: estimated_info_only,
            show_jobs,
            cycle_range: (None, None),
        })
    }

    pub fn cycles(&self) -> &[SchedulingCycle] {
        &self.reconstructor.cycles
    }

    pub fn cycles_mut(&mut self) -> &mut [SchedulingCycle] {
        &mut self.reconstructor.cycles
    }

    pub fn summary(&self) -> Info {
        let mut info = Info::new();
        if let Some(e) = &self.estimates {
            info.insert(ESTIMATES.to_string(), Value::Object(e.summary()));
            if self.estimates_only {
                return info;
            }
        }
        let (from, to) = self.cycle_range;
        info.extend(self.reconstructor.summary(from, to, self.show_jobs));
        info
    }
}

impl LineAnalyzer for SchedulerAnalyzer {
    fn analyze_line(&mut self, line: &str, window: &TimeWindow) -> ParseStatus {
        if let Some(e) = &mut self.estimates {
            let rv = e.analyze_line(line, window);
            if self.estimates_only {
                return rv;
            }
        }

        let r = &mut self.reconstructor;
        let Some(t) = r.record_time.of(line) else {
            return ParseStatus::Continue;
        };
        match window.gate(t) {
            Some(ParseStatus::Continue) => {}
            Some(status) => return status,
            None => return ParseStatus::Continue,
        }
        if let Some(rec) = r.table.classify(line) {
            r.apply(&rec);
        }
        note_version(&mut r.versions, line);
        ParseStatus::Continue
    }

    fn end_of_file(&mut self, last_line: Option<&str>) {
        self.reconstructor.end_of_stream(last_line);
    }
}

#[cfg(test)]
use pbsutils::parse_timestamp;

#[cfg(test)]
fn t(s: &str) -> Timestamp {
    parse_timestamp(s, None).unwrap()
}

#[cfg(test)]
fn feed(lines: &[&str]) -> SchedulerAnalyzer {
    let mut a = SchedulerAnalyzer::new(true, false, false).unwrap();
    for l in lines {
        a.analyze_line(l, &TimeWindow::default());
    }
    a.end_of_file(lines.last().copied());
    a
}

#[test]
fn test_basic_cycle() {
    let a = feed(&[
        "01/15/2024 10:00:00;0080;pbs_sched;Req;;Starting Scheduling Cycle",
        "01/15/2024 10:00:01;0400;pbs_sched;Job;1.pbs01;Considering job to run",
        "01/15/2024 10:00:04;0040;pbs_sched;Job;1.pbs01;Job run",
        "01/15/2024 10:00:10;0080;pbs_sched;Req;;Leaving Scheduling Cycle",
    ]);
    let cycles = a.cycles();
    assert!(cycles.len() == 1);
    let c = &cycles[0];
    let j1 = Ustr::from("1.pbs01");
    assert!(c.runduration[&j1] == 3.0);
    assert!(c.duration == Some(10.0));
    assert!(c.end == Some(t("01/15/2024 10:00:10")));
    assert!(c.num_considered == 1);
    assert!(c.sched_job_run.len() == 1);
    assert!(c.queryduration == Some(1.0));
    assert!(c.cantrunduration.is_empty());
    assert!(a.reconstructor.state() == CycleState::NoActiveCycle);
}

#[test]
fn test_cycle_state() {
    let mut a = SchedulerAnalyzer::new(false, false, false).unwrap();
    let w = TimeWindow::default();
    a.analyze_line("01/15/2024 10:00:00;0080;pbs_sched;Req;;Starting Scheduling Cycle", &w);
    assert!(a.reconstructor.state() == CycleState::CycleOpen);
    a.analyze_line("01/15/2024 10:00:10;0080;pbs_sched;Req;;Leaving Scheduling Cycle", &w);
    assert!(a.reconstructor.state() == CycleState::NoActiveCycle);
    // Still attributed to the closed cycle
    a.analyze_line("01/15/2024 10:00:11;0040;pbs_sched;Job;1.pbs01;Job run", &w);
    assert!(a.cycles()[0].sched_job_run.contains_key(&Ustr::from("1.pbs01")));
    assert!(a.reconstructor.state() == CycleState::NoActiveCycle);
    a.analyze_line("01/15/2024 10:01:00;0080;pbs_sched;Req;;Starting Scheduling Cycle", &w);
    assert!(a.reconstructor.state() == CycleState::CycleOpen);
    a.analyze_line("01/15/2024 10:01:20;0080;pbs_sched;Req;;Scheduler received alarm", &w);
    assert!(a.reconstructor.state() == CycleState::NoActiveCycle);
}

#[test]
fn test_force_close() {
    let a = feed(&[
        "01/15/2024 10:00:00;0080;pbs_sched;Req;;Starting Scheduling Cycle",
        "01/15/2024 10:00:01;0400;pbs_sched;Job;1.pbs01;Considering job to run",
        "01/15/2024 10:00:30;0080;pbs_sched;Req;;Starting Scheduling Cycle",
        "01/15/2024 10:00:35;0080;pbs_sched;Req;;Leaving Scheduling Cycle",
    ]);
    let cycles = a.cycles();
    assert!(cycles.len() == 2);
    assert!(cycles[0].end == Some(cycles[1].start));
    assert!(cycles[0].duration.is_none());
    assert!(cycles[1].duration == Some(5.0));
}

#[test]
fn test_cant_run_and_calendar() {
    let a = feed(&[
        "01/15/2024 10:00:00;0080;pbs_sched;Req;;Starting Scheduling Cycle",
        "01/15/2024 10:00:01;0400;pbs_sched;Job;1.pbs01;Considering job to run",
        "01/15/2024 10:00:03;0400;pbs_sched;Job;2.pbs01;Considering job to run",
        "01/15/2024 10:00:04;0040;pbs_sched;Job;2.pbs01;Job is a top job and will run at Mon Jan 15 12:00:00 2024",
        "01/15/2024 10:00:06;0400;pbs_sched;Job;3.pbs01;Considering job to run",
        "01/15/2024 10:00:07;0040;pbs_sched;Job;4.pbs01;Job preempted by suspension",
        "01/15/2024 10:00:07;0040;pbs_sched;Job;5.pbs01;Job failed to be preempted",
        "01/15/2024 10:00:08;0040;pbs_sched;Job;3.pbs01;Failed to run: Insufficient resources",
        "01/15/2024 10:00:12;0080;pbs_sched;Req;;Leaving Scheduling Cycle",
    ]);
    let c = &a.cycles()[0];
    let j1 = Ustr::from("1.pbs01");
    let j2 = Ustr::from("2.pbs01");
    let j3 = Ustr::from("3.pbs01");
    // 1 gave up when 2 was considered
    assert!(c.cantrunduration[&j1] == 2.0);
    // 2 was calendared, so not a can't-run
    assert!(c.calendarduration[&j2] == 1.0);
    assert!(!c.cantrunduration.contains_key(&j2));
    // 3 never ran, resolved at the end of the cycle
    assert!(c.cantrunduration[&j3] == 6.0);
    assert!(c.run_failure.contains_key(&j3));
    assert!(c.num_preempted == 1);
    assert!(c.preempted_jobs[&j3] == vec![Ustr::from("4.pbs01")]);
    assert!(c.num_preempt_failure == 1);
    assert!(c.solver_time() == 9.0);
    assert!(c.political_order == vec![j1, j2, j3]);

    let s = c.summary(true);
    assert!(s[NUM_JOBS_CALENDARED] == 1);
    assert!(s[NUM_JOBS_FAILED_TO_RUN] == 1);
    assert!(s[SCHEDULER_SOLVER_TIME] == 9);
    assert!(s[CYCLE_DURATION] == "0:00:12");
    let jobs = s[JOBS].as_array().unwrap();
    assert!(jobs.len() == 3);
    assert!(jobs[0][JOB_ID] == "1.pbs01");
    assert!(jobs[0][TIME_TO_DISCARD] == 2);
    assert!(jobs[1][TIME_TO_CALENDAR] == 1);
}

#[test]
fn test_array_subjobs() {
    let a = feed(&[
        "01/15/2024 10:00:00;0080;pbs_sched;Req;;Starting Scheduling Cycle",
        "01/15/2024 10:00:01;0400;pbs_sched;Job;7[].pbs01;Considering job to run",
        "01/15/2024 10:00:02;0040;pbs_sched;Job;7[1].pbs01;Job run",
        "01/15/2024 10:00:04;0040;pbs_sched;Job;7[2].pbs01;Job is a top job and will run at Mon Jan 15 12:00:00 2024",
        "01/15/2024 10:00:05;0040;pbs_sched;Job;8[1].pbs01;Job run",
        "01/15/2024 10:00:06;0080;pbs_sched;Req;;Leaving Scheduling Cycle",
    ]);
    let c = &a.cycles()[0];
    assert!(c.runduration[&Ustr::from("7[1].pbs01")] == 1.0);
    assert!(c.calendarduration[&Ustr::from("7[2].pbs01")] == 3.0);
    assert!(c.consider[&Ustr::from("7[1].pbs01")] == c.consider[&Ustr::from("7[].pbs01")]);
    // No parent was considered
    assert!(!c.runduration.contains_key(&Ustr::from("8[1].pbs01")));
    assert!(c.sched_job_run.contains_key(&Ustr::from("8[1].pbs01")));
    // The array id was considered once
    assert!(c.num_considered == 1);

    assert!(array_parent("7[12].pbs01") == Some("7[].pbs01".to_string()));
    assert!(array_parent("7[].pbs01").is_none());
    assert!(array_parent("7.pbs01").is_none());
}

#[test]
fn test_alarm_and_end_of_stream() {
    let a = feed(&[
        "01/15/2024 10:00:00;0080;pbs_sched;Req;;Starting Scheduling Cycle",
        "01/15/2024 10:00:20;0080;pbs_sched;Req;;Scheduler received alarm",
        "01/15/2024 10:01:00;0080;pbs_sched;Req;;Starting Scheduling Cycle",
        "01/15/2024 10:01:01;0400;pbs_sched;Job;1.pbs01;Considering job to run",
        "01/15/2024 10:01:09;0001;pbs_sched;Svr;pbs_sched;something else",
    ]);
    let cycles = a.cycles();
    assert!(cycles.len() == 2);
    // The alarm resolved the end, so the second start did not overwrite it
    assert!(cycles[0].end == Some(t("01/15/2024 10:00:20")));
    assert!(cycles[0].duration.is_none());
    assert!(cycles[1].end == Some(t("01/15/2024 10:01:09")));
    assert!(cycles[1].duration.is_none());
}

#[test]
fn test_records_before_first_cycle() {
    let a = feed(&[
        "01/15/2024 09:59:59;0400;pbs_sched;Job;1.pbs01;Considering job to run",
        "01/15/2024 09:59:59;0080;pbs_sched;Req;;Leaving Scheduling Cycle",
    ]);
    assert!(a.cycles().is_empty());
    assert!(a.reconstructor.state() == CycleState::NoActiveCycle);
    let s = a.summary();
    assert!(s[SUMMARY][NUM_CYCLES] == 0);
    assert!(s[SUMMARY].get(CYCLE_DURATION_MIN).is_none());
}

#[test]
fn test_cycles_between() {
    let a = feed(&[
        "01/15/2024 10:00:00;0080;pbs_sched;Req;;Starting Scheduling Cycle",
        "01/15/2024 10:00:10;0080;pbs_sched;Req;;Leaving Scheduling Cycle",
        "01/15/2024 10:01:00;0080;pbs_sched;Req;;Starting Scheduling Cycle",
        "01/15/2024 10:01:10;0080;pbs_sched;Req;;Leaving Scheduling Cycle",
        "01/15/2024 10:02:00;0080;pbs_sched;Req;;Starting Scheduling Cycle",
        "01/15/2024 10:02:10;0080;pbs_sched;Req;;Leaving Scheduling Cycle",
    ]);
    let r = &a.reconstructor;
    assert!(r.cycles_between(None, None).len() == 3);
    assert!(r.cycles_between(Some(t("01/15/2024 10:01:00")), None).len() == 2);
    assert!(r.cycles_between(Some(t("01/15/2024 10:01:00")), Some(t("01/15/2024 10:01:10"))).is_empty());
    assert!(r.cycles_between(Some(t("01/15/2024 10:01:00")), Some(t("01/15/2024 10:01:11"))).len() == 1);
    assert!(r.cycles_between(None, Some(t("01/15/2024 10:01:11"))).len() == 2);
}

#[test]
fn test_scheduler_summary() {
    let mut a = SchedulerAnalyzer::new(false, false, false).unwrap();
    crate::logfile::analyze_paths(&["../tests/pbslog/sched.log".to_string()], &mut a, &TimeWindow::default()).unwrap();
    let s = a.summary();
    let sum = &s[SUMMARY];
    assert!(sum[NUM_CYCLES] == 3);
    assert!(sum[NUM_JOBS_RUN] == 3);
    assert!(sum[NUM_JOBS_FAILED_TO_RUN] == 1);
    assert!(sum[NUM_JOBS_CONSIDERED] == 5);
    assert!(sum[CYCLE_DURATION_MIN] == "0:00:05");
    assert!(sum[CYCLE_DURATION_MAX] == "0:00:20");
    assert!(sum[CYCLE_DURATION_MEDIAN] == "0:00:10");
    assert!(sum[CYCLE_DURATION_MEAN] == "0:00:11");
    assert!(sum[DURATION] == "0:00:35");
    assert!(sum[PBS_VERSION] == "2022.1.3");
    assert!(sum[MIN_CYCLE_TIME] == "2024-01-15 10:10:00");
    assert!(s["0"][NUM_JOBS_RUN] == 1);
    assert!(s["0"].get(JOBS).is_none());
    // Summarizing does not change anything
    assert!(a.summary() == s);

    // Only the cycles that started at 10:05 or later and have ended
    a.cycle_range = (Some(t("01/15/2024 10:05:00")), None);
    let s = a.summary();
    assert!(s[SUMMARY][NUM_CYCLES] == 2);
    assert!(s[SUMMARY][MIN_CYCLE_TIME] == "2024-01-15 10:10:00");
    assert!(s[SUMMARY][DURATION] == "0:00:25");
    assert!(s.get("2").is_none());
}

#[test]
fn test_window() {
    let mut a = SchedulerAnalyzer::new(false, false, false).unwrap();
    let w = TimeWindow::new(Some(t("01/15/2024 10:05:00")), Some(t("01/15/2024 10:15:00")));
    crate::logfile::analyze_paths(&["../tests/pbslog/sched.log".to_string()], &mut a, &w).unwrap();
    assert!(a.cycles().len() == 1);
    assert!(a.cycles()[0].start == t("01/15/2024 10:10:00"));
}
