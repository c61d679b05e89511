/// Track the scheduler's estimated start times for top jobs.
///
/// Each time a job is calendared the scheduler logs when it expects the job to start.  The series
/// of estimates for a job shows how the expectation moved, and the time the job actually ran shows
/// how good the last estimate was.  Only forward movement counts as drift: an estimate that moves
/// earlier is recorded but does not reduce the drift time.
use crate::keys::*;
use crate::logfile::{LineAnalyzer, ParseStatus, TimeWindow};
use crate::records::{estimate_patterns, EstimateRecordKind, PatternTable, RecordTime};
use crate::summary::{number_value, sorted_copy, Info};

use anyhow::Result;
use pbsutils::{format_timestamp, mean, middle, parse_timestamp, Timestamp, CTIME_FORMAT};
use serde_json::Value;
use std::collections::HashMap;
use tracing::error;
use ustr::Ustr;

#[derive(Debug, Clone)]
pub struct JobEstimatedStartTimeInfo {
    pub job_id: Ustr,
    pub started_at: Option<Timestamp>,
    pub estimated_at: Vec<Timestamp>,
    pub num_drifts: usize,
    pub num_estimates: usize,
    pub drift_time: f64,
}

impl JobEstimatedStartTimeInfo {
    pub fn new(job_id: Ustr) -> JobEstimatedStartTimeInfo {
        JobEstimatedStartTimeInfo {
            job_id,
            started_at: None,
            estimated_at: vec![],
            num_drifts: 0,
            num_estimates: 0,
            drift_time: 0.0,
        }
    }

    pub fn add_estimate(&mut self, t: Timestamp) {
        if let Some(prev) = self.estimated_at.last() {
            if t > *prev {
                self.num_drifts += 1;
                self.drift_time += t - prev;
            }
        }
        self.estimated_at.push(t);
        self.num_estimates += 1;
    }

    pub fn summary(&self) -> Info {
        let fmt = |t: Timestamp| Value::from(format_timestamp(t, "%Y-%m-%d %H:%M:%S"));
        let mut info = Info::new();
        info.insert(JOB_ID.to_string(), Value::from(self.job_id.as_str()));
        info.insert(
            ESTIMATED.to_string(),
            Value::Array(self.estimated_at.iter().map(|t| fmt(*t)).collect()),
        );
        if let (Some(started), Some(last)) = (self.started_at, self.estimated_at.last()) {
            let sorted = sorted_copy(&self.estimated_at);
            info.insert(JOB_START_TIME.to_string(), fmt(started));
            info.insert(
                ESTIMATED_START_TIME_RANGE.to_string(),
                number_value(sorted[sorted.len() - 1] - sorted[0]),
            );
            info.insert(ESTIMATED_START_TIME_ACCURACY.to_string(), number_value(started - last));
        }
        info.insert(NUM_ESTIMATES.to_string(), Value::from(self.num_estimates));
        info.insert(NUM_DRIFTS.to_string(), Value::from(self.num_drifts));
        info.insert(JOB_DRIFT_DURATION.to_string(), number_value(self.drift_time));
        info
    }
}

pub struct EstimateTracker {
    pub jobs: HashMap<Ustr, JobEstimatedStartTimeInfo>,
    order: Vec<Ustr>,

    /// Set when an estimate could not be understood; nothing more is tracked after that.
    stopped: bool,

    table: PatternTable<EstimateRecordKind>,
    record_time: RecordTime,
}

impl EstimateTracker {
    pub fn new() -> Result<EstimateTracker> {
        Ok(EstimateTracker {
            jobs: HashMap::new(),
            order: vec![],
            stopped: false,
            table: estimate_patterns()?,
            record_time: RecordTime::new()?,
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn job(&mut self, job_id: Ustr) -> &mut JobEstimatedStartTimeInfo {
        let order = &mut self.order;
        self.jobs.entry(job_id).or_insert_with(|| {
            order.push(job_id);
            JobEstimatedStartTimeInfo::new(job_id)
        })
    }

    /// Jobs in order of first appearance.
    pub fn jobs_in_order(&self) -> impl Iterator<Item = &JobEstimatedStartTimeInfo> {
        self.order.iter().filter_map(|j| self.jobs.get(j))
    }

    pub fn summary(&self) -> Info {
        let mut jobs = vec![];
        let mut drifts = vec![];
        let mut num_drifted = 0;
        let mut sub_15mn = 0;
        let mut sub_1hr = 0;
        let mut sub_3hr = 0;
        let mut over_3hr = 0;
        let mut no_drift = 0;
        for j in self.jobs_in_order() {
            if j.estimated_at.is_empty() {
                continue;
            }
            jobs.push(Value::Object(j.summary()));
            let d = j.drift_time;
            drifts.push(d);
            if d > 0.0 {
                num_drifted += 1;
                if d < 900.0 {
                    sub_15mn += 1;
                } else if d < 3600.0 {
                    sub_1hr += 1;
                } else if d < 10800.0 {
                    sub_3hr += 1;
                } else {
                    over_3hr += 1;
                }
            } else {
                no_drift += 1;
            }
        }

        let mut s = Info::new();
        s.insert(DRIFTED_SUB_15MN.to_string(), Value::from(sub_15mn));
        s.insert(DRIFTED_SUB_1HR.to_string(), Value::from(sub_1hr));
        s.insert(DRIFTED_SUB_3HR.to_string(), Value::from(sub_3hr));
        s.insert(DRIFTED_OVER_3HR.to_string(), Value::from(over_3hr));
        s.insert(NUM_JOBS_DRIFTED.to_string(), Value::from(num_drifted));
        s.insert(NUM_JOBS_NO_DRIFT.to_string(), Value::from(no_drift));
        // Undrifted jobs count as zero in the duration statistics.
        let sorted = sorted_copy(&drifts);
        if let (Some(min), Some(max)) = (sorted.first(), sorted.last()) {
            s.insert(DRIFT_DURATION_MIN.to_string(), number_value(*min));
            s.insert(DRIFT_DURATION_MAX.to_string(), number_value(*max));
            s.insert(
                DRIFT_DURATION_MEAN.to_string(),
                number_value(mean(&sorted).unwrap_or(0.0)),
            );
            s.insert(
                DRIFT_DURATION_MEDIAN.to_string(),
                number_value(middle(&sorted).unwrap_or(0.0)),
            );
        }

        let mut info = Info::new();
        info.insert(ESTIMATED_JOBS.to_string(), Value::Array(jobs));
        info.insert(ESTIMATED_START_TIME_SUMMARY.to_string(), Value::Object(s));
        info
    }
}

impl LineAnalyzer for EstimateTracker {
    fn analyze_line(&mut self, line: &str, window: &TimeWindow) -> ParseStatus {
        if self.stopped {
            return ParseStatus::Continue;
        }
        let Some(t) = self.record_time.of(line) else {
            return ParseStatus::Continue;
        };
        match window.gate(t) {
            Some(ParseStatus::Continue) => {}
            Some(status) => return status,
            None => return ParseStatus::Continue,
        }
        let Some(rec) = self.table.classify(line) else {
            return ParseStatus::Continue;
        };
        let Some(job_id) = rec.job_id().map(Ustr::from) else {
            return ParseStatus::Continue;
        };
        match rec.kind {
            EstimateRecordKind::JobRun => {
                self.job(job_id).started_at = Some(rec.time);
            }
            EstimateRecordKind::Estimated => {
                let est = rec.field("est_tm").unwrap_or("").trim();
                match parse_timestamp(est, Some(CTIME_FORMAT)) {
                    Some(et) => self.job(job_id).add_estimate(et),
                    None => {
                        error!(job = job_id.as_str(), time = est, "unparseable estimated start time");
                        self.stopped = true;
                        return ParseStatus::ErrorStop;
                    }
                }
            }
        }
        ParseStatus::Continue
    }
}

#[cfg(test)]
fn t(s: &str) -> Timestamp {
    parse_timestamp(s, None).unwrap()
}

#[test]
fn test_drift() {
    let mut j = JobEstimatedStartTimeInfo::new(Ustr::from("1.pbs01"));
    j.add_estimate(100.0);
    j.add_estimate(150.0);
    j.add_estimate(120.0);
    assert!(j.num_drifts == 1);
    assert!(j.drift_time == 50.0);
    assert!(j.num_estimates == 3);
    assert!(j.estimated_at == vec![100.0, 150.0, 120.0]);
}

#[test]
fn test_tracker() {
    let mut e = EstimateTracker::new().unwrap();
    let w = TimeWindow::default();
    let lines = [
        "01/15/2024 10:00:03;0040;pbs_sched;Job;5.pbs01;Job is a top job and will run at Mon Jan 15 12:00:00 2024",
        "01/15/2024 10:10:03;0040;pbs_sched;Job;6.pbs01;Job is a top job and will run at Mon Jan 15 13:00:00 2024",
        "01/15/2024 10:20:03;0040;pbs_sched;Job;5.pbs01;Job is a top job and will run at Mon Jan 15 12:10:00 2024",
        "01/15/2024 10:30:03;0040;pbs_sched;Job;6.pbs01;Job is a top job and will run at Mon Jan 15 12:50:00 2024",
        "01/15/2024 12:12:00;0040;pbs_sched;Job;5.pbs01;Job run",
        "01/15/2024 12:13:00;0040;pbs_sched;Job;7.pbs01;Job run",
    ];
    for l in lines {
        assert!(e.analyze_line(l, &w) == ParseStatus::Continue);
    }
    let j5 = &e.jobs[&Ustr::from("5.pbs01")];
    assert!(j5.num_drifts == 1);
    assert!(j5.drift_time == 600.0);
    assert!(j5.started_at == Some(t("01/15/2024 12:12:00")));
    let j6 = &e.jobs[&Ustr::from("6.pbs01")];
    assert!(j6.num_drifts == 0);
    assert!(j6.started_at.is_none());

    let s = e.summary();
    let jobs = s[ESTIMATED_JOBS].as_array().unwrap();
    // 7 ran but was never estimated
    assert!(jobs.len() == 2);
    assert!(jobs[0][JOB_ID] == "5.pbs01");
    assert!(jobs[0][ESTIMATED_START_TIME_RANGE] == 600);
    assert!(jobs[0][ESTIMATED_START_TIME_ACCURACY] == 120);
    assert!(jobs[0][ESTIMATED].as_array().unwrap().len() == 2);
    assert!(jobs[1].get(JOB_START_TIME).is_none());
    let sum = &s[ESTIMATED_START_TIME_SUMMARY];
    assert!(sum[DRIFTED_SUB_15MN] == 1);
    assert!(sum[NUM_JOBS_DRIFTED] == 1);
    assert!(sum[NUM_JOBS_NO_DRIFT] == 1);
    assert!(sum[DRIFT_DURATION_MEDIAN] == 600);
}

#[test]
fn test_buckets() {
    let mut e = EstimateTracker::new().unwrap();
    for (i, d) in [0.0, 300.0, 900.0, 3600.0, 20000.0].iter().enumerate() {
        let j = e.job(Ustr::from(format!("{i}.pbs01").as_str()));
        j.add_estimate(1000.0);
        j.add_estimate(1000.0 + d);
    }
    let s = e.summary();
    let sum = &s[ESTIMATED_START_TIME_SUMMARY];
    assert!(sum[NUM_JOBS_NO_DRIFT] == 1);
    assert!(sum[DRIFTED_SUB_15MN] == 1);
    assert!(sum[DRIFTED_SUB_1HR] == 1);
    assert!(sum[DRIFTED_SUB_3HR] == 1);
    assert!(sum[DRIFTED_OVER_3HR] == 1);
    assert!(sum[NUM_JOBS_DRIFTED] == 4);
    assert!(sum[DRIFT_DURATION_MIN] == 0);
    assert!(sum[DRIFT_DURATION_MAX] == 20000);
    // 0, 300, 900, 3600, 20000: the element at index 2
    assert!(sum[DRIFT_DURATION_MEDIAN] == 900);
    assert!(sum[DRIFT_DURATION_MEAN] == 4960);
}

#[test]
fn test_drift_stats_include_undrifted() {
    let mut e = EstimateTracker::new().unwrap();
    for (i, d) in [0.0, 600.0].iter().enumerate() {
        let j = e.job(Ustr::from(format!("{i}.pbs01").as_str()));
        j.add_estimate(5000.0);
        j.add_estimate(5000.0 + d);
    }
    let s = e.summary();
    let sum = &s[ESTIMATED_START_TIME_SUMMARY];
    assert!(sum[NUM_JOBS_DRIFTED] == 1);
    assert!(sum[NUM_JOBS_NO_DRIFT] == 1);
    assert!(sum[DRIFT_DURATION_MIN] == 0);
    assert!(sum[DRIFT_DURATION_MAX] == 600);
    assert!(sum[DRIFT_DURATION_MEAN] == 300);
    assert!(sum[DRIFT_DURATION_MEDIAN] == 600);
}

#[test]
fn test_bad_estimate_stops() {
    let mut e = EstimateTracker::new().unwrap();
    let w = TimeWindow::default();
    let rv = e.analyze_line(
        "01/15/2024 10:00:03;0040;pbs_sched;Job;5.pbs01;Job is a top job and will run at sometime soon",
        &w,
    );
    assert!(rv == ParseStatus::ErrorStop);
    assert!(e.is_stopped());
    let rv = e.analyze_line(
        "01/15/2024 10:00:04;0040;pbs_sched;Job;6.pbs01;Job is a top job and will run at Mon Jan 15 12:00:00 2024",
        &w,
    );
    assert!(rv == ParseStatus::Continue);
    assert!(e.jobs.is_empty());
}
