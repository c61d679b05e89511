/// Track job lifecycles in a PBS server log.
///
/// The server logs when a job is enqueued, when it is run and when it exits.  From those we get
/// the wait time (enqueue to first run after it) and the run time (most recent run to exit) of each
/// job, plus the rates of the three events.  A job may be run more than once, after a requeue, and
/// may appear with only some of its events when the log starts or ends while the job is alive.
use crate::keys::*;
use crate::logfile::{LineAnalyzer, ParseStatus, TimeWindow};
use crate::records::{server_patterns, PatternTable, RecordTime, ServerRecordKind};
use crate::summary::{duration_ladder, note_version, rate_value, sorted_copy, versions_value, Info};

use anyhow::Result;
use pbsutils::Timestamp;
use serde_json::Value;
use std::collections::HashMap;
use ustr::Ustr;

pub struct ServerTracker {
    pub job_queued: HashMap<Ustr, Timestamp>,
    pub job_run: HashMap<Ustr, Vec<Timestamp>>,
    pub job_end: HashMap<Ustr, Vec<Timestamp>>,
    pub node_up: Vec<Timestamp>,
    pub enqueued: Vec<Timestamp>,
    pub runs: Vec<Timestamp>,
    pub ends: Vec<Timestamp>,
    pub wait_time: Vec<f64>,
    pub run_time: Vec<f64>,
    pub versions: Vec<String>,
    table: PatternTable<ServerRecordKind>,
    record_time: RecordTime,
}

impl ServerTracker {
    pub fn new() -> Result<ServerTracker> {
        Ok(ServerTracker {
            job_queued: HashMap::new(),
            job_run: HashMap::new(),
            job_end: HashMap::new(),
            node_up: vec![],
            enqueued: vec![],
            runs: vec![],
            ends: vec![],
            wait_time: vec![],
            run_time: vec![],
            versions: vec![],
            table: server_patterns()?,
            record_time: RecordTime::new()?,
        })
    }

    /// The times each job was run, for correlating with scheduler cycles.
    pub fn server_job_run(&self) -> &HashMap<Ustr, Vec<Timestamp>> {
        &self.job_run
    }

    pub fn summary(&self) -> Info {
        let enqueued = sorted_copy(&self.enqueued);
        let runs = sorted_copy(&self.runs);
        let ends = sorted_copy(&self.ends);
        let node_up = sorted_copy(&self.node_up);

        let mut info = Info::new();
        info.insert(JOB_SUBMIT_RATE.to_string(), rate_value(&enqueued));
        info.insert(NUM_JOBS_ENDED.to_string(), Value::from(self.job_end.len()));
        info.insert(NUM_JOBS_QUEUED.to_string(), Value::from(enqueued.len()));
        info.insert(NODE_UP_RATE.to_string(), rate_value(&node_up));
        info.insert(JOB_RUN_RATE.to_string(), rate_value(&runs));
        info.insert(JOB_END_RATE.to_string(), rate_value(&ends));
        if let (Some(first), Some(last)) = (enqueued.first(), ends.last()) {
            let span = last - first;
            if span > 0.0 {
                info.insert(
                    JOB_THROUGHPUT.to_string(),
                    Value::from(format!("{:.2}/s", self.job_end.len() as f64 / span)),
                );
            }
        }
        duration_ladder(&mut info, &JOB_WAIT_TIME, &self.wait_time);
        info.insert(NUM_JOBS_RUN.to_string(), Value::from(runs.len()));
        info.insert(PBS_VERSION.to_string(), versions_value(&self.versions));
        duration_ladder(&mut info, &JOB_RUN_TIME, &self.run_time);
        info
    }
}

impl LineAnalyzer for ServerTracker {
    fn analyze_line(&mut self, line: &str, window: &TimeWindow) -> ParseStatus {
        let Some(t) = self.record_time.of(line) else {
            return ParseStatus::Continue;
        };
        match window.gate(t) {
            Some(ParseStatus::Continue) => {}
            Some(status) => return status,
            None => return ParseStatus::Continue,
        }
        note_version(&mut self.versions, line);

        let Some(rec) = self.table.classify(line) else {
            return ParseStatus::Continue;
        };
        let t = rec.time;
        if rec.kind == ServerRecordKind::NodeUp {
            self.node_up.push(t);
            return ParseStatus::Continue;
        }
        let Some(jid) = rec.job_id().map(Ustr::from) else {
            return ParseStatus::Continue;
        };
        match rec.kind {
            ServerRecordKind::JobEnqueued => {
                self.job_queued.insert(jid, t);
                self.enqueued.push(t);
            }
            ServerRecordKind::JobRun => {
                if let Some(q) = self.job_queued.get(&jid) {
                    self.wait_time.push(t - q);
                }
                self.job_run.entry(jid).or_default().push(t);
                self.runs.push(t);
            }
            ServerRecordKind::JobEnded => {
                if let Some(r) = self.job_run.get(&jid).and_then(|rs| rs.last()) {
                    self.run_time.push(t - r);
                }
                self.job_end.entry(jid).or_default().push(t);
                self.ends.push(t);
            }
            ServerRecordKind::NodeUp => {}
        }
        ParseStatus::Continue
    }
}

#[test]
fn test_server_tracker() {
    let mut s = ServerTracker::new().unwrap();
    crate::logfile::analyze_paths(&["../tests/pbslog/server.log".to_string()], &mut s, &TimeWindow::default()).unwrap();
    assert!(s.enqueued.len() == 3);
    assert!(s.runs.len() == 3);
    assert!(s.ends.len() == 2);
    assert!(s.node_up.len() == 2);
    // 100 waited 60s, 101 waited 120s, 99 was enqueued before the log started
    assert!(sorted_copy(&s.wait_time) == vec![60.0, 120.0]);
    // 100 ran 3600s, 101 ran 1800s
    assert!(sorted_copy(&s.run_time) == vec![1800.0, 3600.0]);
    assert!(s.server_job_run()[&Ustr::from("100.pbs01")].len() == 1);

    let info = s.summary();
    assert!(info[NUM_JOBS_QUEUED] == 3);
    assert!(info[NUM_JOBS_RUN] == 3);
    assert!(info[NUM_JOBS_ENDED] == 2);
    assert!(info[PBS_VERSION] == "2022.1.3");
    assert!(info["job_wait_time_min"] == "0:01:00");
    assert!(info["job_wait_time_max"] == "0:02:00");
    assert!(info["job_run_time_mean"] == "0:45:00");
    assert!(info.get(JOB_THROUGHPUT).is_some());
    assert!(s.summary() == info);
}

#[test]
fn test_server_window() {
    let mut s = ServerTracker::new().unwrap();
    let w = TimeWindow::new(
        pbsutils::parse_timestamp("01/15/2024 09:59:00", None),
        pbsutils::parse_timestamp("01/15/2024 10:30:00", None),
    );
    crate::logfile::analyze_paths(&["../tests/pbslog/server.log".to_string()], &mut s, &w).unwrap();
    assert!(s.versions.is_empty());
    assert!(s.ends.is_empty());
    assert!(s.enqueued.len() == 2);
    let info = s.summary();
    assert!(info[JOB_END_RATE] == 0);
    assert!(info.get(JOB_THROUGHPUT).is_none());
    assert!(info.get("job_run_time_min").is_none());
}
