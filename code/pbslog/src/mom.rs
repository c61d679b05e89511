/// Track job events in a PBS mom log.  The mom sees jobs only as they arrive at, start on and leave
/// its node, so there are three independent series and no per-job reconciliation.
use crate::keys::*;
use crate::logfile::{LineAnalyzer, ParseStatus, TimeWindow};
use crate::records::{mom_patterns, MomRecordKind, PatternTable, RecordTime};
use crate::summary::{note_version, rate_value, sorted_copy, versions_value, Info};

use anyhow::Result;
use pbsutils::Timestamp;
use serde_json::Value;

pub struct MomTracker {
    pub started: Vec<Timestamp>,
    pub ended: Vec<Timestamp>,
    pub queued: Vec<Timestamp>,
    pub versions: Vec<String>,
    table: PatternTable<MomRecordKind>,
    record_time: RecordTime,
}

impl MomTracker {
    pub fn new() -> Result<MomTracker> {
        Ok(MomTracker {
            started: vec![],
            ended: vec![],
            queued: vec![],
            versions: vec![],
            table: mom_patterns()?,
            record_time: RecordTime::new()?,
        })
    }

    pub fn summary(&self) -> Info {
        let started = sorted_copy(&self.started);
        let ended = sorted_copy(&self.ended);
        let queued = sorted_copy(&self.queued);
        let mut info = Info::new();
        info.insert(NUM_JOBS_QUEUED.to_string(), Value::from(queued.len()));
        info.insert(NUM_JOBS_RUN.to_string(), Value::from(started.len()));
        info.insert(NUM_JOBS_ENDED.to_string(), Value::from(ended.len()));
        info.insert(JOB_RUN_RATE.to_string(), rate_value(&started));
        info.insert(JOB_SUBMIT_RATE.to_string(), rate_value(&queued));
        info.insert(JOB_END_RATE.to_string(), rate_value(&ended));
        info.insert(PBS_VERSION.to_string(), versions_value(&self.versions));
        info
    }
}

impl LineAnalyzer for MomTracker {
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
        if let Some(rec) = self.table.classify(line) {
            match rec.kind {
                MomRecordKind::JobStarted => self.started.push(rec.time),
                MomRecordKind::JobEnded => self.ended.push(rec.time),
                MomRecordKind::JobQueued => self.queued.push(rec.time),
            }
        }
        ParseStatus::Continue
    }
}

#[test]
fn test_mom_tracker() {
    let mut m = MomTracker::new().unwrap();
    crate::logfile::analyze_paths(&["../tests/pbslog/mom.log".to_string()], &mut m, &TimeWindow::default()).unwrap();
    let info = m.summary();
    assert!(info[NUM_JOBS_QUEUED] == 3);
    assert!(info[NUM_JOBS_RUN] == 3);
    assert!(info[NUM_JOBS_ENDED] == 2);
    assert!(info[PBS_VERSION] == "2022.1.3,2024.1.0");
    // Three starts within two minutes
    assert!(info[JOB_RUN_RATE] == "1.50/mn");
    assert!(m.summary() == info);
}

#[test]
fn test_mom_window() {
    let mut m = MomTracker::new().unwrap();
    let w = TimeWindow::new(None, pbsutils::parse_timestamp("01/15/2024 10:01:30", None));
    crate::logfile::analyze_paths(&["../tests/pbslog/mom.log".to_string()], &mut m, &w).unwrap();
    assert!(m.started.len() == 2);
    assert!(m.ended.is_empty());
    assert!(m.versions == vec!["2022.1.3".to_string()]);
}
