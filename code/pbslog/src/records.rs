/// Recognize PBS log lines as records of a known kind and pull out their fields.
///
/// Each log type has a fixed, ordered table of patterns.  A line is tested against the table in
/// order and the first pattern that matches decides the record kind; later patterns that would
/// also have matched are not consulted.  Several patterns overlap structurally (eg "Job is a top
/// job" is a prefix of the estimate message, and "alarm" can appear anywhere), so the order in
/// each table below is part of its meaning.
///
/// Every pattern is anchored at the start of the line with the record timestamp, which is always
/// captured as `datetime`.  A line whose timestamp can't be converted is dropped.  A line that
/// matches no pattern is not an error, it's just not interesting.
use pbsutils::{parse_timestamp, Timestamp};

use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;

pub const TIME_RE: &str = r"(?P<datetime>\d\d/\d\d/\d{4}\s\d\d:\d\d:\d\d(\.\d{6})?)";

/// The job id field, `;<digits and brackets>.<server>;`.

pub const JOB_RE: &str = r";(?P<jobid>[\d\[\d+\]]+\..*);";

/// As JOB_RE, but "Failed to run" messages can name array subjobs with empty brackets.

pub const FAIL_RE: &str = r";(?P<jobid>[\d\[\]]+\..*);";

#[derive(Debug, Clone)]
pub struct LogRecord<K> {
    pub kind: K,
    pub time: Timestamp,
    pub fields: HashMap<String, String>,
}

impl<K> LogRecord<K> {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    pub fn job_id(&self) -> Option<&str> {
        self.field("jobid")
    }
}

pub struct PatternTable<K> {
    patterns: Vec<(Regex, K)>,
}

impl<K: Copy> PatternTable<K> {
    /// Compile a table from (message pattern, kind) pairs.  Each message pattern is prefixed by
    /// the timestamp and an arbitrary gap.
    pub fn new(specs: &[(&str, K)]) -> Result<PatternTable<K>> {
        let mut patterns = vec![];
        for (body, kind) in specs {
            let re = Regex::new(&format!("^{TIME_RE}.*{body}"))?;
            patterns.push((re, *kind));
        }
        Ok(PatternTable { patterns })
    }

    pub fn classify(&self, line: &str) -> Option<LogRecord<K>> {
        for (re, kind) in &self.patterns {
            if let Some(caps) = re.captures(line) {
                let time = parse_timestamp(caps.name("datetime")?.as_str(), None)?;
                let mut fields = HashMap::new();
                for name in re.capture_names().flatten() {
                    if let Some(m) = caps.name(name) {
                        fields.insert(name.to_string(), m.as_str().to_string());
                    }
                }
                return Some(LogRecord {
                    kind: *kind,
                    time,
                    fields,
                });
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedRecordKind {
    CycleStart,
    CycleEnd,
    Alarm,
    JobConsidered,
    JobRun,
    JobRunFailed,
    PreemptFailed,
    JobPreempted,
    JobCalendared,
}

pub fn sched_patterns() -> Result<PatternTable<SchedRecordKind>> {
    use SchedRecordKind::*;
    PatternTable::new(&[
        ("Starting Scheduling", CycleStart),
        ("Leaving [(the )]*[sS]cheduling", CycleEnd),
        ("alarm", Alarm),
        (format!("{JOB_RE}Considering job to run").as_str(), JobConsidered),
        (format!("{JOB_RE}Job run").as_str(), JobRun),
        (format!("{FAIL_RE}Failed to run").as_str(), JobRunFailed),
        (";Job failed to be preempted", PreemptFailed),
        (format!("{JOB_RE}Job preempted").as_str(), JobPreempted),
        (format!("{JOB_RE}Job is a top job").as_str(), JobCalendared),
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateRecordKind {
    /// Carries `est_tm`, a ctime-format time.
    Estimated,
    JobRun,
}

pub fn estimate_patterns() -> Result<PatternTable<EstimateRecordKind>> {
    use EstimateRecordKind::*;
    PatternTable::new(&[
        (
            format!("{JOB_RE}Job is a top job and will run at (?P<est_tm>.*)").as_str(),
            Estimated,
        ),
        (format!("{JOB_RE}Job run").as_str(), JobRun),
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRecordKind {
    JobEnqueued,
    NodeUp,
    JobRun,
    JobEnded,
}

pub fn server_patterns() -> Result<PatternTable<ServerRecordKind>> {
    use ServerRecordKind::*;
    PatternTable::new(&[
        (format!("{JOB_RE}enqueuing into.*state Q ").as_str(), JobEnqueued),
        ("Node;.*;node up", NodeUp),
        (format!("{JOB_RE}Job Run at").as_str(), JobRun),
        (format!("{JOB_RE}Exit_status").as_str(), JobEnded),
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomRecordKind {
    JobStarted,
    JobEnded,
    /// A queue-job request; these carry no job id.
    JobQueued,
}

pub fn mom_patterns() -> Result<PatternTable<MomRecordKind>> {
    use MomRecordKind::*;
    PatternTable::new(&[
        (format!("{JOB_RE}Started, pid").as_str(), JobStarted),
        (format!("{JOB_RE}delete job request received").as_str(), JobEnded),
        (";Type 5 ", JobQueued),
    ])
}

/// Recognizes just the leading timestamp of a scheduler/server/mom/generic record.

pub struct RecordTime {
    re: Regex,
}

impl RecordTime {
    pub fn new() -> Result<RecordTime> {
        Ok(RecordTime {
            re: Regex::new(&format!("^{TIME_RE}"))?,
        })
    }

    /// None both for lines without a timestamp and for timestamps that can't be converted.
    pub fn of(&self, line: &str) -> Option<Timestamp> {
        let caps = self.re.captures(line)?;
        parse_timestamp(caps.name("datetime")?.as_str(), None)
    }
}

/// The text after `pbs_version=`, trimmed, if the line has it.  Not anchored: a version banner can
/// co-occur with any record kind.

pub fn pbs_version(line: &str) -> Option<&str> {
    line.split_once("pbs_version=").map(|(_, v)| v.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountingKind {
    Queued,
    Started,
    Ended,
    Deleted,
    Other(char),
}

#[derive(Debug, Clone)]
pub struct AccountingRecord {
    pub kind: AccountingKind,
    pub time: Timestamp,
    pub id: String,
    pub msg: String,
}

/// Accounting records are `MM/DD/YYYY HH:MM:SS;<type>;<id>;<key=value ...>`.  Some writers put a
/// ';' between the date and the time, which is accepted too.

pub struct AccountingParser {
    re: Regex,
}

impl AccountingParser {
    pub fn new() -> Result<AccountingParser> {
        Ok(AccountingParser {
            re: Regex::new(
                r"^(?P<date>\d\d/\d\d/\d{4})[\s;]+(?P<time>\d\d:\d\d:\d\d);(?P<type>[A-Z]);(?P<id>[0-9\[\]][^;]*);(?P<msg>.*)",
            )?,
        })
    }

    pub fn parse(&self, line: &str) -> Option<AccountingRecord> {
        let caps = self.re.captures(line)?;
        let stamp = format!("{} {}", caps.name("date")?.as_str(), caps.name("time")?.as_str());
        let time = parse_timestamp(&stamp, None)?;
        let kind = match caps.name("type")?.as_str().chars().next()? {
            'Q' => AccountingKind::Queued,
            'S' => AccountingKind::Started,
            'E' => AccountingKind::Ended,
            'D' => AccountingKind::Deleted,
            c => AccountingKind::Other(c),
        };
        Some(AccountingRecord {
            kind,
            time,
            id: caps.name("id")?.as_str().to_string(),
            msg: caps.name("msg")?.as_str().to_string(),
        })
    }
}

/// Split a `key=value key=value ...` blob into its pairs, in order.  The value is everything after
/// the first '='.  None if any token lacks a '='.

pub fn parse_attributes(msg: &str) -> Option<Vec<(&str, &str)>> {
    msg.split_whitespace().map(|t| t.split_once('=')).collect()
}

#[cfg(test)]
fn t(s: &str) -> Timestamp {
    parse_timestamp(s, None).unwrap()
}

#[test]
fn test_sched_patterns() {
    let table = sched_patterns().unwrap();
    let r = table
        .classify("01/15/2024 10:00:00;0080;pbs_sched;Req;;Starting Scheduling Cycle")
        .unwrap();
    assert!(r.kind == SchedRecordKind::CycleStart);
    assert!(r.time == t("01/15/2024 10:00:00"));

    let r = table
        .classify("01/15/2024 10:00:05;0080;pbs_sched;Req;;Leaving Scheduling Cycle")
        .unwrap();
    assert!(r.kind == SchedRecordKind::CycleEnd);
    let r = table
        .classify("01/15/2024 10:00:05;0080;pbs_sched;Req;;Leaving the scheduling cycle")
        .unwrap();
    assert!(r.kind == SchedRecordKind::CycleEnd);

    let r = table
        .classify("01/15/2024 10:00:01;0400;pbs_sched;Job;1234.pbs01;Considering job to run")
        .unwrap();
    assert!(r.kind == SchedRecordKind::JobConsidered);
    assert!(r.job_id() == Some("1234.pbs01"));

    let r = table
        .classify("01/15/2024 10:00:02;0040;pbs_sched;Job;1234[7].pbs01;Job run")
        .unwrap();
    assert!(r.kind == SchedRecordKind::JobRun);
    assert!(r.job_id() == Some("1234[7].pbs01"));

    let r = table
        .classify("01/15/2024 10:00:02;0040;pbs_sched;Job;99[].pbs01;Failed to run: Not enough free nodes")
        .unwrap();
    assert!(r.kind == SchedRecordKind::JobRunFailed);
    assert!(r.job_id() == Some("99[].pbs01"));

    let r = table
        .classify("01/15/2024 10:00:03;0040;pbs_sched;Job;55.pbs01;Job is a top job and will run at Mon Jan 15 12:00:00 2024")
        .unwrap();
    assert!(r.kind == SchedRecordKind::JobCalendared);

    let r = table
        .classify("01/15/2024 10:00:03;0040;pbs_sched;Job;77.pbs01;Job preempted by suspension")
        .unwrap();
    assert!(r.kind == SchedRecordKind::JobPreempted);
    assert!(r.job_id() == Some("77.pbs01"));

    let r = table
        .classify("01/15/2024 10:00:03;0040;pbs_sched;Job;77.pbs01;Job failed to be preempted")
        .unwrap();
    assert!(r.kind == SchedRecordKind::PreemptFailed);

    let r = table
        .classify("01/15/2024 10:00:04;0080;pbs_sched;Req;;Scheduler received alarm, ending cycle")
        .unwrap();
    assert!(r.kind == SchedRecordKind::Alarm);

    // Microseconds
    let r = table
        .classify("01/15/2024 10:00:00.500000;0080;pbs_sched;Req;;Starting Scheduling Cycle")
        .unwrap();
    assert!((r.time - t("01/15/2024 10:00:00") - 0.5).abs() < 1e-6);

    assert!(table.classify("01/15/2024 10:00:00;0080;pbs_sched;Req;;Server ready").is_none());
    assert!(table.classify("Starting Scheduling Cycle").is_none());
    // Well-formed but nonexistent date
    assert!(table.classify("13/45/2024 10:00:00;0080;pbs_sched;Req;;Starting Scheduling Cycle").is_none());
}

#[test]
fn test_estimate_patterns() {
    let table = estimate_patterns().unwrap();
    let r = table
        .classify("01/15/2024 10:00:03;0040;pbs_sched;Job;55.pbs01;Job is a top job and will run at Mon Jan 15 12:00:00 2024")
        .unwrap();
    assert!(r.kind == EstimateRecordKind::Estimated);
    assert!(r.field("est_tm") == Some("Mon Jan 15 12:00:00 2024"));
    assert!(r.job_id() == Some("55.pbs01"));
}

#[test]
fn test_server_and_mom_patterns() {
    let server = server_patterns().unwrap();
    let r = server.classify("01/15/2024 09:59:00;0008;Server@pbs01;Job;1234.pbs01;Job Queued at request of alice@login1, owner = alice@login1, job name = sim, queue = workq");
    assert!(r.is_none());
    let r = server
        .classify("01/15/2024 09:59:00;0100;Server@pbs01;Job;1234.pbs01;enqueuing into workq, state Q hop 1")
        .unwrap();
    assert!(r.kind == ServerRecordKind::JobEnqueued);
    let r = server
        .classify("01/15/2024 10:00:02;0008;Server@pbs01;Job;1234.pbs01;Job Run at request of Scheduler@pbs01 on exec_vnode (node01:ncpus=4)")
        .unwrap();
    assert!(r.kind == ServerRecordKind::JobRun);
    let r = server
        .classify("01/15/2024 11:00:02;0010;Server@pbs01;Job;1234.pbs01;Exit_status=0 resources_used.cpupercent=99")
        .unwrap();
    assert!(r.kind == ServerRecordKind::JobEnded);
    let r = server
        .classify("01/15/2024 08:00:00;0004;Server@pbs01;Node;node01;node up")
        .unwrap();
    assert!(r.kind == ServerRecordKind::NodeUp);

    let mom = mom_patterns().unwrap();
    let r = mom
        .classify("01/15/2024 10:00:03;0008;pbs_mom;Job;1234.pbs01;Started, pid = 4242")
        .unwrap();
    assert!(r.kind == MomRecordKind::JobStarted);
    let r = mom
        .classify("01/15/2024 10:00:02;0008;pbs_mom;Req;;Type 5 request received from root@pbs01")
        .unwrap();
    assert!(r.kind == MomRecordKind::JobQueued);
    assert!(r.job_id().is_none());
}

#[test]
fn test_record_time_and_version() {
    let rt = RecordTime::new().unwrap();
    assert!(rt.of("01/15/2024 10:00:00;0002;Server@pbs01;Svr;Log;started") == Some(t("01/15/2024 10:00:00")));
    assert!(rt.of("pbs_version=2024.1").is_none());
    assert!(pbs_version("01/15/2024 10:00:00;0002;Server@pbs01;Svr;Server@pbs01;pbs_version=2022.1.3 ") == Some("2022.1.3"));
    assert!(pbs_version("01/15/2024 10:00:00;0002;Server@pbs01;Svr;Log;started").is_none());
}

#[test]
fn test_accounting_parser() {
    let p = AccountingParser::new().unwrap();
    let r = p
        .parse("01/15/2024 10:00:02;S;1234.pbs01;user=alice group=users qtime=1705309140 start=1705309202")
        .unwrap();
    assert!(r.kind == AccountingKind::Started);
    assert!(r.id == "1234.pbs01");
    assert!(r.time == t("01/15/2024 10:00:02"));
    assert!(r.msg.starts_with("user=alice"));

    let r = p.parse("01/15/2024;10:00:02;D;1235[3].pbs01;requestor=alice@login1").unwrap();
    assert!(r.kind == AccountingKind::Deleted);
    assert!(r.id == "1235[3].pbs01");

    assert!(p.parse("01/15/2024 10:00:02;L;license;floating license hour:0").is_none());
    let r = p.parse("01/15/2024 10:00:02;R;1236.pbs01;user=bob").unwrap();
    assert!(r.kind == AccountingKind::Other('R'));
    assert!(p.parse("garbage").is_none());
}

#[test]
fn test_parse_attributes() {
    let a = parse_attributes("user=alice Resource_List.select=1:ncpus=4 end=20").unwrap();
    assert!(a == vec![("user", "alice"), ("Resource_List.select", "1:ncpus=4"), ("end", "20")]);
    assert!(parse_attributes("user=alice broken end=20").is_none());
    assert!(parse_attributes("").unwrap().is_empty());
}
