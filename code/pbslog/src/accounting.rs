/// Track jobs in PBS accounting logs.
///
/// An accounting record is one of Q (queued), S (started), E (ended), D (deleted) or something we
/// don't care about.  S and E records both carry the job's queue and start times and its resources,
/// so an E record is sufficient by itself; an S record is used provisionally for jobs that had not
/// ended when the log was cut, and is reconciled against the E records once everything has been
/// read.
///
/// Besides the metrics there are two collection modes: workload mode, which keeps the decoded
/// attributes of every E record, and job-info mode, which keeps the raw attributes of one job's E
/// record.
use crate::keys::*;
use crate::logfile::{LineAnalyzer, ParseStatus, TimeWindow};
use crate::records::{parse_attributes, AccountingKind, AccountingParser, AccountingRecord};
use crate::summary::{
    duration_ladder, duration_value, number_value, rate_value, size_ladder, sorted_copy, Info,
};

use anyhow::Result;
use itertools::Itertools;
use pbsutils::{decode_value, parse_duration, Timestamp};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use ustr::Ustr;

/// One `host/task*ncpus` element of an exec_host string.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecChunk {
    pub host: String,
    pub task: String,
    pub ncpus: u64,
}

/// Parse `host/task*ncpus+host/task*ncpus+...`.  The task and ncpus parts are optional and ncpus
/// defaults to 1.

pub fn parse_exechost(s: &str) -> Vec<ExecChunk> {
    s.split('+')
        .filter(|c| !c.is_empty())
        .map(|chunk| {
            let (host, rest) = chunk.split_once('/').unwrap_or((chunk, ""));
            let (task, ncpus) = match rest.split_once('*') {
                Some((task, n)) => (task, n.parse::<u64>().unwrap_or(1)),
                None => (rest, 1),
            };
            ExecChunk {
                host: host.to_string(),
                task: task.to_string(),
                ncpus,
            }
        })
        .collect()
}

/// The distinct hosts of an exec_host string, in order of first appearance.

pub fn exec_hosts(s: &str) -> Vec<String> {
    parse_exechost(s).into_iter().map(|c| c.host).unique().collect()
}

#[derive(Debug, Clone, Default)]
pub struct AccountingOptions {
    /// Compute cpu and node hours, and utilization relative to `total_ncpus` and `num_nodes`.
    pub utilization: bool,

    /// Collect decoded E-record attributes per job instead of computing metrics.
    pub workload: bool,

    /// Collect the raw E-record attributes of this job only.
    pub job_info: Option<String>,

    pub total_ncpus: Option<u64>,
    pub num_nodes: Option<u64>,

    /// Queue and start times earlier than this are clamped to it when computing utilization.  If
    /// not set, the time of the first record read is used.
    pub window_start: Option<Timestamp>,
}

/// Everything derived at the end of the stream.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub duration: f64,
    pub starts: Vec<Timestamp>,
    pub ends: Vec<Timestamp>,
    pub queues: Vec<Timestamp>,
    pub wait_time: Vec<f64>,
    pub run_time: Vec<f64>,
    pub node_sizes: Vec<f64>,
    pub cpu_sizes: Vec<f64>,
    pub cpu_secs: f64,
    pub node_secs: f64,
    pub elapsed: HashMap<Ustr, f64>,
}

pub struct AccountingTracker {
    pub options: AccountingOptions,
    pub users: HashMap<Ustr, Ustr>,
    pub job_cpus: HashMap<Ustr, u64>,
    pub job_nodes: HashMap<Ustr, usize>,
    pub tmp_wait: HashMap<Ustr, f64>,
    pub job_start: HashMap<Ustr, Timestamp>,
    pub job_queue: HashMap<Ustr, Timestamp>,
    pub job_end: HashMap<Ustr, Timestamp>,
    pub wait_time: Vec<f64>,
    pub run_time: Vec<f64>,
    pub cpu_secs: f64,
    pub node_secs: f64,
    pub elapsed: HashMap<Ustr, f64>,
    pub parser_errors: usize,
    pub workload: Info,
    pub job_info: Info,
    first_time: Option<Timestamp>,
    min_time: Option<Timestamp>,
    max_time: Option<Timestamp>,
    reconciled: Option<Reconciled>,
    parser: AccountingParser,
}

fn epoch(attrs: &HashMap<&str, &str>, key: &str) -> Option<f64> {
    attrs.get(key)?.parse::<f64>().ok()
}

impl AccountingTracker {
    pub fn new(options: AccountingOptions) -> Result<AccountingTracker> {
        Ok(AccountingTracker {
            options,
            users: HashMap::new(),
            job_cpus: HashMap::new(),
            job_nodes: HashMap::new(),
            tmp_wait: HashMap::new(),
            job_start: HashMap::new(),
            job_queue: HashMap::new(),
            job_end: HashMap::new(),
            wait_time: vec![],
            run_time: vec![],
            cpu_secs: 0.0,
            node_secs: 0.0,
            elapsed: HashMap::new(),
            parser_errors: 0,
            workload: Info::new(),
            job_info: Info::new(),
            first_time: None,
            min_time: None,
            max_time: None,
            reconciled: None,
            parser: AccountingParser::new()?,
        })
    }

    fn note_time(&mut self, t: Timestamp) {
        if self.first_time.is_none() {
            self.first_time = Some(t);
        }
        self.min_time = Some(self.min_time.map_or(t, |m| m.min(t)));
        self.max_time = Some(self.max_time.map_or(t, |m| m.max(t)));
    }

    fn record_started(&mut self, job: Ustr, attrs: &HashMap<&str, &str>) {
        let (Some(user), Some(qtime), Some(start), Some(exec_host), Some(ncpus)) = (
            attrs.get("user"),
            epoch(attrs, "qtime"),
            epoch(attrs, "start"),
            attrs.get("exec_host"),
            attrs.get("Resource_List.ncpus").and_then(|n| n.parse::<u64>().ok()),
        ) else {
            debug!(job = job.as_str(), "incomplete S record");
            return;
        };
        self.users.insert(job, Ustr::from(*user));
        self.job_cpus.insert(job, ncpus);
        if start != 0.0 && qtime != 0.0 {
            self.tmp_wait.insert(job, start - qtime);
            self.job_start.insert(job, start);
            self.job_queue.insert(job, qtime);
        }
        self.job_nodes.insert(job, exec_hosts(exec_host).len());
    }

    fn record_ended(&mut self, job: Ustr, attrs: &HashMap<&str, &str>) {
        let (Some(user), Some(qtime), Some(start), Some(exec_host), Some(ncpus), Some(end)) = (
            attrs.get("user"),
            epoch(attrs, "qtime"),
            epoch(attrs, "start"),
            attrs.get("exec_host"),
            attrs.get("Resource_List.ncpus").and_then(|n| n.parse::<u64>().ok()),
            epoch(attrs, "end"),
        ) else {
            debug!(job = job.as_str(), "incomplete E record");
            return;
        };
        self.users.entry(job).or_insert_with(|| Ustr::from(*user));
        let nodes = exec_hosts(exec_host).len();
        self.job_nodes.insert(job, nodes);
        self.job_cpus.insert(job, ncpus);
        self.job_end.insert(job, end);
        self.job_queue.insert(job, qtime);
        if start == 0.0 || qtime == 0.0 {
            return;
        }
        self.job_start.entry(job).or_insert(start);

        let (mut qtime, mut start) = (qtime, start);
        if self.options.utilization {
            if let Some(ws) = self.options.window_start.or(self.first_time) {
                if qtime < ws {
                    qtime = ws;
                    start = start.max(ws);
                }
            }
        }
        self.wait_time.push(start - qtime);

        let walltime = match attrs.get("resources_used.walltime") {
            Some(w) => match parse_duration(w.trim()) {
                Ok(secs) => secs as f64,
                Err(e) => {
                    debug!(job = job.as_str(), "{e}");
                    return;
                }
            },
            None => end - start,
        };
        self.run_time.push(walltime);
        if self.options.utilization {
            self.cpu_secs += ncpus as f64 * walltime;
            self.node_secs += nodes as f64 * walltime;
            self.elapsed.insert(job, walltime);
        }
    }

    fn record_workload(&mut self, rec: &AccountingRecord, attrs: &[(&str, &str)]) {
        let mut info = Info::new();
        for (k, v) in attrs {
            info.insert(k.to_string(), decode_value(v).to_json());
        }
        let map: HashMap<&str, &str> = attrs.iter().copied().collect();
        if let (Some(end), Some(start)) = (epoch(&map, "end"), epoch(&map, "start")) {
            info.insert("running_time".to_string(), number_value(end - start));
        }
        if let Some(select) = info.get("Resource_List.select").cloned() {
            info.insert("schedselect".to_string(), select);
        }
        if !info.contains_key("euser") {
            info.insert("euser".to_string(), Value::from("unknown_user"));
        }
        info.insert("id".to_string(), Value::from(rec.id.as_str()));
        self.workload.insert(rec.id.clone(), Value::Object(info));
    }

    /// Fold the provisional S-record data of jobs that did not end into the metrics.  The tracker
    /// is not modified.
    pub fn reconcile(&self) -> Reconciled {
        let mut r = Reconciled {
            wait_time: self.wait_time.clone(),
            run_time: self.run_time.clone(),
            cpu_secs: self.cpu_secs,
            node_secs: self.node_secs,
            elapsed: self.elapsed.clone(),
            ..Default::default()
        };
        if let (Some(min), Some(max)) = (self.min_time, self.max_time) {
            r.duration = max - min;
        }
        r.starts = sorted_copy(&self.job_start.values().copied().collect::<Vec<_>>());
        r.ends = sorted_copy(&self.job_end.values().copied().collect::<Vec<_>>());
        r.queues = sorted_copy(&self.job_queue.values().copied().collect::<Vec<_>>());
        r.node_sizes = self.job_nodes.values().map(|n| *n as f64).collect();
        r.cpu_sizes = self.job_cpus.values().map(|n| *n as f64).collect();

        // Jobs that started but did not end are still running at the end of the log.
        let ended: HashSet<&Ustr> = self.job_end.keys().collect();
        let running = self.job_start.keys().filter(|j| !ended.contains(j)).sorted();
        for job in running {
            if let Some(w) = self.tmp_wait.get(job) {
                r.wait_time.push(*w);
            }
            if !self.options.utilization {
                continue;
            }
            let (Some(last), Some(start)) = (self.max_time, self.job_start.get(job)) else {
                continue;
            };
            let elapsed = last - start;
            if let Some(ncpus) = self.job_cpus.get(job) {
                r.cpu_secs += *ncpus as f64 * elapsed;
            }
            if let Some(nodes) = self.job_nodes.get(job) {
                r.node_secs += *nodes as f64 * elapsed;
            }
            r.run_time.push(elapsed);
            r.elapsed.insert(*job, elapsed);
        }
        r
    }

    pub fn summary(&self) -> Info {
        let mut info = Info::new();
        if self.options.job_info.is_some() {
            info.insert(JOB_INFO.to_string(), Value::Object(self.job_info.clone()));
            return info;
        }
        if self.options.workload {
            info.insert(WORKLOAD.to_string(), Value::Object(self.workload.clone()));
            info.insert(PARSER_ERRORS.to_string(), Value::from(self.parser_errors));
            return info;
        }

        let r = match &self.reconciled {
            Some(r) => r.clone(),
            None => self.reconcile(),
        };
        info.insert(NUM_JOBS_QUEUED.to_string(), Value::from(r.queues.len()));
        info.insert(NUM_JOBS_RUN.to_string(), Value::from(r.starts.len()));
        info.insert(NUM_JOBS_ENDED.to_string(), Value::from(r.ends.len()));
        info.insert(JOB_RUN_RATE.to_string(), rate_value(&r.starts));
        info.insert(JOB_SUBMIT_RATE.to_string(), rate_value(&r.queues));
        info.insert(JOB_END_RATE.to_string(), rate_value(&r.ends));
        if self.min_time.is_some() {
            info.insert(DURATION.to_string(), duration_value(r.duration));
        }
        duration_ladder(&mut info, &JOB_WAIT_TIME, &r.wait_time);
        duration_ladder(&mut info, &JOB_RUN_TIME, &r.run_time);
        size_ladder(&mut info, &JOB_NODE_SIZE, &r.node_sizes);
        size_ladder(&mut info, &JOB_CPU_SIZE, &r.cpu_sizes);

        if self.options.utilization {
            let percent = |used: f64, capacity: Option<u64>| {
                let avail = capacity.unwrap_or(0) as f64 * r.duration;
                (avail > 0.0).then(|| Value::from(format!("{:.2}%", 100.0 * used / avail)))
            };
            if let Some(v) = percent(r.cpu_secs, self.options.total_ncpus) {
                info.insert(UTILIZATION_NCPUS.to_string(), v);
            }
            if let Some(v) = percent(r.node_secs, self.options.num_nodes) {
                info.insert(UTILIZATION_NODES.to_string(), v);
            }
            info.insert(CPU_HOURS.to_string(), number_value(r.cpu_secs / 3600.0));
            info.insert(NODE_HOURS.to_string(), number_value(r.node_secs / 3600.0));
        }

        let users: HashSet<&Ustr> = self.users.values().collect();
        info.insert(UNIQUE_USERS.to_string(), Value::from(users.len()));
        info.insert(PARSER_ERRORS.to_string(), Value::from(self.parser_errors));
        info
    }
}

impl LineAnalyzer for AccountingTracker {
    fn analyze_line(&mut self, line: &str, window: &TimeWindow) -> ParseStatus {
        let Some(rec) = self.parser.parse(line) else {
            return ParseStatus::Continue;
        };
        match window.gate(rec.time) {
            Some(ParseStatus::Continue) => {}
            Some(status) => return status,
            None => return ParseStatus::Continue,
        }

        if let Some(id) = &self.options.job_info {
            if rec.kind == AccountingKind::Ended && rec.id == *id {
                for (k, v) in parse_attributes(&rec.msg).unwrap_or_default() {
                    self.job_info.insert(k.to_string(), Value::from(v));
                }
            }
            return ParseStatus::Continue;
        }

        self.note_time(rec.time);
        let job = Ustr::from(rec.id.as_str());
        match rec.kind {
            AccountingKind::Ended => {}
            AccountingKind::Started | AccountingKind::Queued if !self.options.workload => {}
            AccountingKind::Deleted if !self.options.workload => {
                self.job_end.entry(job).or_insert(rec.time);
                return ParseStatus::Continue;
            }
            _ => return ParseStatus::Continue,
        }

        // Only records that are about to be used are held to the attribute syntax.
        let Some(attrs) = parse_attributes(&rec.msg) else {
            self.parser_errors += 1;
            debug!(id = rec.id.as_str(), "malformed accounting attributes");
            return ParseStatus::ErrorContinue;
        };
        if self.options.workload {
            self.record_workload(&rec, &attrs);
            return ParseStatus::Continue;
        }

        let map: HashMap<&str, &str> = attrs.into_iter().collect();
        match rec.kind {
            AccountingKind::Started => self.record_started(job, &map),
            AccountingKind::Ended => self.record_ended(job, &map),
            AccountingKind::Queued => {
                if let (Some(user), Some(qtime)) = (map.get("user"), epoch(&map, "qtime")) {
                    self.users.insert(job, Ustr::from(*user));
                    self.job_queue.insert(job, qtime);
                }
            }
            AccountingKind::Deleted | AccountingKind::Other(_) => {}
        }
        ParseStatus::Continue
    }

    fn finalize(&mut self) {
        if !self.options.workload && self.options.job_info.is_none() {
            self.reconciled = Some(self.reconcile());
        }
    }
}

#[test]
fn test_parse_exechost() {
    let cs = parse_exechost("node01/0*4+node02/1*4+node01/2");
    assert!(cs.len() == 3);
    assert!(cs[0] == ExecChunk { host: "node01".to_string(), task: "0".to_string(), ncpus: 4 });
    assert!(cs[2].ncpus == 1);
    assert!(cs[2].task == "2");
    assert!(exec_hosts("node01/0*4+node02/1*4+node01/2") == vec!["node01", "node02"]);
    assert!(exec_hosts("node07") == vec!["node07"]);
    assert!(exec_hosts("").is_empty());
}

#[test]
fn test_accounting_fixture() {
    let mut a = AccountingTracker::new(AccountingOptions::default()).unwrap();
    crate::logfile::analyze_paths(&["../tests/pbslog/accounting.log".to_string()], &mut a, &TimeWindow::default()).unwrap();
    let info = a.summary();
    assert!(info[NUM_JOBS_QUEUED] == 3);
    assert!(info[NUM_JOBS_RUN] == 3);
    assert!(info[NUM_JOBS_ENDED] == 3);
    assert!(info[PARSER_ERRORS] == 1);
    assert!(info[UNIQUE_USERS] == 2);
    // 300 waited 60s, 301 90s, 302 30s
    assert!(info["job_wait_time_min"] == "0:00:30");
    assert!(info["job_wait_time_max"] == "0:01:30");
    // 300 from walltime, 302 from end - start; 301 is still running
    assert!(sorted_copy(&a.run_time) == vec![600.0, 3600.0]);
    assert!(info["job_node_size_max"] == 2);
    assert!(info["job_cpu_size_mean"] == "4.67");
    assert!(info[DURATION] == "1:40:00");
    assert!(info.get(CPU_HOURS).is_none());
    assert!(a.summary() == info);
}

#[cfg(test)]
fn feed(a: &mut AccountingTracker, lines: &[String]) {
    for l in lines {
        a.analyze_line(l, &TimeWindow::default());
    }
    a.finalize();
}

#[test]
fn test_still_running() {
    // A job with only an S record runs until the last record of the log.
    let t0 = pbsutils::parse_timestamp("01/15/2024 10:00:00", None).unwrap();
    let options = AccountingOptions {
        utilization: true,
        total_ncpus: Some(10),
        num_nodes: Some(2),
        ..Default::default()
    };
    let mut a = AccountingTracker::new(options).unwrap();
    feed(
        &mut a,
        &[
            format!(
                "01/15/2024 10:00:20;S;5.pbs01;user=alice qtime={} start={} exec_host=node01/0*2 Resource_List.ncpus=2",
                t0 + 10.0,
                t0 + 20.0
            ),
            "01/15/2024 10:16:40;L;license;floating license hour:0".to_string(),
            "01/15/2024 10:16:40;Q;6.pbs01;queue=workq".to_string(),
        ],
    );
    let r = a.reconcile();
    assert!(r.wait_time == vec![10.0]);
    assert!(r.run_time == vec![980.0]);
    assert!(r.elapsed[&Ustr::from("5.pbs01")] == 980.0);
    assert!(r.cpu_secs == 1960.0);
    assert!(r.node_secs == 980.0);
    assert!(r.ends.is_empty());
    // The tracker is not changed by reconciling
    assert!(a.wait_time.is_empty());
    assert!(a.reconcile() == r);

    let info = a.summary();
    // 1960 cpu-seconds out of 10 cpus for 980 seconds
    assert!(info[UTILIZATION_NCPUS] == "20.00%");
    assert!(info[UTILIZATION_NODES] == "50.00%");
    assert!(info[NUM_JOBS_ENDED] == 0);
}

#[test]
fn test_clamp_to_window() {
    let t0 = 1_700_000_000.0;
    let options = AccountingOptions {
        utilization: true,
        window_start: Some(t0),
        ..Default::default()
    };
    let mut a = AccountingTracker::new(options).unwrap();
    feed(
        &mut a,
        &[format!(
            "01/15/2024 10:00:20;E;7.pbs01;user=bob qtime={} start={} end={} exec_host=n1/0*4+n2/0*4 Resource_List.ncpus=8",
            t0 - 100.0,
            t0 + 50.0,
            t0 + 3650.0
        )],
    );
    assert!(a.wait_time == vec![50.0]);
    assert!(a.run_time == vec![3600.0]);
    assert!(a.cpu_secs == 8.0 * 3600.0);
    assert!(a.node_secs == 2.0 * 3600.0);
    let info = a.summary();
    assert!(info[CPU_HOURS] == 8);
    assert!(info[NODE_HOURS] == 2);
    // No capacity given
    assert!(info.get(UTILIZATION_NCPUS).is_none());
}

#[test]
fn test_workload_and_job_info() {
    let line = "01/15/2024 11:00:00;E;8.pbs01;user=carol qtime=100 start=200 end=500 Resource_List.select=1:ncpus=4 Resource_List.mem=2gb resources_used.walltime=00:05:00".to_string();
    let options = AccountingOptions {
        workload: true,
        ..Default::default()
    };
    let mut a = AccountingTracker::new(options).unwrap();
    feed(&mut a, &[line.clone(), "01/15/2024 11:00:01;E;9.pbs01;broken".to_string()]);
    let info = a.summary();
    assert!(info[PARSER_ERRORS] == 1);
    let j = &info[WORKLOAD]["8.pbs01"];
    assert!(j["running_time"] == 300);
    assert!(j["Resource_List.mem"] == 2097152);
    assert!(j["resources_used.walltime"] == 300);
    assert!(j["schedselect"] == "1:ncpus=4");
    assert!(j["euser"] == "unknown_user");
    assert!(j["id"] == "8.pbs01");

    let options = AccountingOptions {
        job_info: Some("8.pbs01".to_string()),
        ..Default::default()
    };
    let mut a = AccountingTracker::new(options).unwrap();
    feed(&mut a, &[line, "01/15/2024 11:00:02;E;10.pbs01;user=dave".to_string()]);
    let info = a.summary();
    assert!(info[JOB_INFO]["resources_used.walltime"] == "00:05:00");
    assert!(info[JOB_INFO]["user"] == "carol");
    assert!(info[JOB_INFO].get("id").is_none());
    assert!(info.get(NUM_JOBS_ENDED).is_none());
}

#[test]
fn test_accounting_window() {
    let mut a = AccountingTracker::new(AccountingOptions::default()).unwrap();
    let w = TimeWindow::new(
        pbsutils::parse_timestamp("01/15/2024 10:00:40", None),
        pbsutils::parse_timestamp("01/15/2024 10:30:00", None),
    );
    assert!(a.analyze_line("01/15/2024 10:00:00;Q;300.pbs01;user=alice qtime=1", &w) == ParseStatus::Continue);
    assert!(a.users.is_empty());
    assert!(a.analyze_line("01/15/2024 10:31:00;Q;300.pbs01;user=alice qtime=1", &w) == ParseStatus::Stop);
    assert!(a.users.is_empty());
}

#[test]
fn test_unparseable_walltime() {
    // The wait is recorded but the run and its utilization are not.
    let t0 = pbsutils::parse_timestamp("01/15/2024 10:00:00", None).unwrap();
    let options = AccountingOptions {
        utilization: true,
        window_start: Some(t0 - 1000.0),
        ..Default::default()
    };
    let mut a = AccountingTracker::new(options).unwrap();
    feed(
        &mut a,
        &[format!(
            "01/15/2024 10:10:00;E;20.pbs01;user=erin qtime={} start={} end={} exec_host=n1/0*2 Resource_List.ncpus=2 resources_used.walltime=12:ab:00",
            t0,
            t0 + 60.0,
            t0 + 600.0
        )],
    );
    assert!(a.wait_time == vec![60.0]);
    assert!(a.run_time.is_empty());
    assert!(a.cpu_secs == 0.0);
    assert!(a.node_secs == 0.0);
    assert!(a.elapsed.is_empty());
    assert!(a.job_end[&Ustr::from("20.pbs01")] == t0 + 600.0);
    assert!(a.parser_errors == 0);
    let r = a.reconcile();
    assert!(r.run_time.is_empty());
    assert!(r.wait_time == vec![60.0]);
}

#[test]
fn test_deleted_after_start() {
    let t0 = pbsutils::parse_timestamp("01/15/2024 10:00:00", None).unwrap();
    let deleted_at = pbsutils::parse_timestamp("01/15/2024 10:05:00", None).unwrap();
    let options = AccountingOptions {
        utilization: true,
        window_start: Some(t0 - 1000.0),
        ..Default::default()
    };
    let mut a = AccountingTracker::new(options).unwrap();
    let job = Ustr::from("21.pbs01");
    feed(
        &mut a,
        &[
            format!(
                "01/15/2024 10:00:20;S;21.pbs01;user=frank qtime={} start={} exec_host=n1/0*4 Resource_List.ncpus=4",
                t0,
                t0 + 20.0
            ),
            "01/15/2024 10:05:00;D;21.pbs01;requestor=frank@login1".to_string(),
            "01/15/2024 10:20:00;Q;22.pbs01;user=frank qtime=1".to_string(),
        ],
    );
    assert!(a.job_end[&job] == deleted_at);

    // The deleted job is not running at the end of the log
    let r = a.reconcile();
    assert!(r.starts == vec![t0 + 20.0]);
    assert!(r.ends == vec![deleted_at]);
    assert!(r.wait_time.is_empty());
    assert!(r.run_time.is_empty());
    assert!(r.elapsed.is_empty());
    assert!(r.cpu_secs == 0.0);

    // An E record carries the real end, and a D record after it does not replace that
    let w = TimeWindow::default();
    a.analyze_line(
        &format!(
            "01/15/2024 10:30:00;E;21.pbs01;user=frank qtime={} start={} end={} exec_host=n1/0*4 Resource_List.ncpus=4",
            t0,
            t0 + 20.0,
            t0 + 1800.0
        ),
        &w,
    );
    assert!(a.job_end[&job] == t0 + 1800.0);
    a.analyze_line("01/15/2024 10:31:00;D;21.pbs01;requestor=root@login1", &w);
    assert!(a.job_end[&job] == t0 + 1800.0);
}

#[test]
fn test_started_and_ended_counted_once() {
    // 23 has both S and E records, 24 only an S record.
    let t0 = pbsutils::parse_timestamp("01/15/2024 10:00:00", None).unwrap();
    let options = AccountingOptions {
        utilization: true,
        window_start: Some(t0 - 1000.0),
        ..Default::default()
    };
    let mut a = AccountingTracker::new(options).unwrap();
    feed(
        &mut a,
        &[
            format!(
                "01/15/2024 10:00:20;S;23.pbs01;user=gina qtime={} start={} exec_host=n1/0*4 Resource_List.ncpus=4",
                t0,
                t0 + 20.0
            ),
            format!(
                "01/15/2024 10:01:00;S;24.pbs01;user=gina qtime={} start={} exec_host=n2/0*2 Resource_List.ncpus=2",
                t0,
                t0 + 60.0
            ),
            format!(
                "01/15/2024 10:30:00;E;23.pbs01;user=gina qtime={} start={} end={} exec_host=n1/0*4 Resource_List.ncpus=4 resources_used.walltime=00:29:40",
                t0,
                t0 + 20.0,
                t0 + 1800.0
            ),
            "01/15/2024 10:40:00;Q;25.pbs01;user=gina qtime=1".to_string(),
        ],
    );
    let r = a.reconcile();
    assert!(sorted_copy(&r.wait_time) == vec![20.0, 60.0]);
    assert!(r.elapsed.len() == 2);
    assert!(r.elapsed[&Ustr::from("23.pbs01")] == 1780.0);
    // 24 runs from 10:01:00 to the last record at 10:40:00
    assert!(r.elapsed[&Ustr::from("24.pbs01")] == 2340.0);
    assert!(sorted_copy(&r.run_time) == vec![1780.0, 2340.0]);
    assert!(r.node_sizes.len() == 2);
    assert!(r.cpu_sizes.len() == 2);
    assert!(r.cpu_secs == 4.0 * 1780.0 + 2.0 * 2340.0);
    assert!(a.summary()[NUM_JOBS_RUN] == 2);
}

#[test]
fn test_malformed_attributes() {
    let w = TimeWindow::default();
    let mut a = AccountingTracker::new(AccountingOptions::default()).unwrap();
    // Kinds that are not parsed are not held to the syntax
    assert!(a.analyze_line("01/15/2024 10:00:00;R;30.pbs01;broken", &w) == ParseStatus::Continue);
    assert!(a.analyze_line("01/15/2024 10:00:01;D;31.pbs01;broken", &w) == ParseStatus::Continue);
    assert!(a.parser_errors == 0);
    assert!(a.job_end.contains_key(&Ustr::from("31.pbs01")));
    assert!(a.analyze_line("01/15/2024 10:00:02;S;32.pbs01;broken", &w) == ParseStatus::ErrorContinue);
    assert!(a.analyze_line("01/15/2024 10:00:03;E;33.pbs01;broken", &w) == ParseStatus::ErrorContinue);
    assert!(a.parser_errors == 2);
    assert!(a.users.is_empty());

    // In workload mode only E records are parsed
    let options = AccountingOptions {
        workload: true,
        ..Default::default()
    };
    let mut a = AccountingTracker::new(options).unwrap();
    assert!(a.analyze_line("01/15/2024 10:00:02;S;32.pbs01;broken", &w) == ParseStatus::Continue);
    assert!(a.analyze_line("01/15/2024 10:00:03;Q;34.pbs01;broken", &w) == ParseStatus::Continue);
    assert!(a.parser_errors == 0);
    assert!(a.analyze_line("01/15/2024 10:00:04;E;33.pbs01;broken", &w) == ParseStatus::ErrorContinue);
    assert!(a.parser_errors == 1);
}
