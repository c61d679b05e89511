/// Ad-hoc matching over any timestamped log.
///
/// A custom pattern is a user regular expression that is matched against the message part of every
/// record.  The times of the matches are reduced to the intervals between them and to bursts:
/// runs of matches where each match follows the previous one within a given number of seconds.
/// Named groups in the pattern are collected per name.
///
/// A conditional is a list of N regular expressions matched against the last N lines, the most
/// recent line first.  When every expression matches its line the window is a match.  This finds
/// ordered sequences of events on consecutive lines, eg a request that is immediately preceded by
/// a job exit.
use crate::keys::*;
use crate::logfile::{LineAnalyzer, ParseStatus, TimeWindow};
use crate::records::{RecordTime, TIME_RE};
use crate::summary::{number_value, Info};

use anyhow::Result;
use pbsutils::{parse_timestamp, Timestamp};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::debug;

/// A run of matches: the times of the first and last match, and the number of matches.

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Burst(pub (Timestamp, Timestamp), pub usize);

/// Group sorted times into bursts where successive times are at most `frequency` seconds apart.

pub fn bursts(times: &[Timestamp], frequency: f64) -> Vec<Burst> {
    let mut result = vec![];
    let Some(first) = times.first() else {
        return result;
    };
    let mut current = Burst((*first, *first), 1);
    for t in &times[1..] {
        if t - current.0 .1 > frequency {
            result.push(current);
            current = Burst((*t, *t), 1);
        } else {
            current.0 .1 = *t;
            current.1 += 1;
        }
    }
    result.push(current);
    result
}

pub struct CustomMatcher {
    re: Regex,
    frequency: u64,
    pub times: Vec<Timestamp>,

    /// Group name -> captured text per match, null where the group did not participate.
    pub groups: Vec<(String, Vec<Value>)>,
}

impl CustomMatcher {
    pub fn new(pattern: &str, frequency: u64) -> Result<CustomMatcher> {
        let re = Regex::new(&format!("^{TIME_RE}.*(?:{pattern})"))?;
        let groups = re
            .capture_names()
            .flatten()
            .map(|n| (n.to_string(), vec![]))
            .collect();
        Ok(CustomMatcher {
            re,
            frequency,
            times: vec![],
            groups,
        })
    }

    pub fn analyze_line(&mut self, line: &str, window: &TimeWindow) -> ParseStatus {
        let Some(caps) = self.re.captures(line) else {
            return ParseStatus::Continue;
        };
        let Some(t) = caps.name("datetime").and_then(|m| parse_timestamp(m.as_str(), None)) else {
            debug!(line = line, "unparseable timestamp");
            return ParseStatus::Continue;
        };
        match window.gate(t) {
            Some(ParseStatus::Continue) => {}
            Some(status) => return status,
            None => return ParseStatus::Continue,
        }
        self.times.push(t);
        for (name, values) in &mut self.groups {
            values.push(match caps.name(name) {
                Some(m) => Value::from(m.as_str()),
                None => Value::Null,
            });
        }
        ParseStatus::Continue
    }

    pub fn summary(&self) -> Info {
        let mut info = Info::new();
        let Some(first) = self.times.first() else {
            return info;
        };
        let intervals = self
            .times
            .windows(2)
            .map(|w| (w[1] - w[0]).to_string())
            .collect::<Vec<String>>();
        info.insert(CUSTOM_INTERVAL.to_string(), Value::from(intervals.join(", ")));
        info.insert(INIT_TIME.to_string(), number_value(*first));
        let counts = bursts(&self.times, self.frequency as f64)
            .into_iter()
            .map(|b| serde_json::to_value(b).unwrap_or(Value::Null))
            .collect();
        info.insert(CUSTOM_FREQ_COUNTS.to_string(), Value::Array(counts));
        info.insert(CUSTOM_FREQ.to_string(), Value::from(self.frequency));
        if !self.groups.is_empty() {
            let mut groups = Info::new();
            for (name, values) in &self.groups {
                groups.insert(name.clone(), Value::Array(values.clone()));
            }
            info.insert(CUSTOM_GROUPS.to_string(), Value::Object(groups));
        }
        info
    }
}

pub struct ConditionalMatcher {
    conditions: Vec<Regex>,

    /// The most recent lines, newest first.
    window: VecDeque<String>,

    pub num_matches: usize,
    pub matches: Vec<String>,
}

impl ConditionalMatcher {
    pub fn new(conditions: &[String]) -> Result<ConditionalMatcher> {
        let conditions = conditions
            .iter()
            .map(|c| Regex::new(c))
            .collect::<Result<Vec<Regex>, regex::Error>>()?;
        Ok(ConditionalMatcher {
            window: VecDeque::with_capacity(conditions.len() + 1),
            conditions,
            num_matches: 0,
            matches: vec![],
        })
    }

    pub fn push_line(&mut self, line: &str) {
        if self.conditions.is_empty() {
            return;
        }
        self.window.push_front(line.to_string());
        self.window.truncate(self.conditions.len());
        if self.window.len() < self.conditions.len() {
            return;
        }
        if self
            .conditions
            .iter()
            .zip(self.window.iter())
            .all(|(re, l)| re.is_match(l))
        {
            self.num_matches += 1;
            self.matches.extend(self.window.iter().cloned());
        }
    }

    pub fn summary(&self) -> Info {
        let mut info = Info::new();
        info.insert(NUM_CONDITIONAL_MATCHES.to_string(), Value::from(self.num_matches));
        info.insert(
            MATCHES.to_string(),
            Value::Array(self.matches.iter().map(|m| Value::from(m.as_str())).collect()),
        );
        info
    }
}

/// The analyzer for generic logs: any combination of a custom pattern and a conditional.  Lines
/// without a leading timestamp are seen by the conditional but not by the custom pattern.

pub struct GenericAnalyzer {
    pub custom: Option<CustomMatcher>,
    pub conditional: Option<ConditionalMatcher>,
    record_time: RecordTime,
}

impl GenericAnalyzer {
    pub fn new(custom: Option<CustomMatcher>, conditional: Option<ConditionalMatcher>) -> Result<GenericAnalyzer> {
        Ok(GenericAnalyzer {
            custom,
            conditional,
            record_time: RecordTime::new()?,
        })
    }
}

impl LineAnalyzer for GenericAnalyzer {
    fn analyze_line(&mut self, line: &str, window: &TimeWindow) -> ParseStatus {
        if let Some(t) = self.record_time.of(line) {
            match window.gate(t) {
                Some(ParseStatus::Continue) => {}
                Some(status) => return status,
                None => return ParseStatus::Continue,
            }
        }
        if let Some(c) = &mut self.conditional {
            c.push_line(line);
        }
        match &mut self.custom {
            Some(c) => c.analyze_line(line, window),
            None => ParseStatus::Continue,
        }
    }
}

#[test]
fn test_bursts() {
    assert!(bursts(&[], 60.0).is_empty());
    assert!(bursts(&[10.0], 60.0) == vec![Burst((10.0, 10.0), 1)]);
    // Successive gaps decide, so a slow drip stays one burst
    let b = bursts(&[0.0, 50.0, 100.0, 150.0, 300.0, 301.0], 60.0);
    assert!(b == vec![Burst((0.0, 150.0), 4), Burst((300.0, 301.0), 2)]);
    assert!(serde_json::to_string(&b[1]).unwrap() == "[[300.0,301.0],2]");
}

#[test]
fn test_custom_matcher() {
    let mut c = CustomMatcher::new(r"Job;(?P<jobid>[^;]+);Exit_status=(?P<status>\d+)", 30).unwrap();
    let w = TimeWindow::default();
    let lines = [
        "01/15/2024 10:00:00;0010;Server@pbs01;Job;1.pbs01;Exit_status=0 resources_used.walltime=00:10:00",
        "01/15/2024 10:00:10;0010;Server@pbs01;Job;2.pbs01;Exit_status=1 resources_used.walltime=00:10:00",
        "01/15/2024 10:00:15;0008;Server@pbs01;Job;3.pbs01;Job Run at request of Scheduler@pbs01",
        "01/15/2024 10:05:00;0010;Server@pbs01;Job;3.pbs01;Exit_status=0 resources_used.walltime=00:04:45",
    ];
    for l in lines {
        assert!(c.analyze_line(l, &w) == ParseStatus::Continue);
    }
    assert!(c.times.len() == 3);
    let info = c.summary();
    assert!(info[CUSTOM_INTERVAL] == "10, 290");
    assert!(info[CUSTOM_FREQ] == 30);
    assert!(info[CUSTOM_FREQ_COUNTS].as_array().unwrap().len() == 2);
    assert!(info[CUSTOM_FREQ_COUNTS][0][1] == 2);
    let groups = &info[CUSTOM_GROUPS];
    assert!(groups["jobid"] == serde_json::json!(["1.pbs01", "2.pbs01", "3.pbs01"]));
    assert!(groups["status"] == serde_json::json!(["0", "1", "0"]));
    assert!(groups["datetime"].as_array().unwrap().len() == 3);

    assert!(CustomMatcher::new("(unclosed", 60).is_err());
    assert!(CustomMatcher::new("x", 60).unwrap().summary().is_empty());
}

#[test]
fn test_custom_window() {
    let mut c = CustomMatcher::new("Exit_status", 60).unwrap();
    let w = TimeWindow::new(
        parse_timestamp("01/15/2024 10:00:05", None),
        parse_timestamp("01/15/2024 10:01:00", None),
    );
    assert!(c.analyze_line("01/15/2024 10:00:00;0010;Server;Job;1.pbs01;Exit_status=0", &w) == ParseStatus::Continue);
    assert!(c.analyze_line("01/15/2024 10:00:10;0010;Server;Job;2.pbs01;Exit_status=0", &w) == ParseStatus::Continue);
    assert!(c.analyze_line("01/15/2024 10:02:00;0010;Server;Job;3.pbs01;Exit_status=0", &w) == ParseStatus::Stop);
    assert!(c.times.len() == 1);
}

#[test]
fn test_conditional() {
    let mut c = ConditionalMatcher::new(&["Type 20 request".to_string(), "Exit_status".to_string()]).unwrap();
    for l in [
        "a Type 20 request",
        "b Exit_status=0",
        "c Type 20 request",
        "d Type 20 request",
        "e Exit_status=1",
        "f Exit_status=2",
        "g Type 20 request",
    ] {
        c.push_line(l);
    }
    assert!(c.num_matches == 2);
    assert!(c.matches == vec!["c Type 20 request", "b Exit_status=0", "g Type 20 request", "f Exit_status=2"]);
    let info = c.summary();
    assert!(info[NUM_CONDITIONAL_MATCHES] == 2);
    assert!(info[MATCHES].as_array().unwrap().len() == 4);

    assert!(ConditionalMatcher::new(&["[".to_string()]).is_err());
}

#[test]
fn test_generic_analyzer() {
    let mut g = GenericAnalyzer::new(
        Some(CustomMatcher::new("Exit_status", 60).unwrap()),
        Some(ConditionalMatcher::new(&["Type 20".to_string(), "Exit_status".to_string()]).unwrap()),
    )
    .unwrap();
    crate::logfile::analyze_paths(&["../tests/pbslog/generic.log".to_string()], &mut g, &TimeWindow::default()).unwrap();
    let custom = g.custom.as_ref().unwrap();
    assert!(custom.times.len() == 3);
    let cond = g.conditional.as_ref().unwrap();
    // One of the matches spans an untimestamped continuation line
    assert!(cond.num_matches == 2);
}
