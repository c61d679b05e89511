/// Read an analysis configuration from a json file.
///
/// File format: an object { ... } with the following named fields and value types, all optional:
///
///   sched_logs, server_logs, mom_logs, accounting_logs, generic_logs - array of strings, files or
///      directories holding logs of the given type
///   start, end - string, "MM/DD/YYYY HH:MM:SS", the inclusive time window to analyze
///   show_jobs - bool, report per-job times within each scheduling cycle
///   estimated_info - bool, also collect estimated start times from scheduler logs
///   estimated_info_only - bool, collect only estimated start times from scheduler logs
///   cycles_from, cycles_to - string, "MM/DD/YYYY HH:MM:SS", summarize only the scheduling cycles
///      that started at or after cycles_from and ended before cycles_to
///   utilization - bool, compute cpu and node utilization from accounting logs
///   workload - bool, collect per-job decoded attributes from accounting logs
///   job_info - string, a job id whose raw accounting attributes should be reported
///   total_ncpus, num_nodes - integer, the capacity of the cluster for utilization
///   custom_pattern - string, a regular expression to match against generic logs
///   custom_frequency - integer, seconds, the maximum gap between matches in one burst
///   conditionals - array of strings, regular expressions matched against consecutive lines
///
/// Any field name starting with '#' is reserved for arbitrary comments.
use anyhow::{bail, Result};
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path;

pub const DEFAULT_CUSTOM_FREQUENCY: u64 = 60;

// See above comment block for field documentation.

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub sched_logs: Vec<String>,
    pub server_logs: Vec<String>,
    pub mom_logs: Vec<String>,
    pub accounting_logs: Vec<String>,
    pub generic_logs: Vec<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub show_jobs: bool,
    pub estimated_info: bool,
    pub estimated_info_only: bool,
    pub cycles_from: Option<String>,
    pub cycles_to: Option<String>,
    pub utilization: bool,
    pub workload: bool,
    pub job_info: Option<String>,
    pub total_ncpus: Option<u64>,
    pub num_nodes: Option<u64>,
    pub custom_pattern: Option<String>,
    pub custom_frequency: u64,
    pub conditionals: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            sched_logs: vec![],
            server_logs: vec![],
            mom_logs: vec![],
            accounting_logs: vec![],
            generic_logs: vec![],
            start: None,
            end: None,
            show_jobs: false,
            estimated_info: false,
            estimated_info_only: false,
            cycles_from: None,
            cycles_to: None,
            utilization: false,
            workload: false,
            job_info: None,
            total_ncpus: None,
            num_nodes: None,
            custom_pattern: None,
            custom_frequency: DEFAULT_CUSTOM_FREQUENCY,
            conditionals: vec![],
        }
    }
}

impl AnalysisConfig {
    pub fn has_sources(&self) -> bool {
        !(self.sched_logs.is_empty()
            && self.server_logs.is_empty()
            && self.mom_logs.is_empty()
            && self.accounting_logs.is_empty()
            && self.generic_logs.is_empty())
    }
}

/// The file is human-written and fields come and go, so it's read with the generic JSON parser and
/// decoded field by field, rather than with a derived parser.

pub fn read_analysis_config(filename: &str) -> Result<AnalysisConfig> {
    let file = File::open(path::Path::new(filename))?;
    let reader = BufReader::new(file);
    let v: Value = serde_json::from_reader(reader)?;
    let Value::Object(fields) = v else {
        bail!("Expected an object value")
    };
    let mut cfg: AnalysisConfig = Default::default();
    cfg.sched_logs = grab_strings_opt(&fields, "sched_logs")?;
    cfg.server_logs = grab_strings_opt(&fields, "server_logs")?;
    cfg.mom_logs = grab_strings_opt(&fields, "mom_logs")?;
    cfg.accounting_logs = grab_strings_opt(&fields, "accounting_logs")?;
    cfg.generic_logs = grab_strings_opt(&fields, "generic_logs")?;
    cfg.start = grab_string_opt(&fields, "start")?;
    cfg.end = grab_string_opt(&fields, "end")?;
    cfg.show_jobs = grab_bool_opt(&fields, "show_jobs")?.unwrap_or(false);
    cfg.estimated_info = grab_bool_opt(&fields, "estimated_info")?.unwrap_or(false);
    cfg.estimated_info_only = grab_bool_opt(&fields, "estimated_info_only")?.unwrap_or(false);
    cfg.cycles_from = grab_string_opt(&fields, "cycles_from")?;
    cfg.cycles_to = grab_string_opt(&fields, "cycles_to")?;
    cfg.utilization = grab_bool_opt(&fields, "utilization")?.unwrap_or(false);
    cfg.workload = grab_bool_opt(&fields, "workload")?.unwrap_or(false);
    cfg.job_info = grab_string_opt(&fields, "job_info")?;
    cfg.total_ncpus = grab_u64_opt(&fields, "total_ncpus")?;
    cfg.num_nodes = grab_u64_opt(&fields, "num_nodes")?;
    cfg.custom_pattern = grab_string_opt(&fields, "custom_pattern")?;
    if let Some(freq) = grab_u64_opt(&fields, "custom_frequency")? {
        cfg.custom_frequency = freq;
    }
    cfg.conditionals = grab_strings_opt(&fields, "conditionals")?;
    if cfg.custom_pattern.is_none() && fields.contains_key("custom_frequency") {
        bail!("Field 'custom_frequency' requires 'custom_pattern'")
    }
    Ok(cfg)
}

fn grab_string_opt(fields: &serde_json::Map<String, Value>, name: &str) -> Result<Option<String>> {
    if let Some(val) = fields.get(name) {
        if let Value::String(s) = val {
            Ok(Some(s.to_string()))
        } else {
            bail!("Field '{name}' must have a string value");
        }
    } else {
        Ok(None)
    }
}

fn grab_strings_opt(fields: &serde_json::Map<String, Value>, name: &str) -> Result<Vec<String>> {
    let mut result = vec![];
    if let Some(val) = fields.get(name) {
        let Value::Array(vals) = val else {
            bail!("Field '{name}' must have an array value")
        };
        for v in vals {
            if let Value::String(s) = v {
                result.push(s.to_string());
            } else {
                bail!("Field '{name}' must have string values");
            }
        }
    }
    Ok(result)
}

fn grab_u64_opt(fields: &serde_json::Map<String, Value>, name: &str) -> Result<Option<u64>> {
    if let Some(val) = fields.get(name) {
        if let Some(n) = val.as_u64() {
            Ok(Some(n))
        } else {
            bail!("Field '{name}' must have unsigned integer value")
        }
    } else {
        Ok(None)
    }
}

fn grab_bool_opt(fields: &serde_json::Map<String, Value>, name: &str) -> Result<Option<bool>> {
    if let Some(d) = fields.get(name) {
        if let Value::Bool(b) = d {
            Ok(Some(*b))
        } else {
            bail!("Field '{name}' must have a boolean value");
        }
    } else {
        Ok(None)
    }
}

// Whitebox test that reading a complete config works.

#[test]
fn test_config() {
    let conf = read_analysis_config("../tests/pbsutils/analysis-config.json").unwrap();
    assert!(conf.sched_logs == vec!["sched/20240115".to_string()]);
    assert!(conf.server_logs == vec!["server_logs".to_string()]);
    assert!(conf.mom_logs.is_empty());
    assert!(conf.accounting_logs.len() == 2);
    assert!(conf.start.as_deref() == Some("01/15/2024 00:00:00"));
    assert!(conf.end.is_none());
    assert!(conf.show_jobs);
    assert!(!conf.estimated_info);
    assert!(conf.cycles_from.as_deref() == Some("01/15/2024 06:00:00"));
    assert!(conf.cycles_to.is_none());
    assert!(conf.utilization);
    assert!(conf.total_ncpus == Some(128));
    assert!(conf.num_nodes == Some(4));
    assert!(conf.custom_pattern.as_deref() == Some("Job;(?P<jobid>[^;]+);Exit_status"));
    assert!(conf.custom_frequency == 30);
    assert!(conf.conditionals.len() == 2);
    assert!(conf.has_sources());
}

#[test]
fn test_config_defaults() {
    let conf: AnalysisConfig = Default::default();
    assert!(!conf.has_sources());
    assert!(conf.custom_frequency == DEFAULT_CUSTOM_FREQUENCY);
}

#[test]
fn test_config_errors() {
    use std::io::Write;
    let mut bad = tempfile::NamedTempFile::new().unwrap();
    write!(bad, r#"{{"show_jobs": "yes"}}"#).unwrap();
    assert!(read_analysis_config(bad.path().to_str().unwrap()).is_err());

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    write!(bad, r#"[1, 2, 3]"#).unwrap();
    assert!(read_analysis_config(bad.path().to_str().unwrap()).is_err());

    assert!(read_analysis_config("../tests/pbsutils/no-such-config.json").is_err());
}
