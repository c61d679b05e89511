/// Building blocks for the summary mappings.  Everything here reads its inputs and writes into a
/// fresh or caller-owned `Info`; nothing touches tracker state.
use crate::keys::LadderKeys;
use crate::records::pbs_version;

use pbsutils::{duration_string, mean, percentile, rate, Timestamp};
use serde_json::Value;

/// A summary: string keys to scalars, strings, lists or nested summaries.  Insertion order is
/// preserved in the JSON output.

pub type Info = serde_json::Map<String, Value>;

/// The rate of a sorted series of event times, as a string, or the integer 0 for an empty series.

pub fn rate_value(sorted: &[Timestamp]) -> Value {
    match rate(sorted) {
        Some(s) => Value::from(s),
        None => Value::from(0),
    }
}

/// A number that is integral is presented as an integer.

pub fn number_value(x: f64) -> Value {
    if x.fract() == 0.0 && x.abs() < 9.0e15 {
        Value::from(x as i64)
    } else {
        Value::from(x)
    }
}

pub fn duration_value(seconds: f64) -> Value {
    Value::from(duration_string(seconds))
}

/// Add the min/25p/median/mean/75p/max ladder of `values` to `info`, as duration strings.  The
/// values are sorted into a private copy.  Nothing is added for an empty series.

pub fn duration_ladder(info: &mut Info, keys: &LadderKeys, values: &[f64]) {
    let sorted = sorted_copy(values);
    if sorted.is_empty() {
        return;
    }
    let at = |p: f64| duration_value(percentile(&sorted, p).unwrap_or(0.0));
    info.insert(keys.min.to_string(), duration_value(sorted[0]));
    info.insert(keys.p25.to_string(), at(0.25));
    info.insert(keys.median.to_string(), at(0.5));
    info.insert(keys.mean.to_string(), duration_value(mean(&sorted).unwrap_or(0.0)));
    info.insert(keys.p75.to_string(), at(0.75));
    info.insert(keys.max.to_string(), duration_value(sorted[sorted.len() - 1]));
}

/// Add the ladder of `values` to `info` as plain numbers, except that the mean is a string with
/// two decimals.  Nothing is added for an empty series.

pub fn size_ladder(info: &mut Info, keys: &LadderKeys, values: &[f64]) {
    let sorted = sorted_copy(values);
    if sorted.is_empty() {
        return;
    }
    let at = |p: f64| number_value(percentile(&sorted, p).unwrap_or(0.0));
    info.insert(keys.min.to_string(), number_value(sorted[0]));
    info.insert(keys.p25.to_string(), at(0.25));
    info.insert(keys.median.to_string(), at(0.5));
    info.insert(
        keys.mean.to_string(),
        Value::from(format!("{:.2}", mean(&sorted).unwrap_or(0.0))),
    );
    info.insert(keys.p75.to_string(), at(0.75));
    info.insert(keys.max.to_string(), number_value(sorted[sorted.len() - 1]));
}

/// Comma-joined version strings, in order of first appearance.

pub fn versions_value(versions: &[String]) -> Value {
    Value::from(versions.join(","))
}

/// Remember `version` unless it's already known.

pub fn note_version(versions: &mut Vec<String>, line: &str) {
    if let Some(v) = pbs_version(line) {
        if !versions.iter().any(|x| x == v) {
            versions.push(v.to_string());
        }
    }
}

pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

#[cfg(test)]
use crate::keys::{JOB_NODE_SIZE, JOB_WAIT_TIME};

#[test]
fn test_duration_ladder() {
    let mut info = Info::new();
    duration_ladder(&mut info, &JOB_WAIT_TIME, &[]);
    assert!(info.is_empty());

    duration_ladder(&mut info, &JOB_WAIT_TIME, &[600.0, 60.0, 3600.0, 120.0]);
    assert!(info["job_wait_time_min"] == "0:01:00");
    assert!(info["job_wait_time_max"] == "1:00:00");
    // (60 + 120 + 600 + 3600) / 4 = 1095
    assert!(info["job_wait_time_mean"] == "0:18:15");
    // k = 1.5 between 120 and 600
    assert!(info["job_wait_time_median"] == "0:06:00");
}

#[test]
fn test_size_ladder() {
    let mut info = Info::new();
    size_ladder(&mut info, &JOB_NODE_SIZE, &[4.0, 1.0, 2.0]);
    assert!(info["job_node_size_min"] == 1);
    assert!(info["job_node_size_max"] == 4);
    assert!(info["job_node_size_median"] == 2);
    assert!(info["job_node_size_25p"] == 1.5);
    assert!(info["job_node_size_mean"] == "2.33");
}

#[test]
fn test_versions() {
    let mut v = vec![];
    note_version(&mut v, "01/15/2024 10:00:00;0002;Server@pbs;Svr;Log;pbs_version=2022.1.3 ");
    note_version(&mut v, "no version here");
    note_version(&mut v, "01/16/2024 10:00:00;0002;Server@pbs;Svr;Log;pbs_version=2022.1.3");
    note_version(&mut v, "01/17/2024 10:00:00;0002;Server@pbs;Svr;Log;pbs_version=2024.1.0");
    assert!(versions_value(&v) == "2022.1.3,2024.1.0");
    assert!(rate_value(&[]) == 0);
}
