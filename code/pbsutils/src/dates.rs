/// Types and utilities for manipulating timestamps.
///
/// PBS logs write their record times as local wall-clock strings, `MM/DD/YYYY HH:MM:SS` with an
/// optional `.ffffff` microsecond part.  Internally a time is carried as seconds since the epoch in
/// an f64, so that records with and without microseconds are directly comparable and durations are
/// plain subtraction.  Records without microseconds always yield a whole number of seconds.
use chrono::{Local, NaiveDateTime, TimeZone, Timelike};
use tracing::debug;

pub type Timestamp = f64;

/// The record time format of scheduler, server and mom logs.

pub const LOG_TIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// The `ctime`-style format used by the scheduler for estimated start times, eg
/// `Mon Jan 15 10:00:00 2024`.

pub const CTIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

const LOG_TIME_FORMAT_MICRO: &str = "%m/%d/%Y %H:%M:%S%.f";

/// Parse `s` in the local time zone.  Without an explicit `fmt`, the log record format is assumed
/// and microseconds are detected by the presence of a '.'.  Returns None if the string can't be
/// parsed or does not name a valid local time; the failure is logged at debug level.

pub fn parse_timestamp(s: &str, fmt: Option<&str>) -> Option<Timestamp> {
    let (fmt, micro) = match fmt {
        Some(f) => (f, false),
        None => {
            if s.contains('.') {
                (LOG_TIME_FORMAT_MICRO, true)
            } else {
                (LOG_TIME_FORMAT, false)
            }
        }
    };

    // ctime pads single-digit days with a space, collapse runs of blanks before parsing.
    let normalized = s.split_whitespace().collect::<Vec<&str>>().join(" ");
    let naive = match NaiveDateTime::parse_from_str(&normalized, fmt) {
        Ok(t) => t,
        Err(e) => {
            debug!(input = s, error = %e, "could not convert date time");
            return None;
        }
    };
    let local = match Local.from_local_datetime(&naive).earliest() {
        Some(t) => t,
        None => {
            debug!(input = s, "date time does not exist in the local time zone");
            return None;
        }
    };
    let secs = local.timestamp() as f64;
    if micro {
        Some(secs + local.nanosecond() as f64 / 1_000_000_000.0)
    } else {
        Some(secs)
    }
}

/// Render a timestamp in the local time zone with a strftime-style format.

pub fn format_timestamp(t: Timestamp, fmt: &str) -> String {
    match Local.timestamp_opt(t.floor() as i64, 0).earliest() {
        Some(dt) => dt.format(fmt).to_string(),
        None => "".to_string(),
    }
}

/// The local calendar day of `t` as `YYYYMMDD`, which sorts and compares as a string.

pub fn local_day(t: Timestamp) -> String {
    format_timestamp(t, "%Y%m%d")
}

/// True if no bound is given, otherwise true iff `t` is within whichever of the inclusive bounds
/// are present.

pub fn in_range(t: Timestamp, start: Option<Timestamp>, end: Option<Timestamp>) -> bool {
    match (start, end) {
        (None, None) => true,
        (None, Some(e)) => t <= e,
        (Some(s), None) => t >= s,
        (Some(s), Some(e)) => t >= s && t <= e,
    }
}

/// Format a number of seconds as `H:MM:SS`, or `D day(s), H:MM:SS` when it's at least a day.
/// Fractional seconds are truncated.  Negative values borrow whole days, so -5 is
/// `-1 day, 23:59:55`.

pub fn duration_string(seconds: f64) -> String {
    let total = seconds.trunc() as i64;
    let days = total.div_euclid(86400);
    let rem = total.rem_euclid(86400);
    let hms = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
    if days == 0 {
        hms
    } else {
        let plural = if days.abs() != 1 { "s" } else { "" };
        format!("{days} day{plural}, {hms}")
    }
}

#[test]
fn test_parse_timestamp() {
    let t0 = parse_timestamp("01/15/2024 10:00:00", None).unwrap();
    let t1 = parse_timestamp("01/15/2024 10:01:05", None).unwrap();
    assert!(t1 - t0 == 65.0);
    assert!(t0.fract() == 0.0);

    let t2 = parse_timestamp("01/15/2024 10:00:00.250000", None).unwrap();
    assert!((t2 - t0 - 0.25).abs() < 1e-6);

    assert!(parse_timestamp("2024-01-15 10:00:00", None).is_none());
    assert!(parse_timestamp("01/15/2024 25:00:00", None).is_none());
    assert!(parse_timestamp("", None).is_none());
}

#[test]
fn test_parse_ctime() {
    let t0 = parse_timestamp("Mon Jan 15 10:00:00 2024", Some(CTIME_FORMAT)).unwrap();
    let t1 = parse_timestamp("01/15/2024 10:00:00", None).unwrap();
    assert!(t0 == t1);

    // Space-padded day of month
    let t2 = parse_timestamp("Fri Feb  2 10:00:00 2024", Some(CTIME_FORMAT)).unwrap();
    let t3 = parse_timestamp("02/02/2024 10:00:00", None).unwrap();
    assert!(t2 == t3);

    assert!(parse_timestamp("sometime next week", Some(CTIME_FORMAT)).is_none());
}

#[test]
fn test_in_range() {
    assert!(in_range(5.0, None, None));
    assert!(in_range(5.0, Some(5.0), None));
    assert!(!in_range(4.0, Some(5.0), None));
    assert!(in_range(5.0, None, Some(5.0)));
    assert!(!in_range(6.0, None, Some(5.0)));
    assert!(in_range(5.0, Some(1.0), Some(9.0)));
    assert!(!in_range(10.0, Some(1.0), Some(9.0)));
}

#[test]
fn test_duration_string() {
    assert!(duration_string(0.0) == "0:00:00");
    assert!(duration_string(65.9) == "0:01:05");
    assert!(duration_string(3600.0 * 5.0 + 7.0) == "5:00:07");
    assert!(duration_string(86400.0) == "1 day, 0:00:00");
    assert!(duration_string(2.0 * 86400.0 + 61.0) == "2 days, 0:01:01");
    assert!(duration_string(-5.0) == "-1 day, 23:59:55");
}

#[test]
fn test_format_timestamp() {
    let t = parse_timestamp("01/15/2024 10:20:30", None).unwrap();
    assert!(format_timestamp(t, "%Y-%m-%d %H:%M:%S") == "2024-01-15 10:20:30");
    assert!(local_day(t) == "20240115");
}
