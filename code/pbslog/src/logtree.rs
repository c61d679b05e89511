/// Enumerate the log files named by a path.
///
/// PBS writes one file per day per log type, named `YYYYMMDD`, into a flat directory.  We don't
/// trust the names: when a time window is given, a file is kept only if the local day of its first
/// record falls within the days of the window.
use crate::logfile::TimeWindow;

use anyhow::{bail, Result};
use pbsutils::{local_day, parse_timestamp, Timestamp};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path;
use tracing::debug;

/// Return the log files for `log_path`, which names either a file or a directory of files.  A file
/// is returned as-is, without looking at its contents.  The files of a directory are sorted
/// lexicographically; subdirectories and names that are not UTF8 are ignored.
///
/// Returns an error if the path does not exist or the directory can't be read.  Files that can't be
/// opened while filtering are skipped.

pub fn find_logfiles(log_path: &str, window: &TimeWindow) -> Result<Vec<String>> {
    let p = path::Path::new(log_path);
    if p.is_file() {
        return Ok(vec![log_path.to_string()]);
    }
    if !p.is_dir() {
        bail!("No such log file or directory: {log_path}");
    }

    let mut candidates = vec![];
    for entry in p.read_dir()? {
        let Ok(entry) = entry else {
            // Bad directory entries are ignored, as for read errors elsewhere we assume forward
            // progress.
            continue;
        };
        let ep = entry.path();
        if !ep.is_file() {
            continue;
        }
        if let Some(s) = ep.to_str() {
            candidates.push(s.to_string());
        }
    }
    candidates.sort();

    if window.is_unbounded() {
        return Ok(candidates);
    }

    let first_day = window.start.map(local_day);
    let last_day = window.end.map(local_day);
    let stamp = Regex::new(r"^(\d\d/\d\d/\d{4})[\s;]+(\d\d:\d\d:\d\d)")?;
    let mut filenames = vec![];
    for f in candidates {
        let Some(t) = first_record_time(&f, &stamp) else {
            debug!(file = f.as_str(), "no leading timestamp, skipping");
            continue;
        };
        let day = local_day(t);
        if let Some(d) = &first_day {
            if day < *d {
                continue;
            }
        }
        if let Some(d) = &last_day {
            if day > *d {
                continue;
            }
        }
        filenames.push(f);
    }
    Ok(filenames)
}

// The time of the first non-blank line, if that line starts with a timestamp.

fn first_record_time(file_name: &str, stamp: &Regex) -> Option<Timestamp> {
    let file = File::open(file_name).ok()?;
    let reader = BufReader::new(file);
    for line in reader.split(b'\n') {
        let line = line.ok()?;
        let text = String::from_utf8_lossy(&line);
        if text.trim().is_empty() {
            continue;
        }
        let caps = stamp.captures(&text)?;
        return parse_timestamp(&format!("{} {}", &caps[1], &caps[2]), None);
    }
    None
}

#[cfg(test)]
fn window(start: &str, end: &str) -> TimeWindow {
    TimeWindow::new(parse_timestamp(start, None), parse_timestamp(end, None))
}

#[test]
fn test_find_logfiles1() {
    // No window, all files in order.
    let xs = find_logfiles("../tests/pbslog/logdir", &TimeWindow::default()).unwrap();
    assert!(xs.eq(&vec![
        "../tests/pbslog/logdir/20240114",
        "../tests/pbslog/logdir/20240115",
        "../tests/pbslog/logdir/20240116",
    ]));
}

#[test]
fn test_find_logfiles2() {
    // The window covers part of one day, and that day's file is included in full.
    let xs = find_logfiles(
        "../tests/pbslog/logdir",
        &window("01/15/2024 12:00:00", "01/15/2024 13:00:00"),
    )
    .unwrap();
    assert!(xs.eq(&vec!["../tests/pbslog/logdir/20240115"]));

    // Open-ended windows.
    let xs = find_logfiles(
        "../tests/pbslog/logdir",
        &TimeWindow::new(parse_timestamp("01/15/2024 23:00:00", None), None),
    )
    .unwrap();
    assert!(xs.eq(&vec![
        "../tests/pbslog/logdir/20240115",
        "../tests/pbslog/logdir/20240116",
    ]));
}

#[test]
fn test_find_logfiles3() {
    // The file name does not decide, the first record does.  The directory has a file that
    // starts with a blank line and a file with no timestamps at all.
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    std::fs::write(&a, "\n01/15/2024;10:00:00;E;1.pbs;user=x\n").unwrap();
    std::fs::write(&b, "no time here\n").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    let xs = find_logfiles(
        dir.path().to_str().unwrap(),
        &window("01/15/2024 00:00:00", "01/15/2024 23:59:59"),
    )
    .unwrap();
    assert!(xs.len() == 1);
    assert!(xs[0].ends_with("/a"));

    let xs = find_logfiles(dir.path().to_str().unwrap(), &TimeWindow::default()).unwrap();
    assert!(xs.len() == 2);
}

#[test]
fn test_find_logfiles4() {
    // A plain file is returned even if it's outside the window; nonexistent paths are errors.
    let xs = find_logfiles(
        "../tests/pbslog/logdir/20240114",
        &window("01/15/2024 00:00:00", "01/15/2024 23:59:59"),
    )
    .unwrap();
    assert!(xs.len() == 1);
    assert!(find_logfiles("../tests/pbslog/no-such-dir", &TimeWindow::default()).is_err());
}
