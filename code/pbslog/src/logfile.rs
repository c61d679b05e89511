/// Stream the lines of PBS log files through an analyzer.
///
/// NOTE:
///
/// - Lines are handed to the analyzer one at a time in file order.  Record state (scheduling
///   cycles in particular) depends on that order, so nothing here reorders or parallelizes.
///
/// - Invalid UTF8 is replaced, not rejected.  Log files are appended to while we read them and a
///   partly-written last line is likely; the analyzers drop lines they can't make sense of.
///
/// - An I/O error aborts the analysis, a bad line never does.
use crate::logtree::find_logfiles;

use anyhow::Result;
use pbsutils::{in_range, Timestamp};
use std::fs::File;
use std::io::{BufRead, BufReader};
use tracing::debug;

/// What an analyzer wants to happen after seeing a line.  The error variants are informational
/// here, the driver only distinguishes continuing from stopping.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    Continue,
    Stop,
    ErrorContinue,
    ErrorStop,
}

impl ParseStatus {
    pub fn is_stop(self) -> bool {
        matches!(self, ParseStatus::Stop | ParseStatus::ErrorStop)
    }
}

/// Inclusive bounds on record times; either or both may be absent.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeWindow {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl TimeWindow {
    pub fn new(start: Option<Timestamp>, end: Option<Timestamp>) -> TimeWindow {
        TimeWindow { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, t: Timestamp) -> bool {
        in_range(t, self.start, self.end)
    }

    /// True if `t` is after the end of the window, ie, no later record in a time-ordered file can
    /// be in the window.
    pub fn is_past(&self, t: Timestamp) -> bool {
        match self.end {
            Some(e) => t > e,
            None => false,
        }
    }

    /// The usual per-record gate: Continue for in-window times, Stop once past the window, and
    /// None (skip the line) for times before it.
    pub fn gate(&self, t: Timestamp) -> Option<ParseStatus> {
        if self.contains(t) {
            Some(ParseStatus::Continue)
        } else if self.is_past(t) {
            Some(ParseStatus::Stop)
        } else {
            None
        }
    }
}

/// One consumer of log lines.  The driver calls `analyze_line` for every line of every file,
/// `end_of_file` after each file with the last line read from it, and `finalize` once after all
/// files.

pub trait LineAnalyzer {
    fn analyze_line(&mut self, line: &str, window: &TimeWindow) -> ParseStatus;

    fn end_of_file(&mut self, _last_line: Option<&str>) {}

    fn finalize(&mut self) {}
}

/// Read `file_name` line by line into `analyzer` until the end of the file or until the analyzer
/// asks to stop.  Returns the number of lines read.  Line terminators are stripped.

pub fn parse_logfile(
    file_name: &str,
    analyzer: &mut dyn LineAnalyzer,
    window: &TimeWindow,
) -> Result<usize> {
    let file = File::open(file_name)?;
    let mut reader = BufReader::new(file);
    let mut buf = vec![];
    let mut last_line: Option<String> = None;
    let mut num_lines = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        num_lines += 1;
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(&['\n', '\r'][..]);
        let status = analyzer.analyze_line(line, window);
        last_line = Some(line.to_string());
        if status.is_stop() {
            debug!(file = file_name, line = num_lines, ?status, "stopped reading");
            break;
        }
    }
    analyzer.end_of_file(last_line.as_deref());
    Ok(num_lines)
}

/// Analyze every log file named by `paths`, each of which is a file or a directory of files, and
/// finalize the analyzer.

pub fn analyze_paths(
    paths: &[String],
    analyzer: &mut dyn LineAnalyzer,
    window: &TimeWindow,
) -> Result<()> {
    for p in paths {
        for f in find_logfiles(p, window)? {
            debug!(file = f.as_str(), "reading log file");
            parse_logfile(&f, analyzer, window)?;
        }
    }
    analyzer.finalize();
    Ok(())
}

#[cfg(test)]
struct Collect {
    lines: Vec<String>,
    last: Vec<Option<String>>,
    finalized: usize,
    stop_at: Option<&'static str>,
}

#[cfg(test)]
impl LineAnalyzer for Collect {
    fn analyze_line(&mut self, line: &str, _window: &TimeWindow) -> ParseStatus {
        self.lines.push(line.to_string());
        if Some(line) == self.stop_at {
            ParseStatus::Stop
        } else {
            ParseStatus::Continue
        }
    }

    fn end_of_file(&mut self, last_line: Option<&str>) {
        self.last.push(last_line.map(|s| s.to_string()));
    }

    fn finalize(&mut self) {
        self.finalized += 1;
    }
}

#[test]
fn test_parse_logfile() {
    use std::io::Write;
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(b"first\r\nsecond\nbad \xff byte\nlast").unwrap();
    let mut c = Collect {
        lines: vec![],
        last: vec![],
        finalized: 0,
        stop_at: None,
    };
    let n = parse_logfile(f.path().to_str().unwrap(), &mut c, &TimeWindow::default()).unwrap();
    assert!(n == 4);
    assert!(c.lines[0] == "first");
    assert!(c.lines[1] == "second");
    assert!(c.lines[2] == "bad \u{FFFD} byte");
    assert!(c.lines[3] == "last");
    assert!(c.last == vec![Some("last".to_string())]);
    assert!(c.finalized == 0);

    let mut c = Collect {
        lines: vec![],
        last: vec![],
        finalized: 0,
        stop_at: Some("second"),
    };
    let n = parse_logfile(f.path().to_str().unwrap(), &mut c, &TimeWindow::default()).unwrap();
    assert!(n == 2);
    assert!(c.last == vec![Some("second".to_string())]);
}

#[test]
fn test_analyze_paths() {
    let mut c = Collect {
        lines: vec![],
        last: vec![],
        finalized: 0,
        stop_at: None,
    };
    analyze_paths(
        &["../tests/pbslog/logdir".to_string(), "../tests/pbslog/mom.log".to_string()],
        &mut c,
        &TimeWindow::default(),
    )
    .unwrap();
    // Three files in the directory plus one
    assert!(c.last.len() == 4);
    assert!(c.finalized == 1);

    assert!(analyze_paths(&["../tests/pbslog/nope".to_string()], &mut c, &TimeWindow::default()).is_err());
}

#[test]
fn test_time_window() {
    let w = TimeWindow::new(Some(10.0), Some(20.0));
    assert!(w.gate(5.0).is_none());
    assert!(w.gate(10.0) == Some(ParseStatus::Continue));
    assert!(w.gate(20.0) == Some(ParseStatus::Continue));
    assert!(w.gate(21.0) == Some(ParseStatus::Stop));
    let w = TimeWindow::default();
    assert!(w.is_unbounded());
    assert!(w.gate(1e12) == Some(ParseStatus::Continue));
}
