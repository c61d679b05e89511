/// Summary statistics over series of timestamps and durations.  All inputs are expected to be
/// sorted ascending already; nothing here sorts.
use crate::Timestamp;

// Unit multipliers applied in turn while the rate is below 1/unit.
const RATE_UNITS: [(f64, &str); 4] = [(1.0, "s"), (60.0, "mn"), (60.0, "hr"), (24.0, "day")];

/// The frequency of events in a sorted series of timestamps, as `"<value>/<unit>"` where the value
/// has two decimals and the unit is the smallest of s, mn, hr, day for which the value is at least
/// 1 (or day, if it never gets there).  A series spanning zero time yields `"<count>/s"`.  Returns
/// None for the empty series.

pub fn rate(sorted: &[Timestamp]) -> Option<String> {
    if sorted.is_empty() {
        return None;
    }
    let duration = sorted[sorted.len() - 1] - sorted[0];
    if duration <= 0.0 {
        return Some(format!("{}/s", sorted.len()));
    }
    let mut r = sorted.len() as f64 / duration;
    let mut index = 0;
    while r < 1.0 && index + 1 < RATE_UNITS.len() {
        index += 1;
        r *= RATE_UNITS[index].0;
    }
    Some(format!("{:.2}/{}", r, RATE_UNITS[index].1))
}

/// Linear-interpolation percentile, `p` in [0.0, 1.0], of a sorted series.  None for the empty
/// series.

pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let k = (sorted.len() - 1) as f64 * p;
    let f = k.floor();
    let c = k.ceil();
    if f == c {
        return Some(sorted[k as usize]);
    }
    let d0 = sorted[f as usize] * (c - k);
    let d1 = sorted[c as usize] * (k - f);
    Some(d0 + d1)
}

/// Plain arithmetic mean.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// The element at index len/2 (floor) of a sorted series: the upper median for even lengths, not
/// interpolated.

pub fn middle(sorted: &[f64]) -> Option<f64> {
    sorted.get(sorted.len() / 2).copied()
}

#[test]
fn test_rate() {
    assert!(rate(&[]).is_none());
    assert!(rate(&[5.0]).unwrap() == "1/s");
    assert!(rate(&[5.0, 5.0, 5.0]).unwrap() == "3/s");
    // 4 events in 2 seconds
    assert!(rate(&[0.0, 1.0, 1.0, 2.0]).unwrap() == "2.00/s");
    // 2 events in 60 seconds is 2/mn
    assert!(rate(&[0.0, 60.0]).unwrap() == "2.00/mn");
    // 2 events in 2 hours
    assert!(rate(&[0.0, 7200.0]).unwrap() == "1.00/hr");
    // 2 events in 4 days is still below 1/day, clamped to the last unit
    assert!(rate(&[0.0, 4.0 * 86400.0]).unwrap() == "0.50/day");
}

#[test]
fn test_percentile() {
    assert!(percentile(&[], 0.5).is_none());
    let odd = [1.0, 3.0, 7.0, 9.0, 20.0];
    assert!(percentile(&odd, 0.5).unwrap() == 7.0);
    assert!(percentile(&odd, 0.0).unwrap() == 1.0);
    assert!(percentile(&odd, 1.0).unwrap() == 20.0);
    assert!(percentile(&odd, 0.25).unwrap() == 3.0);
    let even = [1.0, 2.0, 3.0, 4.0];
    // k = 1.5
    assert!(percentile(&even, 0.5).unwrap() == 2.5);
    // k = 0.75
    assert!(percentile(&even, 0.25).unwrap() == 1.75);
}

#[test]
fn test_mean_and_middle() {
    assert!(mean(&[]).is_none());
    assert!(mean(&[1.0, 2.0, 6.0]).unwrap() == 3.0);
    assert!(middle(&[]).is_none());
    assert!(middle(&[1.0, 2.0, 6.0]).unwrap() == 2.0);
    assert!(middle(&[1.0, 2.0, 6.0, 8.0]).unwrap() == 6.0);
}
