/// Type inference for raw attribute values in PBS logs.
///
/// Accounting records carry attributes like `Resource_List.mem=150mb`, `resources_used.walltime=
/// 01:02:03` and `Resource_List.ncpus=4` as untyped text.  `decode_value` turns such a string into a
/// `DecodedValue`, normalizing durations to seconds and memory sizes to kilobytes.  Decoding never
/// fails: anything that can't be understood comes back as `DecodedValue::String`.
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Integer(i64),
    Float(f64),
    /// Seconds.
    Duration(i64),
    /// Kilobytes.
    SizeKb(i64),
    String(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum SizeError {
    #[error("Malformed size value '{0}'")]
    Malformed(String),
    #[error("Unknown size unit in '{0}'")]
    UnknownUnit(String),
}

#[derive(Debug, Error, PartialEq)]
#[error("Malformed duration '{0}'")]
pub struct DurationError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    B,
    Kb,
    Mb,
    Gb,
    Tb,
    Pb,
}

impl SizeUnit {
    // Ordered largest first, which is the search order for encoding.
    const ALL: [SizeUnit; 6] = [
        SizeUnit::Pb,
        SizeUnit::Tb,
        SizeUnit::Gb,
        SizeUnit::Mb,
        SizeUnit::Kb,
        SizeUnit::B,
    ];

    pub fn bytes(self) -> i64 {
        match self {
            SizeUnit::B => 1,
            SizeUnit::Kb => 1 << 10,
            SizeUnit::Mb => 1 << 20,
            SizeUnit::Gb => 1 << 30,
            SizeUnit::Tb => 1 << 40,
            SizeUnit::Pb => 1 << 50,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            SizeUnit::B => "b",
            SizeUnit::Kb => "kb",
            SizeUnit::Mb => "mb",
            SizeUnit::Gb => "gb",
            SizeUnit::Tb => "tb",
            SizeUnit::Pb => "pb",
        }
    }

    /// Case-insensitive lookup of a unit suffix.
    pub fn from_suffix(s: &str) -> Option<SizeUnit> {
        let lower = s.to_ascii_lowercase();
        SizeUnit::ALL.iter().copied().find(|u| u.suffix() == lower)
    }
}

/// Infer the type of `s`.  The order of the tests matters: an all-digit string is an integer
/// before anything else, and a string with a ':' is only a duration if it's not also a float.

pub fn decode_value(s: &str) -> DecodedValue {
    if !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit()) {
        return match s.parse::<i64>() {
            Ok(n) => DecodedValue::Integer(n),
            Err(_) => DecodedValue::String(s.to_string()),
        };
    }
    if s.is_empty() || s.chars().all(|c| c.is_alphabetic()) {
        return DecodedValue::String(s.to_string());
    }
    if let Ok(f) = s.trim().parse::<f64>() {
        return DecodedValue::Float(f);
    }
    if s.contains(':') {
        return match parse_duration(s) {
            Ok(secs) => DecodedValue::Duration(secs),
            Err(_) => DecodedValue::String(s.to_string()),
        };
    }
    match parse_size(s) {
        Ok(kb) => DecodedValue::SizeKb(kb),
        Err(_) => DecodedValue::String(s.to_string()),
    }
}

/// Parse `[[HH:]MM:]SS` into seconds.  Fields are unsigned integers; the leading field may be
/// larger than its nominal range (eg `100:00:00`).

pub fn parse_duration(s: &str) -> Result<i64, DurationError> {
    let parts = s.trim().split(':').collect::<Vec<&str>>();
    if parts.len() > 3 {
        return Err(DurationError(s.to_string()));
    }
    let mut secs = 0i64;
    for p in parts {
        if p.is_empty() || !p.bytes().all(|c| c.is_ascii_digit()) {
            return Err(DurationError(s.to_string()));
        }
        let n = p.parse::<i64>().map_err(|_| DurationError(s.to_string()))?;
        secs = secs * 60 + n;
    }
    Ok(secs)
}

/// Parse a memory size with a unit suffix into kilobytes.  A bare `b` or `B` suffix means bytes;
/// otherwise the last two characters must be one of kb, mb, gb, tb, pb in any case.  Byte counts
/// are truncated to whole kilobytes.

pub fn parse_size(s: &str) -> Result<i64, SizeError> {
    if s.len() < 2 || !s.is_ascii() {
        return Err(SizeError::Malformed(s.to_string()));
    }
    let (prefix, unit) = {
        let (p, u) = s.split_at(s.len() - 1);
        if (u == "b" || u == "B") && is_digits(p) {
            (p, SizeUnit::B)
        } else {
            let (p, u) = s.split_at(s.len() - 2);
            match SizeUnit::from_suffix(u) {
                Some(unit) => (p, unit),
                None => return Err(SizeError::UnknownUnit(s.to_string())),
            }
        }
    };
    if !is_digits(prefix) {
        return Err(SizeError::Malformed(s.to_string()));
    }
    let n = prefix
        .parse::<i64>()
        .map_err(|_| SizeError::Malformed(s.to_string()))?;
    match unit {
        SizeUnit::B => Ok(n / 1024),
        _ => n
            .checked_mul(unit.bytes() / SizeUnit::Kb.bytes())
            .ok_or_else(|| SizeError::Malformed(s.to_string())),
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit())
}

/// Render `value`, expressed in `unit`, with the largest unit whose size does not exceed it.
/// Values below one byte are rendered in bytes.

pub fn encode_size(value: i64, unit: SizeUnit, precision: usize) -> String {
    let bytes = value as f64 * unit.bytes() as f64;
    let target = SizeUnit::ALL
        .iter()
        .copied()
        .find(|u| u.bytes() as f64 <= bytes)
        .unwrap_or(SizeUnit::B);
    format!(
        "{:.*}{}",
        precision,
        bytes / target.bytes() as f64,
        target.suffix()
    )
}

impl DecodedValue {
    /// The numeric content, if any.  Durations are seconds and sizes are kilobytes.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DecodedValue::Integer(n) | DecodedValue::Duration(n) | DecodedValue::SizeKb(n) => {
                Some(*n as f64)
            }
            DecodedValue::Float(f) => Some(*f),
            DecodedValue::String(_) => None,
        }
    }

    /// The value as it would be presented in a JSON report: numbers as numbers, strings as strings.
    pub fn to_json(&self) -> Value {
        match self {
            DecodedValue::Integer(n) | DecodedValue::Duration(n) | DecodedValue::SizeKb(n) => {
                Value::from(*n)
            }
            DecodedValue::Float(f) => Value::from(*f),
            DecodedValue::String(s) => Value::from(s.as_str()),
        }
    }
}

/// Compare two decoded values.  Numeric values of any kind compare by magnitude, strings compare
/// lexically, and a number never compares with a string.

pub fn compare_values(a: &DecodedValue, b: &DecodedValue) -> Option<Ordering> {
    match (a, b) {
        (DecodedValue::String(x), DecodedValue::String(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

/// Add two decoded values of the same kind.  Integers and floats mix into a float; durations only
/// add to durations and sizes only to sizes.  Anything else is None.

pub fn add_values(a: &DecodedValue, b: &DecodedValue) -> Option<DecodedValue> {
    use DecodedValue::*;
    match (a, b) {
        (Integer(x), Integer(y)) => x.checked_add(*y).map(Integer),
        (Duration(x), Duration(y)) => x.checked_add(*y).map(Duration),
        (SizeKb(x), SizeKb(y)) => x.checked_add(*y).map(SizeKb),
        (Float(x), Float(y)) => Some(Float(x + y)),
        (Integer(x), Float(y)) | (Float(y), Integer(x)) => Some(Float(*x as f64 + y)),
        _ => None,
    }
}

#[test]
fn test_decode_scalars() {
    assert!(decode_value("42") == DecodedValue::Integer(42));
    assert!(decode_value("") == DecodedValue::String("".to_string()));
    assert!(decode_value("hello") == DecodedValue::String("hello".to_string()));
    assert!(decode_value("3.5") == DecodedValue::Float(3.5));
    assert!(decode_value("-2") == DecodedValue::Float(-2.0));
    assert!(decode_value("node01") == DecodedValue::String("node01".to_string()));
    // Too large for i64
    assert!(decode_value("99999999999999999999") == DecodedValue::String("99999999999999999999".to_string()));
}

#[test]
fn test_decode_duration() {
    assert!(decode_value("01:02:03") == DecodedValue::Duration(3723));
    assert!(decode_value("02:03") == DecodedValue::Duration(123));
    assert!(decode_value("100:00:00") == DecodedValue::Duration(360000));
    assert!(decode_value("1:2:3:4") == DecodedValue::String("1:2:3:4".to_string()));
    assert!(decode_value("ab:cd") == DecodedValue::String("ab:cd".to_string()));
    assert!(parse_duration("12").unwrap() == 12);
    assert!(parse_duration("1::2").is_err());
}

#[test]
fn test_decode_size() {
    assert!(decode_value("150mb") == DecodedValue::SizeKb(150 * 1024));
    assert!(decode_value("2gb") == DecodedValue::SizeKb(2 * 1024 * 1024));
    assert!(decode_value("1gb") == DecodedValue::SizeKb(1048576));
    assert!(decode_value("4KB") == DecodedValue::SizeKb(4));
    assert!(decode_value("1tb") == DecodedValue::SizeKb(1 << 30));
    assert!(decode_value("2048b") == DecodedValue::SizeKb(2));
    assert!(decode_value("100B") == DecodedValue::SizeKb(0));
    assert!(decode_value("10zb") == DecodedValue::String("10zb".to_string()));
    assert!(decode_value("x1gb") == DecodedValue::String("x1gb".to_string()));

    assert!(parse_size("10zb") == Err(SizeError::UnknownUnit("10zb".to_string())));
    assert!(parse_size("x1gb") == Err(SizeError::Malformed("x1gb".to_string())));
    assert!(parse_size("5") == Err(SizeError::Malformed("5".to_string())));
}

#[test]
fn test_encode_size() {
    assert!(encode_size(1048576, SizeUnit::Kb, 1) == "1.0gb");
    assert!(encode_size(153600, SizeUnit::Kb, 1) == "150.0mb");
    assert!(encode_size(1536, SizeUnit::Kb, 2) == "1.50mb");
    assert!(encode_size(512, SizeUnit::B, 1) == "512.0b");
    assert!(encode_size(0, SizeUnit::Kb, 1) == "0.0b");
    assert!(encode_size(1 << 30, SizeUnit::Kb, 1) == "1.0tb");
    assert!(encode_size(1 << 40, SizeUnit::Kb, 1) == "1.0pb");
}

#[test]
fn test_compare_and_add() {
    let a = decode_value("1gb");
    let b = decode_value("512mb");
    assert!(compare_values(&a, &b) == Some(Ordering::Greater));
    assert!(compare_values(&decode_value("abc"), &decode_value("abd")) == Some(Ordering::Less));
    assert!(compare_values(&decode_value("abc"), &decode_value("12")).is_none());
    assert!(add_values(&a, &b) == Some(DecodedValue::SizeKb(1048576 + 524288)));
    assert!(add_values(&decode_value("2"), &decode_value("0.5")) == Some(DecodedValue::Float(2.5)));
    assert!(add_values(&a, &decode_value("01:00")).is_none());
}
