// Utilities shared by pbslog and pbsanalyze.

mod configs;
mod dates;
mod stats;
mod values;

// The configuration of one analysis run: sources, time window and mode switches.

pub use configs::AnalysisConfig;
pub use configs::DEFAULT_CUSTOM_FREQUENCY;

// Read an analysis configuration from a json file.

pub use configs::read_analysis_config;

// Types and utilities for manipulating timestamps.

pub use dates::Timestamp;
pub use dates::CTIME_FORMAT;
pub use dates::LOG_TIME_FORMAT;

// Parse a &str into a Timestamp, in local time.

pub use dates::parse_timestamp;

// Render a Timestamp in local time.

pub use dates::format_timestamp;
pub use dates::local_day;

// Test whether a timestamp is within optional inclusive bounds.

pub use dates::in_range;

// Seconds as "D days, H:MM:SS".

pub use dates::duration_string;

// Rates and order statistics over sorted series.

pub use stats::mean;
pub use stats::middle;
pub use stats::percentile;
pub use stats::rate;

// Typed decoding of raw attribute values, and the inverse for memory sizes.

pub use values::add_values;
pub use values::compare_values;
pub use values::decode_value;
pub use values::encode_size;
pub use values::parse_duration;
pub use values::parse_size;
pub use values::DecodedValue;
pub use values::DurationError;
pub use values::SizeError;
pub use values::SizeUnit;
