use crate::error::CaptureError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;

/// Opaque pagination token `"<RFC3339Nano>:<sequence>"`.
///
/// Only the sequence participates in ordering; the timestamp is carried so a
/// client can tell roughly where in time a cursor points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub timestamp: String,
    pub sequence: u64,
}

impl Cursor {
    pub fn new(at: DateTime<Utc>, sequence: u64) -> Self {
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            sequence,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.timestamp, self.sequence)
    }
}

impl FromStr for Cursor {
    type Err = CaptureError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        // RFC3339 timestamps contain colons; the sequence follows the last one.
        let (timestamp, sequence) = raw
            .rsplit_once(':')
            .ok_or_else(|| CaptureError::InvalidCursor(format!("missing sequence in '{raw}'")))?;
        let sequence = sequence
            .parse::<u64>()
            .map_err(|_| CaptureError::InvalidCursor(format!("bad sequence in '{raw}'")))?;
        DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| CaptureError::InvalidCursor(format!("bad timestamp in '{raw}'")))?;

        Ok(Self {
            timestamp: timestamp.to_string(),
            sequence,
        })
    }
}
