//! Time related utils.

use crate::{Error, Result};
use chrono::TimeDelta;
use chrono::Utc;

/// DateTime used by all signers, always in UTC.
pub type DateTime = chrono::DateTime<Utc>;

/// Get the current time.
pub fn now() -> DateTime {
    Utc::now()
}

/// Format time into date: `20220301`
pub fn format_date(t: DateTime) -> String {
    t.format("%Y%m%d").to_string()
}

/// Format time into ISO8601: `20220313T072004Z`
pub fn format_iso8601(t: DateTime) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Parse an ISO8601 timestamp like `20220313T072004Z`.
pub fn parse_iso8601(s: &str) -> Result<DateTime> {
    let t = chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%SZ")
        .map_err(|e| Error::unexpected(format!("failed to parse time {s}: {e}")))?;
    Ok(t.and_utc())
}

/// Number of complete UTC days since the Unix epoch.
///
/// AWS derives one signing key per UTC calendar day, so key reuse is keyed
/// on this value rather than on any duration.
pub fn days_since_epoch(t: DateTime) -> i64 {
    t.timestamp().div_euclid(86_400)
}

/// Clock supplies the signing instant.
///
/// It supports a fixed skew offset for clock-skew correction against the
/// service, and a full override for deterministic signing.
///
/// # Note
///
/// We should always take the current time to sign requests. Only use the
/// override for testing or when reproducing a known signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    fixed: Option<DateTime>,
    offset_secs: i64,
}

impl Clock {
    /// Clock that always returns the given instant.
    pub fn fixed(t: DateTime) -> Self {
        Self {
            fixed: Some(t),
            offset_secs: 0,
        }
    }

    /// Apply a fixed offset in seconds to the system time.
    ///
    /// Positive values move the signing instant forward.
    pub fn with_offset_secs(mut self, secs: i64) -> Self {
        self.offset_secs = secs;
        self
    }

    /// The signing instant according to this clock.
    pub fn now(&self) -> DateTime {
        let base = self.fixed.unwrap_or_else(now);
        base + TimeDelta::seconds(self.offset_secs)
    }
}
