//! Shared helpers.

use std::fmt;

/// Number of characters a value must have before any of it is shown.
const REDACT_MIN_LEN: usize = 12;

/// Masks a secret in `Debug` output.
///
/// Long values keep their first and last three characters so two keys can
/// be told apart in a log line; anything shorter than twelve characters is
/// fully masked.
pub struct Redact<'a>(&'a str);

impl<'a> From<&'a String> for Redact<'a> {
    fn from(value: &'a String) -> Self {
        Redact(value)
    }
}

impl<'a> From<&'a Option<String>> for Redact<'a> {
    fn from(value: &'a Option<String>) -> Self {
        Redact(value.as_deref().unwrap_or(""))
    }
}

impl fmt::Debug for Redact<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            "" => f.write_str("EMPTY"),
            s if s.len() < REDACT_MIN_LEN => f.write_str("***"),
            s => write!(f, "{}***{}", &s[..3], &s[s.len() - 3..]),
        }
    }
}
