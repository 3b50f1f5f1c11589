//! Opaque pagination tokens.
//!
//! Both opportunity search and order listing are ordered by a
//! `(timestamp, id)` key. A [`PageCursor`] records the key of the last item
//! returned, and the next page resumes strictly after it. Resuming by key
//! rather than by offset keeps pages stable when items are inserted ahead of
//! the cursor.

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageCursor {
    pub timestamp: DateTime<Utc>,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed pagination token '{token}'")]
pub struct CursorError {
    pub token: String,
}

impl PageCursor {
    pub fn new(timestamp: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            timestamp,
            id: id.into(),
        }
    }

    /// Token form: `<unix seconds>.<nanoseconds>:<id>`.
    pub fn encode(&self) -> String {
        format!(
            "{}.{:09}:{}",
            self.timestamp.timestamp(),
            self.timestamp.timestamp_subsec_nanos(),
            self.id
        )
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let malformed = || CursorError {
            token: token.to_string(),
        };
        let (instant, id) = token.split_once(':').ok_or_else(malformed)?;
        let (secs, nanos) = instant.split_once('.').ok_or_else(malformed)?;
        let secs: i64 = secs.parse().map_err(|_| malformed())?;
        let nanos: u32 = nanos.parse().map_err(|_| malformed())?;
        let timestamp = DateTime::from_timestamp(secs, nanos).ok_or_else(malformed)?;
        Ok(Self::new(timestamp, id))
    }

    /// Whether an item with this key comes strictly after the cursor.
    pub fn precedes(&self, timestamp: DateTime<Utc>, id: &str) -> bool {
        (self.timestamp, self.id.as_str()) < (timestamp, id)
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_token_keeps_nanosecond_precision() {
        let timestamp = Utc.timestamp_opt(1_704_067_200, 123_456_789).unwrap();
        let cursor = PageCursor::new(timestamp, "opp:with:colons");
        let decoded = PageCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_precedes_is_strict() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cursor = PageCursor::new(timestamp, "b");
        assert!(!cursor.precedes(timestamp, "a"));
        assert!(!cursor.precedes(timestamp, "b"));
        assert!(cursor.precedes(timestamp, "c"));
        assert!(cursor.precedes(timestamp + chrono::Duration::seconds(1), "a"));
    }

    #[test]
    fn test_rejects_garbage() {
        for token in ["", "abc", "12:opp", "x.1:opp", "1.y:opp"] {
            assert!(PageCursor::decode(token).is_err(), "{token}");
        }
    }
}
