//! Closed datetime interval, serialized in the STAPI `start/end` form
//! (`"2024-01-01T00:00:00Z/2024-01-01T01:00:00Z"`).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatetimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DatetimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Closed-interval overlap; touching endpoints count.
    pub fn overlaps(&self, other: &DatetimeInterval) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for DatetimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

impl FromStr for DatetimeInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('/')
            .ok_or_else(|| format!("Invalid datetime interval (expected start/end): {s}"))?;
        let parse = |part: &str| {
            DateTime::parse_from_rfc3339(part.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| format!("Invalid datetime '{part}': {e}"))
        };
        Ok(Self {
            start: parse(start)?,
            end: parse(end)?,
        })
    }
}

impl Serialize for DatetimeInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DatetimeInterval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let interval: DatetimeInterval = "2024-01-01T00:00:00Z/2024-01-01T01:00:00Z"
            .parse()
            .unwrap();
        assert_eq!(interval.start, at(0));
        assert_eq!(interval.end, at(1));
        assert_eq!(interval.duration(), Duration::hours(1));
        assert_eq!(
            interval.to_string(),
            "2024-01-01T00:00:00+00:00/2024-01-01T01:00:00+00:00"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("2024-01-01T00:00:00Z".parse::<DatetimeInterval>().is_err());
        assert!("yesterday/today".parse::<DatetimeInterval>().is_err());
    }

    #[test]
    fn test_overlap_is_closed() {
        let a = DatetimeInterval::new(at(0), at(2));
        let b = DatetimeInterval::new(at(2), at(4));
        let c = DatetimeInterval::new(at(3), at(4));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!DatetimeInterval::new(at(2), at(1)).is_valid());
    }

    #[test]
    fn test_serde_string_form() {
        let interval = DatetimeInterval::new(at(0), at(1));
        let json = serde_json::to_string(&interval).unwrap();
        let parsed: DatetimeInterval = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, interval);
    }
}
