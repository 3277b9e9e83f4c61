use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::ValidationError;

/// Calendar trading date with no time-of-day or zone, written `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradeDate(Date);

impl TradeDate {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        Date::parse(input.trim(), format_description!("[year]-[month]-[day]"))
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate {
                value: input.to_owned(),
            })
    }

    /// UTC calendar date of a Unix epoch timestamp in milliseconds.
    pub fn from_unix_millis(millis: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .map(|instant| Self(instant.date()))
            .map_err(|_| ValidationError::TimestampOutOfRange { millis })
    }

    pub const fn from_date(date: Date) -> Self {
        Self(date)
    }

    pub const fn into_inner(self) -> Date {
        self.0
    }

    pub fn format_iso(self) -> String {
        self.to_string()
    }
}

/// Parse an inclusive `[start, end]` pair, rejecting malformed or inverted input.
pub fn parse_range(start: &str, end: &str) -> Result<(TradeDate, TradeDate), ValidationError> {
    let start = TradeDate::parse(start)?;
    let end = TradeDate::parse(end)?;
    if start > end {
        return Err(ValidationError::InvertedRange {
            start: start.format_iso(),
            end: end.format_iso(),
        });
    }
    Ok((start, end))
}

impl Display for TradeDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl Serialize for TradeDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_iso())
    }
}

impl<'de> Deserialize<'de> for TradeDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}
