use std::str::FromStr;
use chrono::{DateTime, FixedOffset, MappedLocalTime, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Serialize, Serializer};

pub const IST_OFFSET: &str = "+05:30";

/// Fixed UTC offset the studio renders its timestamps in.
///
/// Everything behind the API works with `DateTime<Utc>` instants; this type
/// is only used when a value crosses the presentation boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayOffset(pub FixedOffset);

impl DisplayOffset {
    pub fn ist() -> Self {
        Self(FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("IST offset is in range"))
    }
    pub fn parse(offset_str: &str) -> Result<Self, anyhow::Error> {
        let offset = FixedOffset::from_str(offset_str.trim())
            .map_err(|e| anyhow::anyhow!("Invalid display offset '{offset_str}': {e}"))?;
        Ok(Self(offset))
    }
    pub fn render(&self, instant: DateTime<Utc>) -> StudioTime {
        StudioTime(instant.with_timezone(&self.0))
    }
    /// Interprets a wall-clock time as studio local time.
    pub fn from_local(&self, local_dt: NaiveDateTime) -> Option<DateTime<Utc>> {
        match local_dt.and_local_timezone(self.0) {
            MappedLocalTime::Single(dt) => Some(dt.with_timezone(&Utc)),
            MappedLocalTime::Ambiguous(_, _) => None,
            MappedLocalTime::None => None,
        }
    }
}

impl Default for DisplayOffset {
    fn default() -> Self {
        Self::ist()
    }
}

/// Current instant without the sub-millisecond part, so that stored
/// timestamps have a stable textual form.
pub fn now_millis() -> DateTime<Utc> {
    trimmed_to_millis(Utc::now())
}

pub fn trimmed_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    let millis = instant.timestamp_subsec_millis();
    let nanos = instant.timestamp_subsec_nanos() - millis * 1_000_000;
    instant.checked_sub_signed(TimeDelta::nanoseconds(nanos as i64)).unwrap_or(instant)
}

pub fn trimmed_to_sec(instant: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = instant.timestamp_subsec_nanos();
    instant.checked_sub_signed(TimeDelta::nanoseconds(nanos as i64)).unwrap_or(instant)
}

/// An instant as shown to clients, e.g. `2025-03-05T06:30:00+05:30`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudioTime(pub DateTime<FixedOffset>);

impl StudioTime {
    pub fn to_iso_string(self) -> String {
        if self.0.timestamp_subsec_millis() == 0 {
            self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
        } else {
            self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
        }
    }
    pub fn to_display_string(self) -> String {
        self.0.format("%F %H:%M").to_string()
    }
}

impl Serialize for StudioTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso_string())
    }
}
