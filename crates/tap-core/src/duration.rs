//! ISO-8601 durations as used on the wire for `release_after`.
//!
//! Only fixed-length units are accepted: weeks, days, hours, minutes and
//! seconds. Years and months have no fixed length and are rejected.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

use crate::error::{ActionError, Result};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

/// Parse `P30D`, `PT1H30M`, `P1W`, `P1DT12H`, ... into a `Duration`.
pub fn parse(s: &str) -> Result<Duration> {
    let invalid = || ActionError::InvalidDuration(s.to_string());

    let rest = s.trim().strip_prefix('P').ok_or_else(invalid)?;
    let (date, time) = match rest.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return Err(invalid());
            }
            (date, Some(time))
        }
        None => (rest, None),
    };
    if date.is_empty() && time.is_none() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    let mut add = |n: u64, unit: u64| -> Result<()> {
        let secs = n.checked_mul(unit).ok_or_else(invalid)?;
        total = total.checked_add(secs).ok_or_else(invalid)?;
        Ok(())
    };

    for (n, designator) in components(date).ok_or_else(invalid)? {
        match designator {
            'W' => add(n, WEEK)?,
            'D' => add(n, DAY)?,
            _ => return Err(invalid()),
        }
    }
    if let Some(time) = time {
        for (n, designator) in components(time).ok_or_else(invalid)? {
            match designator {
                'H' => add(n, HOUR)?,
                'M' => add(n, MINUTE)?,
                'S' => add(n, 1)?,
                _ => return Err(invalid()),
            }
        }
    }
    Ok(Duration::from_secs(total))
}

/// Split `30D12H` into `[(30, 'D'), (12, 'H')]`. `None` on malformed input.
fn components(s: &str) -> Option<Vec<(u64, char)>> {
    let mut out = Vec::new();
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            if digits.is_empty() {
                return None;
            }
            out.push((digits.parse().ok()?, c));
            digits.clear();
        }
    }
    if !digits.is_empty() {
        return None;
    }
    Some(out)
}

/// Format a duration in canonical form: whole days, then a time part.
/// Sub-second precision is dropped.
pub fn format(d: Duration) -> String {
    let mut secs = d.as_secs();
    if secs == 0 {
        return "PT0S".to_string();
    }
    let days = secs / DAY;
    secs %= DAY;
    let hours = secs / HOUR;
    secs %= HOUR;
    let minutes = secs / MINUTE;
    secs %= MINUTE;

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours > 0 || minutes > 0 || secs > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if secs > 0 {
            out.push_str(&format!("{secs}S"));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

pub fn serialize_iso<S>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&format(*d))
}

pub fn deserialize_iso<'de, D>(d: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

pub fn serialize_iso_opt<S>(d: &Option<Duration>, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match d {
        Some(dur) => s.serialize_some(&format(*dur)),
        None => s.serialize_none(),
    }
}

pub fn deserialize_iso_opt<'de, D>(d: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(d)?;
    raw.map(|r| parse(&r).map_err(serde::de::Error::custom))
        .transpose()
}
