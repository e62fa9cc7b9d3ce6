//! How often a scheduled crawl runs.
//!
//! All times are UTC.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest accepted interval.
pub const MAX_INTERVAL_DAYS: i64 = 366;

/// Recurrence rule of a scheduled crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CadenceSpec", into = "CadenceSpec")]
pub enum Cadence {
    /// Fixed period measured from the last run
    Interval(Duration),
    /// Every day at this time
    Daily(NaiveTime),
    /// At this time on each listed weekday
    Weekly { at: NaiveTime, days: Vec<Weekday> },
}

/// Text form of a [`Cadence`], used at the storage and API boundary:
/// `{"type": "weekly", "time": "08:30", "days": ["mon", "thu"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadenceSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<String>,
}

impl Cadence {
    /// Parse from the stored `(type, time, days)` triple.
    pub fn parse(kind: &str, time: &str, days: &[String]) -> Result<Self, ValidationError> {
        match kind {
            "interval" => parse_interval(time).map(Cadence::Interval),
            "daily" => parse_time_of_day(time).map(Cadence::Daily),
            "weekly" => {
                let at = parse_time_of_day(time)?;
                let mut parsed = days
                    .iter()
                    .map(|day| {
                        day.trim().parse::<Weekday>().map_err(|_| {
                            ValidationError::InvalidCadence(format!("unknown weekday: {}", day))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                parsed.sort_by_key(|d| d.num_days_from_monday());
                parsed.dedup();
                if parsed.is_empty() {
                    return Err(ValidationError::InvalidCadence(
                        "weekly cadence needs at least one day".to_string(),
                    ));
                }
                Ok(Cadence::Weekly { at, days: parsed })
            }
            other => Err(ValidationError::InvalidCadence(format!(
                "unknown cadence type: {}",
                other
            ))),
        }
    }

    /// Reject cadences that would never advance.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Cadence::Interval(every) if *every <= Duration::zero() => Err(ValidationError::InvalidCadence(
                format!("interval must be positive: {}", every),
            )),
            Cadence::Interval(every) if *every > max_interval() => Err(ValidationError::InvalidCadence(
                format!("interval longer than {} days: {}", MAX_INTERVAL_DAYS, every),
            )),
            Cadence::Weekly { days, .. } if days.is_empty() => Err(ValidationError::InvalidCadence(
                "weekly cadence needs at least one day".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Cadence::Interval(_) => "interval",
            Cadence::Daily(_) => "daily",
            Cadence::Weekly { .. } => "weekly",
        }
    }

    /// `"6h"` for intervals, `"HH:MM"` otherwise.
    pub fn time_text(&self) -> String {
        match self {
            Cadence::Interval(every) => format_interval(*every),
            Cadence::Daily(at) | Cadence::Weekly { at, .. } => at.format("%H:%M").to_string(),
        }
    }

    pub fn day_names(&self) -> Vec<String> {
        match self {
            Cadence::Weekly { days, .. } => days.iter().map(|d| d.to_string().to_lowercase()).collect(),
            _ => Vec::new(),
        }
    }

    /// The first run time strictly after `now`. Saturates at the end of the
    /// representable range instead of overflowing.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let later = |step: Duration| now.checked_add_signed(step).unwrap_or(DateTime::<Utc>::MAX_UTC);

        match self {
            Cadence::Interval(every) => later(*every),
            Cadence::Daily(at) => {
                let today = Utc.from_utc_datetime(&now.date_naive().and_time(*at));
                if today > now {
                    today
                } else {
                    today
                        .checked_add_signed(Duration::days(1))
                        .unwrap_or(DateTime::<Utc>::MAX_UTC)
                }
            }
            Cadence::Weekly { at, days } => {
                let date = now.date_naive();
                (0..=7)
                    .filter_map(|offset| date.checked_add_signed(Duration::days(offset)))
                    .filter(|day| days.contains(&day.weekday()))
                    .map(|day| Utc.from_utc_datetime(&day.and_time(*at)))
                    .find(|candidate| *candidate > now)
                    .unwrap_or_else(|| later(Duration::weeks(1)))
            }
        }
    }
}

impl TryFrom<CadenceSpec> for Cadence {
    type Error = ValidationError;

    fn try_from(spec: CadenceSpec) -> Result<Self, Self::Error> {
        Cadence::parse(&spec.kind, &spec.time, &spec.days)
    }
}

impl From<Cadence> for CadenceSpec {
    fn from(cadence: Cadence) -> Self {
        CadenceSpec {
            kind: cadence.kind().to_string(),
            time: cadence.time_text(),
            days: cadence.day_names(),
        }
    }
}

fn max_interval() -> Duration {
    Duration::days(MAX_INTERVAL_DAYS)
}

/// Parse `"30m"`, `"6h"`, `"1d"`, `"90s"` or compound forms like `"1h30m"`.
/// Totals above [`MAX_INTERVAL_DAYS`] are rejected.
pub fn parse_interval(raw: &str) -> Result<Duration, ValidationError> {
    let invalid = || ValidationError::InvalidCadence(format!("invalid interval: {:?}", raw));
    let too_long = || {
        ValidationError::InvalidCadence(format!("interval longer than {} days: {:?}", MAX_INTERVAL_DAYS, raw))
    };

    let mut total = Duration::zero();
    let mut digits = String::new();

    for c in raw.trim().chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let value: i64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        let part = match c {
            's' => Duration::try_seconds(value),
            'm' => Duration::try_minutes(value),
            'h' => Duration::try_hours(value),
            'd' => Duration::try_days(value),
            'w' => Duration::try_weeks(value),
            _ => return Err(invalid()),
        }
        .ok_or_else(too_long)?;
        total = total.checked_add(&part).ok_or_else(too_long)?;
        if total > max_interval() {
            return Err(too_long());
        }
    }

    if !digits.is_empty() || total <= Duration::zero() {
        return Err(invalid());
    }
    Ok(total)
}

/// Render an interval in its largest exact unit.
pub fn format_interval(every: Duration) -> String {
    let secs = every.num_seconds();
    if secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime, ValidationError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ValidationError::InvalidCadence(format!("invalid time of day: {:?}", raw)))
}
