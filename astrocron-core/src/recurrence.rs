//! Cron-style recurrence strings.
//!
//! An event repeats either daily on a set of weekdays or monthly on a set of
//! days and months. The persisted form is a five field expression
//! (`minute hour day-of-month month day-of-week`):
//!
//! - daily:   `0 8 ? * 1-5`
//! - monthly: `30 6 1,15 3-10 *`
//!
//! [`Recurrence`] is rebuilt from the string on every read and written back
//! on every edit; nothing else is cached on the event.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hours and minutes on the server's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClockTime {
    hours: u8,
    minutes: u8,
}

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime {
        hours: 0,
        minutes: 0,
    };

    pub fn new(hours: u8, minutes: u8) -> Option<Self> {
        (hours < 24 && minutes < 60).then_some(ClockTime { hours, minutes })
    }

    pub fn hours(&self) -> u8 {
        self.hours
    }

    pub fn minutes(&self) -> u8 {
        self.minutes
    }

    /// Seconds and below are dropped.
    pub fn from_naive(time: NaiveTime) -> Self {
        ClockTime {
            hours: time.hour() as u8,
            minutes: time.minute() as u8,
        }
    }

    pub fn to_naive(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hours.into(), self.minutes.into(), 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hours, self.minutes)
    }
}

impl FromStr for ClockTime {
    type Err = String;

    /// Parse `HH:MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let time = NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map_err(|_| format!("Invalid time '{}'. Expected HH:MM", s))?;
        Ok(ClockTime::from_naive(time))
    }
}

/// A non-empty set of values from the inclusive range `MIN..=MAX`.
///
/// There is no public way to empty a set: an empty selection has no cron
/// representation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldSet<const MIN: u8, const MAX: u8> {
    bits: u32,
}

/// Days of the week, 0 = Sunday.
pub type Weekdays = FieldSet<0, 6>;
/// Days of the month.
pub type MonthDays = FieldSet<1, 31>;
/// Months of the year, 1 = January.
pub type Months = FieldSet<1, 12>;

impl<const MIN: u8, const MAX: u8> FieldSet<MIN, MAX> {
    pub fn in_range(value: u8) -> bool {
        (MIN..=MAX).contains(&value)
    }

    pub fn all() -> Self {
        FieldSet {
            bits: (MIN..=MAX).fold(0, |bits, v| bits | (1 << v)),
        }
    }

    pub fn single(value: u8) -> Option<Self> {
        Self::in_range(value).then(|| FieldSet { bits: 1 << value })
    }

    /// `None` if any value is out of range or there are no values.
    pub fn from_values(values: impl IntoIterator<Item = u8>) -> Option<Self> {
        let mut bits = 0u32;
        for value in values {
            if !Self::in_range(value) {
                return None;
            }
            bits |= 1 << value;
        }
        (bits != 0).then_some(FieldSet { bits })
    }

    pub fn contains(&self, value: u8) -> bool {
        Self::in_range(value) && self.bits & (1 << value) != 0
    }

    /// Returns false when `value` is out of range.
    pub fn insert(&mut self, value: u8) -> bool {
        if !Self::in_range(value) {
            return false;
        }
        self.bits |= 1 << value;
        true
    }

    /// Flip `value`. Removing the last member leaves `fallback` instead.
    pub fn toggle_or(&mut self, value: u8, fallback: Self) {
        if !Self::in_range(value) {
            return;
        }
        if !self.contains(value) {
            self.bits |= 1 << value;
            return;
        }
        let remaining = self.bits & !(1 << value);
        self.bits = if remaining == 0 { fallback.bits } else { remaining };
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (MIN..=MAX).filter(move |v| self.contains(*v))
    }
}

impl Months {
    /// Highest day that exists in at least one selected month.
    pub fn max_day(&self) -> u8 {
        const LONG: [u8; 7] = [1, 3, 5, 7, 8, 10, 12];
        const SHORT: [u8; 4] = [4, 6, 9, 11];

        if self.iter().any(|m| LONG.contains(&m)) {
            31
        } else if self.iter().any(|m| SHORT.contains(&m)) {
            30
        } else {
            29
        }
    }
}

impl<const MIN: u8, const MAX: u8> fmt::Debug for FieldSet<MIN, MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Ascending list with runs of three or more written as `a-b`.
impl<const MIN: u8, const MAX: u8> fmt::Display for FieldSet<MIN, MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<u8> = self.iter().collect();
        let mut parts = Vec::new();
        let mut i = 0;

        while i < values.len() {
            let start = values[i];
            while i + 1 < values.len() && values[i + 1] == values[i] + 1 {
                i += 1;
            }
            let end = values[i];

            if end - start >= 2 {
                parts.push(format!("{}-{}", start, end));
            } else {
                parts.extend((start..=end).map(|v| v.to_string()));
            }
            i += 1;
        }

        f.write_str(&parts.join(","))
    }
}

/// How often an event repeats. One-shot events have no recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Once,
    Daily,
    Monthly,
}

impl Period {
    pub fn of(recurrence: Option<&Recurrence>) -> Self {
        match recurrence {
            None => Period::Once,
            Some(Recurrence::Daily { .. }) => Period::Daily,
            Some(Recurrence::Monthly { .. }) => Period::Monthly,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Once => write!(f, "once"),
            Period::Daily => write!(f, "daily"),
            Period::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "once" => Ok(Period::Once),
            "daily" => Ok(Period::Daily),
            "monthly" => Ok(Period::Monthly),
            _ => Err(format!("Unknown period '{}'. Expected once, daily or monthly", s)),
        }
    }
}

/// Structured form of a recurrence string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recurrence {
    Daily {
        time: ClockTime,
        weekdays: Weekdays,
    },
    Monthly {
        time: ClockTime,
        days: MonthDays,
        months: Months,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid {field} field '{value}'")]
    InvalidField { field: &'static str, value: String },
}

impl Recurrence {
    /// Every day of the week at `time`.
    pub fn daily(time: ClockTime) -> Self {
        Recurrence::Daily {
            time,
            weekdays: Weekdays::all(),
        }
    }

    /// Every day of every month at `time`.
    pub fn monthly(time: ClockTime) -> Self {
        Recurrence::Monthly {
            time,
            days: MonthDays::all(),
            months: Months::all(),
        }
    }

    /// Once a year on `day` of `month`, as a monthly schedule.
    pub fn monthly_on(time: ClockTime, day: u8, month: u8) -> Option<Self> {
        Some(Recurrence::Monthly {
            time,
            days: MonthDays::single(day)?,
            months: Months::single(month)?,
        })
    }

    /// Parse a recurrence string; `None` when it is malformed.
    pub fn parse(cron: &str) -> Option<Self> {
        match cron.parse() {
            Ok(recurrence) => Some(recurrence),
            Err(e) => {
                tracing::debug!(cron, error = %e, "Ignoring unreadable recurrence");
                None
            }
        }
    }

    pub fn time(&self) -> ClockTime {
        match self {
            Recurrence::Daily { time, .. } | Recurrence::Monthly { time, .. } => *time,
        }
    }

    pub fn set_time(&mut self, new_time: ClockTime) {
        match self {
            Recurrence::Daily { time, .. } | Recurrence::Monthly { time, .. } => *time = new_time,
        }
    }

    pub fn period(&self) -> Period {
        Period::of(Some(self))
    }

    /// The last selected weekday cannot be deselected.
    pub fn toggle_weekday(&mut self, day: u8) {
        if let Recurrence::Daily { weekdays, .. } = self {
            let current = *weekdays;
            weekdays.toggle_or(day, current);
        }
    }

    /// Deselecting the last month selects January.
    pub fn toggle_month(&mut self, month: u8) {
        if let Recurrence::Monthly { months, .. } = self {
            months.toggle_or(month, Months::lowest_only());
        }
    }

    /// Deselecting the last day selects the 1st.
    pub fn toggle_month_day(&mut self, day: u8) {
        if let Recurrence::Monthly { days, .. } = self {
            days.toggle_or(day, MonthDays::lowest_only());
        }
    }

    /// Select every day up to [`Months::max_day`], or only the 1st when
    /// that is already the selection.
    pub fn toggle_all_month_days(&mut self) {
        if let Recurrence::Monthly { days, months, .. } = self {
            let max = months.max_day();
            *days = if days.len() == usize::from(max) {
                MonthDays::lowest_only()
            } else {
                MonthDays::from_values(1..=max).unwrap_or_else(MonthDays::all)
            };
        }
    }

    pub fn max_month_day(&self) -> Option<u8> {
        match self {
            Recurrence::Monthly { months, .. } => Some(months.max_day()),
            Recurrence::Daily { .. } => None,
        }
    }
}

impl<const MIN: u8, const MAX: u8> FieldSet<MIN, MAX> {
    /// The singleton `{MIN}` used in place of an emptied selection.
    fn lowest_only() -> Self {
        FieldSet { bits: 1 << MIN }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Daily { time, weekdays } => {
                write!(f, "{} {} ? * {}", time.minutes, time.hours, weekdays)
            }
            Recurrence::Monthly { time, days, months } => {
                write!(f, "{} {} {} {} *", time.minutes, time.hours, days, months)
            }
        }
    }
}

/// One parsed cron field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    /// `*`
    Any,
    /// `?`
    Unspecified,
    Values(u32),
}

impl Field {
    fn parse(token: &str, name: &'static str, min: u8, max: u8) -> Result<Self, CronError> {
        let invalid = || CronError::InvalidField {
            field: name,
            value: token.to_string(),
        };

        match token {
            "?" => return Ok(Field::Unspecified),
            "*" => return Ok(Field::Any),
            _ => {}
        }

        let mut bits = 0u32;
        for item in token.split(',') {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => {
                    let step: u8 = step.parse().map_err(|_| invalid())?;
                    if step == 0 {
                        return Err(invalid());
                    }
                    (range, Some(step))
                }
                None => (item, None),
            };

            let (start, end) = match range {
                "*" => (min, max),
                _ => match range.split_once('-') {
                    Some((a, b)) => (
                        a.parse::<u8>().map_err(|_| invalid())?,
                        b.parse::<u8>().map_err(|_| invalid())?,
                    ),
                    None => {
                        let v = range.parse::<u8>().map_err(|_| invalid())?;
                        // `a/n` means every n-th value starting at a
                        (v, if step.is_some() { max } else { v })
                    }
                },
            };

            if start < min || end > max || start > end {
                return Err(invalid());
            }

            for v in (start..=end).step_by(step.unwrap_or(1).into()) {
                bits |= 1 << v;
            }
        }

        Ok(Field::Values(bits))
    }

    /// Smallest member; wildcards yield `min`.
    fn lowest(self, min: u8) -> u8 {
        match self {
            Field::Values(bits) => bits.trailing_zeros() as u8,
            Field::Any | Field::Unspecified => min,
        }
    }

    fn into_set<const MIN: u8, const MAX: u8>(self) -> FieldSet<MIN, MAX> {
        match self {
            Field::Values(bits) => FieldSet { bits },
            Field::Any | Field::Unspecified => FieldSet::all(),
        }
    }
}

impl FromStr for Recurrence {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        let [minute, hour, day, month, weekday] = fields[..] else {
            return Err(CronError::FieldCount(fields.len()));
        };

        let minute = Field::parse(minute, "minute", 0, 59)?;
        let hour = Field::parse(hour, "hour", 0, 23)?;
        let day = Field::parse(day, "day-of-month", 1, 31)?;
        let month = Field::parse(month, "month", 1, 12)?;
        // 7 is an alias for Sunday
        let weekday = match Field::parse(weekday, "day-of-week", 0, 7)? {
            Field::Values(bits) if bits & (1 << 7) != 0 => Field::Values((bits & !(1 << 7)) | 1),
            other => other,
        };

        let time = ClockTime {
            hours: hour.lowest(0),
            minutes: minute.lowest(0),
        };

        let daily = match (day, month) {
            (Field::Unspecified, _) => true,
            (Field::Any, Field::Any | Field::Unspecified) => true,
            _ => false,
        };

        Ok(if daily {
            Recurrence::Daily {
                time,
                weekdays: weekday.into_set(),
            }
        } else {
            Recurrence::Monthly {
                time,
                days: day.into_set(),
                months: month.into_set(),
            }
        })
    }
}
