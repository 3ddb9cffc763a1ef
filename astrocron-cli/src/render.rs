//! TUI rendering traits for astrocron types.
//!
//! Extension traits that add colored terminal rendering to astrocron-core
//! types using owo_colors.

use astrocron_core::directory::ValueDomain;
use astrocron_core::recurrence::{Period, Recurrence};
use astrocron_core::{ActionType, Event};
use chrono::{DateTime, TimeZone};
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Shown in place of a time that doesn't exist, e.g. sunrise in polar night.
pub const MISSING_TIME: &str = "??:??";

pub fn weekday_name(day: u8) -> &'static str {
    WEEKDAYS.get(usize::from(day)).copied().unwrap_or("?")
}

pub fn month_name(month: u8) -> &'static str {
    MONTHS
        .get(usize::from(month).wrapping_sub(1))
        .copied()
        .unwrap_or("?")
}

/// `HH:MM`, or the placeholder when there is no time.
pub fn clock<Tz: TimeZone>(time: Option<DateTime<Tz>>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| MISSING_TIME.to_string())
}

impl Render for Period {
    fn render(&self) -> String {
        match self {
            Period::Once => "once".cyan().to_string(),
            Period::Daily => "daily".green().to_string(),
            Period::Monthly => "monthly".magenta().to_string(),
        }
    }
}

impl Render for ActionType {
    fn render(&self) -> String {
        match self {
            ActionType::Single => "single".to_string(),
            ActionType::Double => "double".yellow().to_string(),
            ActionType::Toggle => "toggle".blue().to_string(),
        }
    }
}

impl Render for ValueDomain {
    fn render(&self) -> String {
        match self {
            ValueDomain::Boolean => "on/off".to_string(),
            ValueDomain::Enumerated(states) => states
                .iter()
                .map(|(code, label)| format!("{}={}", code, label))
                .collect::<Vec<_>>()
                .join(", "),
            ValueDomain::FreeForm => "any value".dimmed().to_string(),
        }
    }
}

impl Render for Event {
    fn render(&self) -> String {
        let marker = if self.common.enabled {
            "●".green().to_string()
        } else {
            "○".dimmed().to_string()
        };
        let name = self.common.name.text("en");
        let name = if name.is_empty() { "(unnamed)" } else { name };

        let trigger = match (self.native.astro, self.native.offset) {
            (Some(astro), Some(offset)) if offset != 0 => format!("{} {:+}m", astro, offset),
            (Some(astro), _) => astro.to_string(),
            (None, _) => match self.recurrence() {
                Some(r) => r.time().to_string(),
                None => self
                    .native
                    .start
                    .map(|s| s.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| MISSING_TIME.to_string()),
            },
        };

        format!(
            "{} {} {} {} {}",
            marker,
            name.bold(),
            self.period().render(),
            trigger,
            self.id.dimmed()
        )
    }
}

/// Which days a recurrence fires on, weekdays listed in `order`.
pub fn describe_days(recurrence: &Recurrence, order: &[u8; 7]) -> String {
    match recurrence {
        Recurrence::Daily { weekdays, .. } => {
            if weekdays.len() == 7 {
                return "every day".to_string();
            }
            order
                .iter()
                .filter(|d| weekdays.contains(**d))
                .map(|d| weekday_name(*d))
                .collect::<Vec<_>>()
                .join(", ")
        }
        Recurrence::Monthly { days, months, .. } => {
            let months = if months.len() == 12 {
                "every month".to_string()
            } else {
                months.iter().map(month_name).collect::<Vec<_>>().join(", ")
            };
            let days = if days.len() == 31 {
                "every day".to_string()
            } else {
                format!("day {}", days)
            };
            format!("{} of {}", days, months)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn names() {
        assert_eq!(weekday_name(0), "Sun");
        assert_eq!(weekday_name(9), "?");
        assert_eq!(month_name(1), "Jan");
        assert_eq!(month_name(0), "?");
        assert_eq!(month_name(13), "?");
    }

    #[test]
    fn missing_time_placeholder() {
        assert_eq!(clock::<Utc>(None), "??:??");
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 7, 5, 0).unwrap();
        assert_eq!(clock(Some(at)), "07:05");
    }

    #[test]
    fn describe_workdays_monday_first() {
        let r = Recurrence::parse("0 8 ? * 0,1-5").unwrap();
        assert_eq!(
            describe_days(&r, &[1, 2, 3, 4, 5, 6, 0]),
            "Mon, Tue, Wed, Thu, Fri, Sun"
        );
        let r = Recurrence::parse("0 8 ? * *").unwrap();
        assert_eq!(describe_days(&r, &[0, 1, 2, 3, 4, 5, 6]), "every day");
    }

    #[test]
    fn describe_monthly() {
        let r = Recurrence::parse("0 8 1,15 3-5 *").unwrap();
        assert_eq!(describe_days(&r, &[0; 7]), "day 1,15 of Mar, Apr, May");
        let r = Recurrence::parse("0 0 1-31 1-12 *").unwrap();
        assert_eq!(describe_days(&r, &[0; 7]), "every day of every month");
    }

    #[test]
    fn event_line_mentions_trigger() {
        let mut event = Event::new("e1", "Porch");
        event.native.astro = Some(astrocron_core::astro::AstroEvent::Sunset);
        event.native.offset = Some(-15);
        let line = event.render();
        assert!(line.contains("Porch"));
        assert!(line.contains("sunset -15m"));
    }
}
