use anyhow::Result;
use astrocron_core::astro::{AstroEvent, compute_astro_times};
use astrocron_core::config::Settings;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use owo_colors::OwoColorize;

use crate::commands::local_timezone;
use crate::render::clock;

pub fn run(date: Option<NaiveDate>, latitude: Option<f64>, longitude: Option<f64>) -> Result<()> {
    let settings = Settings::load()?;
    let tz = local_timezone();

    let date = date.unwrap_or_else(|| Utc::now().with_timezone(&tz).date_naive());
    let latitude = latitude.unwrap_or(settings.latitude);
    let longitude = longitude.unwrap_or(settings.longitude);

    println!(
        "{}",
        format!("Sun events on {} at {:.4}, {:.4} ({})", date, latitude, longitude, tz).bold()
    );

    for line in table(date, latitude, longitude, &tz) {
        println!("  {}", line);
    }

    Ok(())
}

/// One `HH:MM  event` line per event, in chronological order of a normal day.
fn table(date: NaiveDate, latitude: f64, longitude: f64, tz: &Tz) -> Vec<String> {
    let times = compute_astro_times(date, latitude, longitude);

    const ORDER: [AstroEvent; 14] = [
        AstroEvent::Nadir,
        AstroEvent::NightEnd,
        AstroEvent::NauticalDawn,
        AstroEvent::Dawn,
        AstroEvent::Sunrise,
        AstroEvent::SunriseEnd,
        AstroEvent::GoldenHourEnd,
        AstroEvent::SolarNoon,
        AstroEvent::GoldenHour,
        AstroEvent::SunsetStart,
        AstroEvent::Sunset,
        AstroEvent::Dusk,
        AstroEvent::NauticalDusk,
        AstroEvent::Night,
    ];

    ORDER
        .iter()
        .map(|event| {
            let time = clock(times.get(*event).map(|t| t.with_timezone(tz)));
            format!("{}  {}", time, event)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polar_day_shows_placeholders() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let lines = table(date, 69.65, 18.96, &Tz::UTC);

        assert_eq!(lines.len(), 14);
        assert!(lines.iter().any(|l| l == "??:??  sunrise"));
        assert!(lines.iter().any(|l| l.ends_with("solarNoon") && !l.starts_with("??")));
    }

    #[test]
    fn times_use_local_zone() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let utc = table(date, 52.52, 13.405, &Tz::UTC);
        let berlin = table(date, 52.52, 13.405, &chrono_tz::Europe::Berlin);

        let noon = |lines: &[String]| {
            lines
                .iter()
                .find(|l| l.ends_with("solarNoon"))
                .map(|l| l[..2].to_string())
                .unwrap()
        };
        assert_eq!(noon(&utc), "11");
        assert_eq!(noon(&berlin), "13");
    }
}
