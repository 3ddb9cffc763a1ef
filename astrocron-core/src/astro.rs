//! Solar event times for a calendar day and location.
//!
//! Uses the low-precision solar position model (mean anomaly, ecliptic
//! longitude, declination and transit relative to J2000). Good to about a
//! minute, which is all a switching schedule needs.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A named solar event usable as a trigger instead of a clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AstroEvent {
    Sunrise,
    SunriseEnd,
    GoldenHourEnd,
    SolarNoon,
    GoldenHour,
    SunsetStart,
    Sunset,
    Dusk,
    NauticalDusk,
    Night,
    Nadir,
    NightEnd,
    NauticalDawn,
    Dawn,
}

impl AstroEvent {
    /// All events, in the order the editor lists them.
    pub const ALL: [AstroEvent; 14] = [
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
        AstroEvent::Nadir,
        AstroEvent::NightEnd,
        AstroEvent::NauticalDawn,
        AstroEvent::Dawn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AstroEvent::Sunrise => "sunrise",
            AstroEvent::SunriseEnd => "sunriseEnd",
            AstroEvent::GoldenHourEnd => "goldenHourEnd",
            AstroEvent::SolarNoon => "solarNoon",
            AstroEvent::GoldenHour => "goldenHour",
            AstroEvent::SunsetStart => "sunsetStart",
            AstroEvent::Sunset => "sunset",
            AstroEvent::Dusk => "dusk",
            AstroEvent::NauticalDusk => "nauticalDusk",
            AstroEvent::Night => "night",
            AstroEvent::Nadir => "nadir",
            AstroEvent::NightEnd => "nightEnd",
            AstroEvent::NauticalDawn => "nauticalDawn",
            AstroEvent::Dawn => "dawn",
        }
    }
}

impl fmt::Display for AstroEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AstroEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AstroEvent::ALL
            .into_iter()
            .find(|event| event.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown astronomical event '{}'", s))
    }
}

/// Geographic position of the installation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Location {
            latitude,
            longitude,
        }
    }
}

/// Solar event times for one day. Events that do not occur (polar day or
/// night) have no entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AstroTimes {
    times: BTreeMap<AstroEvent, DateTime<Utc>>,
}

impl AstroTimes {
    pub fn get(&self, event: AstroEvent) -> Option<DateTime<Utc>> {
        self.times.get(&event).copied()
    }

    /// Event time shifted by `offset_minutes`. Display only; the offset is
    /// stored on the event, never the shifted time. `None` when the shift
    /// leaves chrono's range.
    pub fn with_offset(&self, event: AstroEvent, offset_minutes: i64) -> Option<DateTime<Utc>> {
        let time = self.get(event)?;
        Duration::try_minutes(offset_minutes).and_then(|d| time.checked_add_signed(d))
    }

    pub fn iter(&self) -> impl Iterator<Item = (AstroEvent, DateTime<Utc>)> + '_ {
        self.times.iter().map(|(event, time)| (*event, *time))
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

const RAD: f64 = PI / 180.0;
const DAY_MS: f64 = 86_400_000.0;
const J1970: f64 = 2_440_588.0;
const J2000: f64 = 2_451_545.0;
const J0: f64 = 0.0009;
const OBLIQUITY: f64 = RAD * 23.4397;

/// Solar altitude (degrees) of each morning/evening event pair.
const ALTITUDE_PAIRS: [(f64, AstroEvent, AstroEvent); 6] = [
    (-0.833, AstroEvent::Sunrise, AstroEvent::Sunset),
    (-0.3, AstroEvent::SunriseEnd, AstroEvent::SunsetStart),
    (-6.0, AstroEvent::Dawn, AstroEvent::Dusk),
    (-12.0, AstroEvent::NauticalDawn, AstroEvent::NauticalDusk),
    (-18.0, AstroEvent::NightEnd, AstroEvent::Night),
    (6.0, AstroEvent::GoldenHourEnd, AstroEvent::GoldenHour),
];

fn to_julian(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / DAY_MS - 0.5 + J1970
}

fn from_julian(julian: f64) -> Option<DateTime<Utc>> {
    if !julian.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(((julian + 0.5 - J1970) * DAY_MS).round() as i64)
}

fn declination(ecliptic_longitude: f64) -> f64 {
    (OBLIQUITY.sin() * ecliptic_longitude.sin()).asin()
}

fn solar_mean_anomaly(days: f64) -> f64 {
    RAD * (357.5291 + 0.985_600_28 * days)
}

fn ecliptic_longitude(mean_anomaly: f64) -> f64 {
    let m = mean_anomaly;
    let center = RAD * (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin());
    let perihelion = RAD * 102.9372;
    m + center + perihelion + PI
}

fn julian_cycle(days: f64, lw: f64) -> f64 {
    (days - J0 - lw / (2.0 * PI)).round()
}

fn approx_transit(hour_angle: f64, lw: f64, cycle: f64) -> f64 {
    J0 + (hour_angle + lw) / (2.0 * PI) + cycle
}

fn solar_transit(ds: f64, mean_anomaly: f64, ecliptic_longitude: f64) -> f64 {
    J2000 + ds + 0.0053 * mean_anomaly.sin() - 0.0069 * (2.0 * ecliptic_longitude).sin()
}

/// NaN when the sun never reaches `altitude` that day.
fn hour_angle(altitude: f64, phi: f64, dec: f64) -> f64 {
    ((altitude.sin() - phi.sin() * dec.sin()) / (phi.cos() * dec.cos())).acos()
}

/// Compute the named solar events of `date` at the given coordinates.
///
/// The solar cycle is anchored on noon UTC of `date`, so every result lies on
/// that calendar day or, for `night`/`nadir` at some longitudes, next to it.
pub fn compute_astro_times(date: NaiveDate, latitude: f64, longitude: f64) -> AstroTimes {
    let anchor = date.and_time(NaiveTime::MIN).and_utc() + Duration::hours(12);

    let lw = -longitude * RAD;
    let phi = latitude * RAD;
    let days = to_julian(anchor) - J2000;

    let cycle = julian_cycle(days, lw);
    let ds = approx_transit(0.0, lw, cycle);
    let m = solar_mean_anomaly(ds);
    let l = ecliptic_longitude(m);
    let dec = declination(l);
    let noon = solar_transit(ds, m, l);

    let mut times = BTreeMap::new();
    let mut put = |event: AstroEvent, julian: f64| {
        if let Some(time) = from_julian(julian) {
            times.insert(event, time);
        }
    };

    put(AstroEvent::SolarNoon, noon);
    put(AstroEvent::Nadir, noon - 0.5);

    for (altitude, rise, set) in ALTITUDE_PAIRS {
        let w = hour_angle(altitude * RAD, phi, dec);
        let set_julian = solar_transit(approx_transit(w, lw, cycle), m, l);
        let rise_julian = noon - (set_julian - noon);
        put(rise, rise_julian);
        put(set, set_julian);
    }

    tracing::debug!(%date, latitude, longitude, events = times.len(), "Computed astro times");

    AstroTimes { times }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const BERLIN: (f64, f64) = (52.52, 13.405);
    const TROMSO: (f64, f64) = (69.65, 18.96);

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_sunrise_before_noon_before_sunset() {
        let times = compute_astro_times(date(2024, 6, 21), BERLIN.0, BERLIN.1);

        let sunrise = times.get(AstroEvent::Sunrise).expect("sunrise");
        let noon = times.get(AstroEvent::SolarNoon).expect("solar noon");
        let sunset = times.get(AstroEvent::Sunset).expect("sunset");

        assert!(sunrise < noon);
        assert!(noon < sunset);
    }

    #[test]
    fn test_offset_out_of_range_has_no_time() {
        let times = compute_astro_times(date(2024, 6, 21), BERLIN.0, BERLIN.1);
        let sunset = times.get(AstroEvent::Sunset).unwrap();

        assert_eq!(
            times.with_offset(AstroEvent::Sunset, 15),
            Some(sunset + Duration::minutes(15))
        );
        assert_eq!(times.with_offset(AstroEvent::Sunset, 100_000_000_000_000), None);
        assert_eq!(times.with_offset(AstroEvent::Sunset, i64::MIN), None);
    }

    #[test]
    fn test_berlin_midsummer_times() {
        let times = compute_astro_times(date(2024, 6, 21), BERLIN.0, BERLIN.1);

        // 04:43 and 21:33 local summer time
        let sunrise = times.get(AstroEvent::Sunrise).unwrap();
        assert_eq!(sunrise.date_naive(), date(2024, 6, 21));
        assert_eq!(sunrise.hour(), 2);
        assert!((35..=50).contains(&sunrise.minute()), "sunrise {}", sunrise);

        let sunset = times.get(AstroEvent::Sunset).unwrap();
        assert_eq!(sunset.hour(), 19);
        assert!((25..=40).contains(&sunset.minute()), "sunset {}", sunset);

        let noon = times.get(AstroEvent::SolarNoon).unwrap();
        assert_eq!(noon.hour(), 11);
    }

    #[test]
    fn test_morning_events_are_ordered() {
        let times = compute_astro_times(date(2024, 3, 20), BERLIN.0, BERLIN.1);
        let order = [
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

        let resolved: Vec<_> = order.iter().map(|e| times.get(*e).unwrap()).collect();
        assert!(resolved.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_nadir_is_half_a_day_before_noon() {
        let times = compute_astro_times(date(2024, 3, 20), BERLIN.0, BERLIN.1);
        let noon = times.get(AstroEvent::SolarNoon).unwrap();
        let nadir = times.get(AstroEvent::Nadir).unwrap();
        let drift = (noon - nadir - Duration::hours(12)).num_milliseconds();
        assert!(drift.abs() <= 1);
    }

    #[test]
    fn test_no_astronomical_night_in_berlin_midsummer() {
        let times = compute_astro_times(date(2024, 6, 21), BERLIN.0, BERLIN.1);
        assert!(times.get(AstroEvent::Night).is_none());
        assert!(times.get(AstroEvent::NightEnd).is_none());
        assert!(times.get(AstroEvent::NauticalDusk).is_some());
    }

    #[test]
    fn test_polar_day_has_no_sunrise() {
        let times = compute_astro_times(date(2024, 6, 21), TROMSO.0, TROMSO.1);
        assert!(times.get(AstroEvent::Sunrise).is_none());
        assert!(times.get(AstroEvent::Sunset).is_none());
        assert!(times.get(AstroEvent::SolarNoon).is_some());
    }

    #[test]
    fn test_polar_night_keeps_twilight() {
        let times = compute_astro_times(date(2024, 12, 21), TROMSO.0, TROMSO.1);
        assert!(times.get(AstroEvent::Sunrise).is_none());
        assert!(times.get(AstroEvent::Dawn).is_some());
        assert!(times.get(AstroEvent::Dusk).is_some());
    }

    #[test]
    fn test_offset_is_applied_in_minutes() {
        let times = compute_astro_times(date(2024, 6, 21), BERLIN.0, BERLIN.1);
        let sunset = times.get(AstroEvent::Sunset).unwrap();

        assert_eq!(
            times.with_offset(AstroEvent::Sunset, -90),
            Some(sunset - Duration::minutes(90))
        );
        assert_eq!(times.with_offset(AstroEvent::Night, 30), None);
    }

    #[test]
    fn test_astro_event_names() {
        for event in AstroEvent::ALL {
            assert_eq!(event.name().parse::<AstroEvent>(), Ok(event));
        }
        assert_eq!(
            serde_json::to_string(&AstroEvent::GoldenHourEnd).unwrap(),
            "\"goldenHourEnd\""
        );
        assert!("moonrise".parse::<AstroEvent>().is_err());
    }
}
