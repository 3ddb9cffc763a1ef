//! Conversion between the user's local time and the scheduler host's clock.
//!
//! Recurrence strings hold hours and minutes on the *server's* clock, while
//! one-shot starts are absolute instants. The browser-side editor shows both
//! in the user's own time zone, so every read and write goes through here.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

use crate::constants::MAX_UTC_OFFSET_MINUTES;
use crate::error::{AstroCronError, AstroCronResult};
use crate::recurrence::ClockTime;

/// The scheduler host's fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerClock {
    offset: FixedOffset,
}

/// Which representation a local time is converted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Absolute instant, as stored in `start`.
    Date,
    /// Hours and minutes only, as written into a recurrence string.
    Cron,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerValue {
    Date(DateTime<FixedOffset>),
    Cron(ClockTime),
}

impl ServerClock {
    pub fn utc() -> Self {
        ServerClock {
            offset: Utc.fix(),
        }
    }

    /// Minutes east of UTC. Anything beyond +-18h is rejected.
    pub fn from_offset_minutes(minutes: i32) -> AstroCronResult<Self> {
        if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(AstroCronError::InvalidOffset(minutes));
        }
        let offset =
            FixedOffset::east_opt(minutes * 60).ok_or(AstroCronError::InvalidOffset(minutes))?;
        Ok(ServerClock { offset })
    }

    /// Offset the named IANA zone has at `at`.
    pub fn from_timezone_name(name: &str, at: DateTime<Utc>) -> AstroCronResult<Self> {
        let tz: chrono_tz::Tz = name
            .parse()
            .map_err(|_| AstroCronError::UnknownTimeZone(name.to_string()))?;
        Ok(ServerClock {
            offset: at.with_timezone(&tz).offset().fix(),
        })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    /// Express a user-local time the way the server stores it.
    pub fn client_to_server<Tz: TimeZone>(&self, local: &DateTime<Tz>, mode: Mode) -> ServerValue {
        let on_server = local.with_timezone(&self.offset);
        match mode {
            Mode::Date => ServerValue::Date(on_server),
            Mode::Cron => ServerValue::Cron(ClockTime::from_naive(on_server.time())),
        }
    }

    /// Express a stored value in the time zone of `reference`.
    ///
    /// Cron values are placed on the server-side calendar date of
    /// `reference`. Returns `None` only when that wall time does not exist
    /// in the server's offset, which a fixed offset never produces.
    pub fn server_to_client<Tz: TimeZone>(
        &self,
        value: &ServerValue,
        reference: &DateTime<Tz>,
    ) -> Option<DateTime<Tz>> {
        let zone = reference.timezone();
        match value {
            ServerValue::Date(at) => Some(at.with_timezone(&zone)),
            ServerValue::Cron(time) => {
                let server_date = reference.with_timezone(&self.offset).date_naive();
                let wall = NaiveDateTime::new(server_date, time.to_naive());
                let at = self.offset.from_local_datetime(&wall).single()?;
                Some(at.with_timezone(&zone))
            }
        }
    }

    /// Shorthand for reading the clock time of a recurrence as a local time.
    pub fn cron_to_client<Tz: TimeZone>(
        &self,
        time: ClockTime,
        reference: &DateTime<Tz>,
    ) -> Option<DateTime<Tz>> {
        self.server_to_client(&ServerValue::Cron(time), reference)
    }

    /// Shorthand for the recurrence clock time of a local time.
    pub fn client_to_cron<Tz: TimeZone>(&self, local: &DateTime<Tz>) -> ClockTime {
        ClockTime::from_naive(local.with_timezone(&self.offset).time())
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        ServerClock::utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn local_zone(minutes: i32) -> FixedOffset {
        FixedOffset::east_opt(minutes * 60).unwrap()
    }

    fn at(zone: FixedOffset, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        zone.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_cron_uses_server_wall_clock() {
        // Server at UTC, user at UTC+2: 08:00 local is 06:00 on the server
        let server = ServerClock::utc();
        let local = at(local_zone(120), 2024, 6, 1, 8, 0);

        assert_eq!(
            server.client_to_server(&local, Mode::Cron),
            ServerValue::Cron(ClockTime::new(6, 0).unwrap())
        );
    }

    #[test]
    fn test_date_keeps_instant() {
        let server = ServerClock::from_offset_minutes(-300).unwrap();
        let local = at(local_zone(60), 2024, 1, 15, 0, 30);

        let ServerValue::Date(on_server) = server.client_to_server(&local, Mode::Date) else {
            panic!("expected date");
        };
        assert_eq!(on_server, local);
        assert_eq!(on_server.offset().local_minus_utc(), -300 * 60);
        assert_eq!(on_server.hour(), 18);
        assert_eq!(on_server.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());
    }

    #[test]
    fn test_cron_roundtrip_to_the_minute() {
        let offsets = [-720, -570, -300, 0, 60, 330, 545, 840];
        for server_minutes in offsets {
            let server = ServerClock::from_offset_minutes(server_minutes).unwrap();
            for local_minutes in offsets {
                let local = at(local_zone(local_minutes), 2024, 3, 10, 23, 47);
                let ServerValue::Cron(time) = server.client_to_server(&local, Mode::Cron) else {
                    panic!("expected cron");
                };
                let back = server.cron_to_client(time, &local).unwrap();
                assert_eq!(
                    (back.hour(), back.minute()),
                    (23, 47),
                    "server {} local {}",
                    server_minutes,
                    local_minutes
                );
            }
        }
    }

    #[test]
    fn test_date_roundtrip() {
        let server = ServerClock::from_offset_minutes(180).unwrap();
        let local = at(local_zone(-420), 2024, 12, 31, 22, 15);
        let value = server.client_to_server(&local, Mode::Date);
        assert_eq!(server.server_to_client(&value, &local), Some(local));
    }

    #[test]
    fn test_rejects_out_of_range_offset() {
        assert!(matches!(
            ServerClock::from_offset_minutes(18 * 60 + 1),
            Err(AstroCronError::InvalidOffset(1081))
        ));
        assert!(ServerClock::from_offset_minutes(-18 * 60).is_ok());
    }

    #[test]
    fn test_from_timezone_name() {
        let summer = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let winter = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let clock = ServerClock::from_timezone_name("Europe/Berlin", summer).unwrap();
        assert_eq!(clock.offset_minutes(), 120);
        let clock = ServerClock::from_timezone_name("Europe/Berlin", winter).unwrap();
        assert_eq!(clock.offset_minutes(), 60);

        assert!(matches!(
            ServerClock::from_timezone_name("Mars/Olympus", summer),
            Err(AstroCronError::UnknownTimeZone(_))
        ));
    }
}
