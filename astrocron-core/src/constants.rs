//! Shared defaults.

use std::time::Duration;

/// Recurrence used when switching an event to the daily period.
pub const DEFAULT_DAILY_CRON: &str = "0 0 ? * 0-6";

/// Recurrence used when switching to monthly without a one-shot date to start from.
pub const DEFAULT_MONTHLY_CRON: &str = "0 0 1-31 1-12 *";

/// Upper bound for a single event store request.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Offsets (minutes) offered for astronomical triggers.
pub const ASTRO_OFFSET_CHOICES: [i64; 25] = [
    0, 5, 10, 15, 20, 30, 45, 60, 90, 120, 150, 180, 240, -5, -10, -15, -20, -30, -45, -60, -90,
    -120, -150, -180, -240,
];

/// Largest UTC offset a server clock may have, in minutes.
pub const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;
