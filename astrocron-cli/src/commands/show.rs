use anyhow::Result;
use astrocron_core::recurrence::Period;
use astrocron_core::server_clock::ServerClock;
use astrocron_core::session::EditSession;
use chrono::DateTime;
use chrono_tz::Tz;
use owo_colors::OwoColorize;

use crate::commands::Context;
use crate::render::{Render, clock, describe_days};

pub async fn run(ctx: &Context, id: &str) -> Result<()> {
    let session = ctx.open(id).await?;
    let lines = details(&session, &ctx.clock, &ctx.now(), &ctx.settings.weekday_order());
    println!("{}", lines.join("\n"));
    Ok(())
}

/// Everything the editor knows about the event, one line each.
pub fn details(
    session: &EditSession,
    server: &ServerClock,
    now: &DateTime<Tz>,
    order: &[u8; 7],
) -> Vec<String> {
    let event = session.working();
    let mut lines = vec![event.render()];

    let field = |label: &str, value: String| format!("  {:<10} {}", label.dimmed(), value);

    match session.astro_preview() {
        Some(preview) => {
            let offset = event.native.offset.unwrap_or(0);
            lines.push(field(
                "Trigger",
                format!(
                    "{} {:+} min, today {} [{}]",
                    preview.event,
                    offset,
                    clock(preview.adjusted.map(|t| t.with_timezone(&now.timezone()))),
                    clock(preview.at.map(|t| t.with_timezone(&now.timezone()))),
                ),
            ));
        }
        None => {
            let shown = session.display_time(server, now);
            let time = match session.period() {
                Period::Once if event.native.start.is_some() => {
                    shown.format("%Y-%m-%d %H:%M").to_string()
                }
                Period::Once => "not set".to_string(),
                Period::Daily | Period::Monthly => shown.format("%H:%M").to_string(),
            };
            lines.push(field("Time", time));
        }
    }

    if let Some(recurrence) = session.recurrence() {
        lines.push(field("Repeats", describe_days(&recurrence, order)));
    } else if event.native.cron.is_some() {
        lines.push(field("Repeats", "unreadable recurrence".red().to_string()));
    }

    if let Some(jitter) = event.native.time_random_offset.filter(|ms| *ms != 0) {
        lines.push(field("Jitter", format!("up to {} ms", jitter)));
    }

    let object = match (&event.native.oid, session.bound_object()) {
        (None, _) => "none".dimmed().to_string(),
        (Some(oid), Some(_)) => oid.to_string(),
        (Some(oid), None) => format!("{} {}", oid, "(not found)".red()),
    };
    lines.push(field("Object", object));
    if let Some(domain) = session.value_domain() {
        lines.push(field("Values", domain.render()));
    }

    lines.push(field("Action", event.native.action.render()));
    let start_value = event
        .native
        .start_value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    lines.push(field("Value", start_value));

    if event.native.action.uses_duration() {
        lines.push(field(
            "Duration",
            format!("{} min", session.duration_minutes()),
        ));
    }
    if let Some(end) = session.end_value() {
        lines.push(field("End value", end.to_string()));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use astrocron_core::Event;
    use astrocron_core::astro::{AstroEvent, Location};
    use chrono::{NaiveDate, TimeZone};

    fn begin(event: Event) -> EditSession {
        EditSession::begin(
            event,
            Location::new(52.52, 13.405),
            NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(),
        )
    }

    #[test]
    fn daily_event_in_local_time() {
        let mut event = Event::new("e1", "Blinds");
        event.native.cron = Some("0 6 ? * 1-5".into());
        let now = chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2024, 6, 21, 12, 0, 0)
            .unwrap();

        let lines = details(&begin(event), &ServerClock::utc(), &now, &[1, 2, 3, 4, 5, 6, 0]);
        let text = lines.join("\n");

        assert!(text.contains("08:00"));
        assert!(text.contains("Mon, Tue, Wed, Thu, Fri"));
        assert!(text.contains("none"));
    }

    #[test]
    fn astro_event_shows_today() {
        let mut event = Event::new("e2", "Porch");
        event.native.astro = Some(AstroEvent::Sunset);
        event.native.offset = Some(10);
        let now = Tz::UTC.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();

        let text = details(&begin(event), &ServerClock::utc(), &now, &[0, 1, 2, 3, 4, 5, 6])
            .join("\n");
        assert!(text.contains("sunset +10 min, today"));
        assert!(!text.contains("??:??"));
    }

    #[test]
    fn unbound_object_is_flagged() {
        let mut event = Event::new("e3", "Pump");
        event.native.oid = Some("garden.0.pump".into());
        event.native.cron = Some("bad".into());
        let now = Tz::UTC.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();

        let text = details(&begin(event), &ServerClock::utc(), &now, &[0, 1, 2, 3, 4, 5, 6])
            .join("\n");
        assert!(text.contains("not found"));
        assert!(text.contains("unreadable recurrence"));
        assert!(text.contains("not set"));
    }
}
