use anyhow::{Context as _, Result};
use astrocron_core::astro::AstroEvent;
use astrocron_core::constants::ASTRO_OFFSET_CHOICES;
use astrocron_core::recurrence::{ClockTime, Period};
use astrocron_core::server_clock::ServerClock;
use astrocron_core::session::EditSession;
use astrocron_core::translate::Untranslated;
use astrocron_core::ActionType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use clap::Args;
use owo_colors::OwoColorize;
use serde_json::Value;

use crate::commands::Context;
use crate::commands::show::details;

#[derive(Args, Debug, Default)]
pub struct EditArgs {
    /// New display name
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,

    #[arg(long)]
    pub disable: bool,

    /// Display color, e.g. "#ff8800" ("" to clear)
    #[arg(long)]
    pub color: Option<String>,

    /// Id of the object to control ("" to unbind)
    #[arg(long)]
    pub object: Option<String>,

    /// single, double or toggle
    #[arg(long)]
    pub action: Option<ActionType>,

    /// Value written when the event fires (JSON, or plain text)
    #[arg(long)]
    pub value: Option<String>,

    /// Delay before the second write of double/toggle actions (e.g. "15m", "90s" or minutes)
    #[arg(long)]
    pub duration: Option<String>,

    /// Value written after the delay of a double action
    #[arg(long)]
    pub end_value: Option<String>,

    /// Trigger on a sun event (sunrise, sunset, dusk, ...)
    #[arg(long, conflicts_with = "clock")]
    pub astro: Option<AstroEvent>,

    /// Trigger on a clock time again instead of a sun event
    #[arg(long)]
    pub clock: bool,

    /// Minutes added to the sun event
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<i64>,

    /// Random jitter in milliseconds
    #[arg(long)]
    pub random_offset: Option<i64>,

    /// once, daily or monthly
    #[arg(long)]
    pub period: Option<Period>,

    /// Time of day in your local time (HH:MM)
    #[arg(long)]
    pub time: Option<ClockTime>,

    /// Date of a one-time event (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Toggle a weekday of a daily event (0 = Sunday), repeatable
    #[arg(long = "weekday")]
    pub weekdays: Vec<u8>,

    /// Toggle a month of a monthly event (1-12), repeatable
    #[arg(long = "month")]
    pub months: Vec<u8>,

    /// Toggle a day of a monthly event (1-31), repeatable
    #[arg(long = "day")]
    pub days: Vec<u8>,

    /// Select every day of the month, or only the 1st if all are selected
    #[arg(long)]
    pub all_days: bool,

    /// Print the event that would be saved instead of saving it
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(ctx: &Context, id: &str, args: EditArgs) -> Result<()> {
    let mut session = ctx.open(id).await?;
    let now = ctx.now();

    apply(&mut session, &args, &ctx.clock, &now)?;

    // A new object brings its states, icon and value type
    session.refresh_binding(&ctx.objects()).await;

    if !session.is_dirty() {
        println!("{}", "  No changes".dimmed());
        return Ok(());
    }
    session.validate()?;

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&session.build_save_candidate())?);
        return Ok(());
    }

    session
        .save(&ctx.store)
        .await
        .context("Could not save event, it was left unchanged")?;

    let lines = details(&session, &ctx.clock, &now, &ctx.settings.weekday_order());
    println!("{}", lines.join("\n"));

    Ok(())
}

/// Apply command line edits to a session.
pub fn apply(
    session: &mut EditSession,
    args: &EditArgs,
    clock: &ServerClock,
    now: &DateTime<Tz>,
) -> Result<()> {
    if args.enable {
        session.set_enabled(true);
    }
    if args.disable {
        session.set_enabled(false);
    }
    if let Some(name) = &args.name {
        session.set_name(name.as_str());
    }
    if let Some(color) = &args.color {
        session.set_color(Some(color.clone()).filter(|c| !c.is_empty()));
    }
    if let Some(object) = &args.object {
        session.set_object_id(Some(object.clone()));
    }
    if let Some(action) = args.action {
        session.set_action_type(action, &Untranslated);
    }
    if let Some(value) = &args.value {
        session.set_start_value(parse_value(value));
    }
    if let Some(duration) = &args.duration {
        session.set_duration_minutes(parse_minutes(duration)?);
    }
    if let Some(value) = &args.end_value {
        session.set_end_value(Some(parse_value(value)));
    }

    if let Some(astro) = args.astro {
        session.use_astro(true);
        session.set_astro(astro);
    }
    if args.clock {
        session.use_astro(false);
    }
    if let Some(offset) = args.offset {
        if !ASTRO_OFFSET_CHOICES.contains(&offset) {
            let mut choices = ASTRO_OFFSET_CHOICES;
            choices.sort_unstable();
            let choices: Vec<_> = choices.iter().map(i64::to_string).collect();
            anyhow::bail!("Offset must be one of {} minutes", choices.join(", "));
        }
        session.set_astro_offset(offset);
    }
    if let Some(millis) = args.random_offset {
        session.set_random_offset(millis);
    }

    if let Some(period) = args.period {
        let shown = session.display_time(clock, now);
        session.set_period(period, &shown, clock);
    }

    if args.time.is_some() || args.date.is_some() {
        if args.date.is_some() && session.period() != Period::Once {
            anyhow::bail!("--date only applies to one-time events (use --period once)");
        }
        let shown = session.display_time(clock, now);
        let date = args.date.unwrap_or_else(|| shown.date_naive());
        let time = args
            .time
            .map(ClockTime::to_naive)
            .unwrap_or_else(|| shown.time());
        let tz = now.timezone();
        let local = tz
            .from_local_datetime(&NaiveDateTime::new(date, time))
            .earliest()
            .ok_or_else(|| anyhow::anyhow!("{} {} does not exist in {}", date, time, tz))?;
        session.set_time(&local, clock);
    }

    for day in &args.weekdays {
        session.toggle_weekday(*day);
    }
    for month in &args.months {
        session.toggle_month(*month);
    }
    for day in &args.days {
        session.toggle_month_day(*day);
    }
    if args.all_days {
        session.toggle_all_month_days();
    }

    Ok(())
}

/// JSON when it parses as JSON, otherwise the text itself.
fn parse_value(input: &str) -> Value {
    serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_string()))
}

/// Plain numbers are minutes; anything else goes through humantime.
fn parse_minutes(input: &str) -> Result<f64> {
    if let Ok(minutes) = input.trim().parse::<f64>() {
        return Ok(minutes);
    }
    let duration = humantime::parse_duration(input)
        .map_err(|e| anyhow::anyhow!("Could not parse duration \"{}\": {}", input, e))?;
    Ok(duration.as_secs_f64() / 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use astrocron_core::Event;
    use astrocron_core::astro::Location;
    use serde_json::json;

    fn session(cron: Option<&str>) -> EditSession {
        let mut event = Event::new("e1", "Blinds");
        event.native.cron = cron.map(str::to_string);
        EditSession::begin(
            event,
            Location::new(52.52, 13.405),
            NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(),
        )
    }

    fn berlin_noon() -> DateTime<Tz> {
        chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2024, 6, 21, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn parse_value_prefers_json() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("on"), json!("on"));
    }

    #[test]
    fn parse_minutes_forms() {
        assert_eq!(parse_minutes("15").unwrap(), 15.0);
        assert_eq!(parse_minutes("90s").unwrap(), 1.5);
        assert_eq!(parse_minutes("1h").unwrap(), 60.0);
        assert!(parse_minutes("soon").is_err());
    }

    #[test]
    fn local_time_becomes_server_cron() {
        let mut s = session(Some("0 0 ? * 0-6"));
        let args = EditArgs {
            time: Some("07:30".parse().unwrap()),
            weekdays: vec![0, 6],
            ..EditArgs::default()
        };

        apply(&mut s, &args, &ServerClock::utc(), &berlin_noon()).unwrap();
        assert_eq!(s.working().native.cron.as_deref(), Some("30 5 ? * 1-5"));
    }

    #[test]
    fn once_with_date_and_time() {
        let mut s = session(None);
        let args = EditArgs {
            date: Some(NaiveDate::from_ymd_opt(2024, 12, 24).unwrap()),
            time: Some("18:00".parse().unwrap()),
            ..EditArgs::default()
        };

        apply(&mut s, &args, &ServerClock::utc(), &berlin_noon()).unwrap();
        let start = s.working().native.start.unwrap();
        assert_eq!(start.to_rfc3339(), "2024-12-24T17:00:00+00:00");
    }

    #[test]
    fn date_requires_once() {
        let mut s = session(Some("0 0 ? * 0-6"));
        let args = EditArgs {
            date: Some(NaiveDate::from_ymd_opt(2024, 12, 24).unwrap()),
            ..EditArgs::default()
        };
        assert!(apply(&mut s, &args, &ServerClock::utc(), &berlin_noon()).is_err());
    }

    #[test]
    fn double_action_with_duration() {
        let mut s = session(Some("0 0 ? * 0-6"));
        let args = EditArgs {
            action: Some(ActionType::Double),
            value: Some("1".into()),
            duration: Some("15m".into()),
            end_value: Some("42".into()),
            ..EditArgs::default()
        };

        apply(&mut s, &args, &ServerClock::utc(), &berlin_noon()).unwrap();
        let candidate = s.build_save_candidate();
        let first = candidate.first_interval().unwrap();
        assert_eq!(first.time_offset, 900_000);
        assert_eq!(first.value, Some(json!(42)));
        assert_eq!(candidate.native.start_value, Some(json!(1)));
    }

    #[test]
    fn offset_outside_choices_is_rejected() {
        let mut s = session(Some("0 6 ? * 0-6"));
        let args = EditArgs {
            offset: Some(7),
            ..EditArgs::default()
        };
        let err = apply(&mut s, &args, &ServerClock::utc(), &berlin_noon()).unwrap_err();
        assert!(err.to_string().contains("-240, -180"));
    }

    #[test]
    fn switch_to_monthly_and_sunset() {
        let mut s = session(Some("0 6 ? * 0-6"));
        let args = EditArgs {
            period: Some(Period::Monthly),
            astro: Some(AstroEvent::Sunset),
            offset: Some(-20),
            days: vec![15],
            ..EditArgs::default()
        };

        apply(&mut s, &args, &ServerClock::utc(), &berlin_noon()).unwrap();
        assert_eq!(
            s.working().native.cron.as_deref(),
            Some("0 6 1-14,16-31 1-12 *")
        );
        assert_eq!(s.working().native.astro, Some(AstroEvent::Sunset));
        assert_eq!(s.working().native.offset, Some(-20));
    }
}
