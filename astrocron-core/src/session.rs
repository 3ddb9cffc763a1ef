//! Editing one event.
//!
//! An [`EditSession`] starts from a snapshot of a stored event and keeps all
//! changes on a private working copy until it is saved. Every change to the
//! working copy goes through [`EditSession::apply_edit`], which keeps an undo
//! history. Duration and end value live outside the working copy and are
//! folded into `intervals` only when the save candidate is built.
//!
//! The bound device object is fetched asynchronously. Lookups carry a
//! [`LookupTicket`] so a result that arrives after the user picked another
//! object is discarded.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::astro::{AstroEvent, AstroTimes, Location, compute_astro_times};
use crate::constants::{DEFAULT_DAILY_CRON, DEFAULT_MONTHLY_CRON, STORE_TIMEOUT};
use crate::directory::{DirectoryObject, ObjectDirectory, ValueDomain, resolve_icon};
use crate::error::{AstroCronError, AstroCronResult};
use crate::event::{ActionType, Event, Interval, Name};
use crate::recurrence::{Period, Recurrence};
use crate::server_clock::{Mode, ServerClock, ServerValue};
use crate::store::EventStore;
use crate::translate::Translate;

/// Duration written when the edited one is not a positive number. Negative
/// durations get it too, rather than being stored as negative delays.
const FALLBACK_DURATION_MINUTES: f64 = 1.0;

#[derive(Debug, Clone, Default)]
struct Binding {
    /// Advances whenever the bound object id changes.
    generation: u64,
    object: Option<DirectoryObject>,
}

/// Identifies one object lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    pub generation: u64,
    pub object_id: String,
    /// Whether the event's icon should follow the object.
    pub wants_icon: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Resolved {
        object: DirectoryObject,
        /// `None` leaves the event's icon alone.
        icon: Option<Option<String>>,
    },
    Missing,
    Failed(String),
}

/// An astro event's time today, before and after the event's offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AstroPreview {
    pub event: AstroEvent,
    pub at: Option<DateTime<Utc>>,
    pub adjusted: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct EditSession {
    original: Event,
    working: Event,
    history: Vec<Event>,

    initial_duration_minutes: f64,
    duration_minutes: f64,
    initial_end_value: Option<Value>,
    end_value: Option<Value>,

    site: Location,
    reference_date: NaiveDate,
    astro_times: AstroTimes,

    binding: Binding,
}

impl EditSession {
    /// Start editing `event`. Astro times are computed for `reference_date`
    /// at `site`.
    pub fn begin(event: Event, site: Location, reference_date: NaiveDate) -> Self {
        let first = event.first_interval();
        let duration_minutes = first
            .map(|i| i.time_offset as f64 / 60_000.0)
            .unwrap_or(0.0);
        let end_value = first.and_then(|i| i.value.clone());

        EditSession {
            working: event.clone(),
            original: event,
            history: Vec::new(),
            initial_duration_minutes: duration_minutes,
            duration_minutes,
            initial_end_value: end_value.clone(),
            end_value,
            astro_times: compute_astro_times(reference_date, site.latitude, site.longitude),
            site,
            reference_date,
            binding: Binding::default(),
        }
    }

    pub fn original(&self) -> &Event {
        &self.original
    }

    pub fn working(&self) -> &Event {
        &self.working
    }

    /// Apply `edit` to a copy of the working event and make the copy current.
    pub fn apply_edit(&mut self, edit: impl FnOnce(&mut Event)) {
        let mut next = self.working.clone();
        edit(&mut next);

        if next == self.working {
            return;
        }

        if next.native.oid != self.working.native.oid {
            self.binding.generation += 1;
            self.binding.object = None;
        }

        let previous = std::mem::replace(&mut self.working, next);
        self.history.push(previous);
    }

    /// Revert the last edit. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.pop() else {
            return false;
        };
        if previous.native.oid != self.working.native.oid {
            self.binding.generation += 1;
            self.binding.object = None;
        }
        self.working = previous;
        true
    }

    pub fn period(&self) -> Period {
        self.working.period()
    }

    pub fn recurrence(&self) -> Option<Recurrence> {
        self.working.recurrence()
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_minutes
    }

    pub fn end_value(&self) -> Option<&Value> {
        self.end_value.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.original != self.working
            || self.duration_minutes != self.initial_duration_minutes
            || self.end_value != self.initial_end_value
    }

    /// Check that the working event can be written to the store.
    pub fn validate(&self) -> AstroCronResult<()> {
        let Some(cron) = self.working.native.cron.as_deref() else {
            return Ok(());
        };
        match Recurrence::parse(cron) {
            None => Err(AstroCronError::Validation(format!(
                "unreadable recurrence '{}'",
                cron
            ))),
            Some(Recurrence::Monthly { days, months, .. })
                if days.is_empty() || months.is_empty() =>
            {
                Err(AstroCronError::Validation(
                    "a monthly event needs at least one day and one month".into(),
                ))
            }
            Some(_) => Ok(()),
        }
    }

    pub fn can_save(&self) -> bool {
        self.is_dirty() && self.validate().is_ok()
    }

    /// The working event with duration and end value folded into `intervals`.
    pub fn build_save_candidate(&self) -> Event {
        let mut candidate = self.working.clone();

        let minutes = if self.duration_minutes.is_finite() && self.duration_minutes > 0.0 {
            self.duration_minutes
        } else {
            FALLBACK_DURATION_MINUTES
        };
        let time_offset = (minutes * 60_000.0).round() as i64;

        match candidate.native.action {
            ActionType::Single => candidate.native.intervals = None,
            ActionType::Double => {
                let first = first_interval_mut(&mut candidate);
                first.time_offset = time_offset;
                first.value = self.end_value.clone();
            }
            ActionType::Toggle => first_interval_mut(&mut candidate).time_offset = time_offset,
        }

        candidate
    }

    /// Write the save candidate to `store`.
    ///
    /// On success the saved event becomes the new baseline. On failure the
    /// session is left as it was so the save can be retried.
    pub async fn save(&mut self, store: &dyn EventStore) -> AstroCronResult<Event> {
        self.validate()?;
        let candidate = self.build_save_candidate();

        tokio::time::timeout(STORE_TIMEOUT, store.save(&candidate.id, &candidate))
            .await
            .map_err(|_| AstroCronError::StoreTimeout(STORE_TIMEOUT.as_secs()))??;

        tracing::info!(id = %candidate.id, period = %candidate.period(), "Saved event");

        self.original = candidate.clone();
        self.working = candidate.clone();
        self.history.clear();
        self.initial_duration_minutes = self.duration_minutes;
        self.initial_end_value = self.end_value.clone();

        Ok(candidate)
    }

    /// Remove the event from `store`.
    pub async fn delete(&self, store: &dyn EventStore) -> AstroCronResult<()> {
        let id = &self.original.id;

        tokio::time::timeout(STORE_TIMEOUT, store.delete(id))
            .await
            .map_err(|_| AstroCronError::StoreTimeout(STORE_TIMEOUT.as_secs()))??;

        tracing::info!(%id, "Deleted event");
        Ok(())
    }

    // Edits

    pub fn set_enabled(&mut self, enabled: bool) {
        self.apply_edit(|e| e.common.enabled = enabled);
    }

    pub fn set_name(&mut self, name: impl Into<Name>) {
        let name = name.into();
        self.apply_edit(|e| e.common.name = name);
    }

    pub fn set_color(&mut self, color: Option<String>) {
        self.apply_edit(|e| e.common.color = color);
    }

    pub fn set_object_id(&mut self, oid: Option<String>) {
        self.apply_edit(|e| e.native.oid = oid.filter(|id| !id.is_empty()));
    }

    /// Change the action type. An event still named after its old action
    /// type is renamed after the new one.
    pub fn set_action_type(&mut self, action: ActionType, translate: &dyn Translate) {
        self.apply_edit(|e| {
            let old_label = translate.translate(e.native.action.label_key(), &[]);
            if matches!(&e.common.name, Name::Plain(name) if *name == old_label) {
                e.common.name = Name::Plain(translate.translate(action.label_key(), &[]));
            }
            e.native.action = action;
        });
    }

    pub fn set_start_value(&mut self, value: Value) {
        self.apply_edit(|e| e.native.start_value = Some(value));
    }

    pub fn set_duration_minutes(&mut self, minutes: f64) {
        self.duration_minutes = minutes;
    }

    pub fn set_end_value(&mut self, value: Option<Value>) {
        self.end_value = value;
    }

    /// Switch between an astro trigger and a clock time. Switching to astro
    /// starts at sunrise; switching back keeps the offset.
    pub fn use_astro(&mut self, astro: bool) {
        self.apply_edit(|e| {
            if astro {
                e.native.astro.get_or_insert(AstroEvent::Sunrise);
            } else {
                e.native.astro = None;
            }
        });
    }

    pub fn set_astro(&mut self, event: AstroEvent) {
        self.apply_edit(|e| e.native.astro = Some(event));
    }

    pub fn set_astro_offset(&mut self, minutes: i64) {
        self.apply_edit(|e| e.native.offset = Some(minutes));
    }

    /// Jitter in milliseconds.
    pub fn set_random_offset(&mut self, millis: i64) {
        self.apply_edit(|e| e.native.time_random_offset = Some(millis));
    }

    /// Set the time of day from the user's local time.
    pub fn set_time<Tz: TimeZone>(&mut self, local: &DateTime<Tz>, clock: &ServerClock) {
        match self.period() {
            Period::Once => {
                if let ServerValue::Date(start) = clock.client_to_server(local, Mode::Date) {
                    self.apply_edit(|e| e.native.start = Some(start));
                }
            }
            Period::Daily | Period::Monthly => {
                let time = clock.client_to_cron(local);
                self.edit_recurrence(|r| r.set_time(time));
            }
        }
    }

    /// Change how often the event repeats. `shown` is the time currently
    /// displayed to the user, which carries over to the new period.
    pub fn set_period<Tz: TimeZone>(
        &mut self,
        period: Period,
        shown: &DateTime<Tz>,
        clock: &ServerClock,
    ) {
        // An unreadable cron classifies as once but still needs clearing
        let unchanged = match period {
            Period::Once => self.working.native.cron.is_none(),
            _ => period == self.period(),
        };
        if unchanged {
            return;
        }

        let time = clock.client_to_cron(shown);
        let zone = shown.timezone();

        self.apply_edit(|e| match period {
            Period::Once => {
                e.native.cron = None;
                if let ServerValue::Date(start) = clock.client_to_server(shown, Mode::Date) {
                    e.native.start = Some(start);
                }
            }
            Period::Daily => {
                e.native.start = None;
                let mut recurrence = Recurrence::parse(DEFAULT_DAILY_CRON)
                    .unwrap_or_else(|| Recurrence::daily(time));
                recurrence.set_time(time);
                e.native.cron = Some(recurrence.to_string());
            }
            Period::Monthly => {
                let from_start = e.native.start.take().and_then(|start| {
                    let local = start.with_timezone(&zone);
                    Recurrence::monthly_on(time, local.day() as u8, local.month() as u8)
                });
                let mut recurrence = from_start
                    .or_else(|| Recurrence::parse(DEFAULT_MONTHLY_CRON))
                    .unwrap_or_else(|| Recurrence::monthly(time));
                recurrence.set_time(time);
                e.native.cron = Some(recurrence.to_string());
            }
        });
    }

    /// Weekday 0 = Sunday. The last selected day cannot be deselected.
    pub fn toggle_weekday(&mut self, day: u8) {
        self.edit_recurrence(|r| r.toggle_weekday(day));
    }

    pub fn toggle_month(&mut self, month: u8) {
        self.edit_recurrence(|r| r.toggle_month(month));
    }

    pub fn toggle_month_day(&mut self, day: u8) {
        self.edit_recurrence(|r| r.toggle_month_day(day));
    }

    pub fn toggle_all_month_days(&mut self) {
        self.edit_recurrence(Recurrence::toggle_all_month_days);
    }

    /// Rewrite the recurrence string. Does nothing when it cannot be read.
    fn edit_recurrence(&mut self, edit: impl FnOnce(&mut Recurrence)) {
        let Some(mut recurrence) = self.recurrence() else {
            return;
        };
        edit(&mut recurrence);
        let cron = recurrence.to_string();
        self.apply_edit(|e| e.native.cron = Some(cron));
    }

    // Display

    /// The time to show in the time picker, in `reference`'s zone.
    pub fn display_time<Tz: TimeZone>(
        &self,
        clock: &ServerClock,
        reference: &DateTime<Tz>,
    ) -> DateTime<Tz> {
        let value = match self.recurrence() {
            Some(recurrence) => Some(ServerValue::Cron(recurrence.time())),
            None => self.working.native.start.map(ServerValue::Date),
        };

        value
            .and_then(|v| clock.server_to_client(&v, reference))
            .unwrap_or_else(|| reference.clone())
    }

    pub fn astro_times(&self) -> &AstroTimes {
        &self.astro_times
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn set_reference_date(&mut self, date: NaiveDate) {
        if date != self.reference_date {
            self.reference_date = date;
            self.recompute_astro_times();
        }
    }

    pub fn set_location(&mut self, site: Location) {
        if site != self.site {
            self.site = site;
            self.recompute_astro_times();
        }
    }

    fn recompute_astro_times(&mut self) {
        self.astro_times = compute_astro_times(
            self.reference_date,
            self.site.latitude,
            self.site.longitude,
        );
    }

    /// Today's time of the event's astro trigger, if it has one.
    pub fn astro_preview(&self) -> Option<AstroPreview> {
        let event = self.working.native.astro?;
        let offset = self.working.native.offset.unwrap_or(0);
        Some(AstroPreview {
            event,
            at: self.astro_times.get(event),
            adjusted: self.astro_times.with_offset(event, offset),
        })
    }

    /// Highest selectable day of month. 29 unless the event is monthly.
    pub fn max_month_day(&self) -> u8 {
        self.recurrence()
            .and_then(|r| r.max_month_day())
            .unwrap_or(29)
    }

    // Object binding

    pub fn bound_object(&self) -> Option<&DirectoryObject> {
        self.binding.object.as_ref()
    }

    pub fn value_domain(&self) -> Option<ValueDomain> {
        self.bound_object().map(DirectoryObject::value_domain)
    }

    /// Ticket for fetching the bound object, or `None` when there is nothing
    /// to fetch.
    pub fn lookup_ticket(&self) -> Option<LookupTicket> {
        let object_id = self.working.native.oid.clone()?;
        if self
            .binding
            .object
            .as_ref()
            .is_some_and(|o| o.id == object_id)
        {
            return None;
        }

        // The icon stored with an event is kept until the user rebinds it
        let wants_icon =
            self.binding.object.is_some() || self.original.native.oid.as_ref() != Some(&object_id);

        Some(LookupTicket {
            generation: self.binding.generation,
            object_id,
            wants_icon,
        })
    }

    /// Fetch the object a ticket refers to.
    pub async fn resolve_lookup(
        directory: &dyn ObjectDirectory,
        ticket: &LookupTicket,
    ) -> LookupOutcome {
        let object = match directory.get_object(&ticket.object_id).await {
            Ok(Some(object)) => object,
            Ok(None) => return LookupOutcome::Missing,
            Err(e) => return LookupOutcome::Failed(e.to_string()),
        };

        let icon = if ticket.wants_icon {
            match resolve_icon(directory, &object).await {
                Ok(icon) => Some(icon),
                Err(e) => {
                    tracing::warn!(id = %object.id, error = %e, "Cannot resolve icon");
                    None
                }
            }
        } else {
            None
        };

        LookupOutcome::Resolved { object, icon }
    }

    /// Apply a lookup result. Returns false when the ticket is stale.
    pub fn apply_lookup(&mut self, ticket: &LookupTicket, outcome: LookupOutcome) -> bool {
        let current = self.working.native.oid.as_deref();
        if ticket.generation != self.binding.generation
            || current != Some(ticket.object_id.as_str())
        {
            tracing::debug!(id = %ticket.object_id, "Discarding stale object lookup");
            return false;
        }

        let object = match outcome {
            LookupOutcome::Resolved { object, icon } => {
                if let Some(icon) = icon {
                    self.apply_edit(|e| e.common.icon = icon);
                }
                object
            }
            LookupOutcome::Missing => {
                tracing::warn!(id = %ticket.object_id, "Bound object does not exist");
                self.binding.object = None;
                return true;
            }
            LookupOutcome::Failed(error) => {
                tracing::warn!(id = %ticket.object_id, %error, "Cannot get object");
                self.binding.object = None;
                return true;
            }
        };

        if self.working.native.states != object.common.states {
            let states = object.common.states.clone();
            self.apply_edit(|e| e.native.states = states);
        }

        if object.is_boolean() {
            self.coerce_to_boolean();
        }

        self.binding.object = Some(object);
        true
    }

    /// Fetch and apply the bound object, if it changed.
    pub async fn refresh_binding(&mut self, directory: &dyn ObjectDirectory) {
        let Some(ticket) = self.lookup_ticket() else {
            if self.working.native.oid.is_none() {
                self.binding.object = None;
            }
            return;
        };
        let outcome = Self::resolve_lookup(directory, &ticket).await;
        self.apply_lookup(&ticket, outcome);
    }

    fn coerce_to_boolean(&mut self) {
        let action = self.working.native.action;

        if action != ActionType::Toggle {
            let start = self.working.native.start_value.clone();
            if !matches!(start, Some(Value::Bool(_))) {
                let value = start.as_ref().is_some_and(truthy);
                self.apply_edit(|e| e.native.start_value = Some(Value::Bool(value)));
            }
        }

        if action == ActionType::Double && !matches!(self.end_value, Some(Value::Bool(_))) {
            let value = self.end_value.as_ref().is_some_and(truthy);
            self.end_value = Some(Value::Bool(value));
        }
    }
}

fn first_interval_mut(event: &mut Event) -> &mut Interval {
    let intervals = event.native.intervals.get_or_insert_with(Vec::new);
    if intervals.is_empty() {
        intervals.push(Interval::default());
    }
    &mut intervals[0]
}

/// Loose truthiness as used by the scheduler's UI: empty, zero and null are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
