//! Scheduled event records.
//!
//! The shape mirrors the scheduler's object store: an `_id`, a `common`
//! block with display metadata and a `native` block with the trigger and
//! the device action. Keys this crate doesn't know about are kept in the
//! `extra` maps so a load/save cycle never drops them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::astro::AstroEvent;
use crate::constants::DEFAULT_DAILY_CRON;
use crate::directory::States;
use crate::recurrence::{Period, Recurrence};

/// A scheduled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: String,
    pub common: EventCommon,
    pub native: EventNative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCommon {
    #[serde(default)]
    pub enabled: bool,
    pub name: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Either a plain name or one per language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Name {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl Name {
    /// Text for `lang`, falling back to English and then to any translation.
    pub fn text(&self, lang: &str) -> &str {
        match self {
            Name::Plain(name) => name,
            Name::Localized(names) => names
                .get(lang)
                .or_else(|| names.get("en"))
                .or_else(|| names.values().next())
                .map(String::as_str)
                .unwrap_or(""),
        }
    }
}

impl Default for Name {
    fn default() -> Self {
        Name::Plain(String::new())
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Name::Plain(name.to_string())
    }
}

impl From<String> for Name {
    fn from(name: String) -> Self {
        Name::Plain(name)
    }
}

/// What happens to the bound object when the event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Write `startValue` once.
    #[default]
    Single,
    /// Write `startValue`, then the interval's value after its delay.
    Double,
    /// Invert the current value, then invert it back after the delay.
    Toggle,
}

impl ActionType {
    /// Translation key of the action's label.
    pub fn label_key(&self) -> &'static str {
        match self {
            ActionType::Single => "single",
            ActionType::Double => "double",
            ActionType::Toggle => "toggle",
        }
    }

    pub fn uses_duration(&self) -> bool {
        !matches!(self, ActionType::Single)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_key())
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(ActionType::Single),
            "double" => Ok(ActionType::Double),
            "toggle" => Ok(ActionType::Toggle),
            _ => Err(format!("Unknown action '{}'. Expected single, double or toggle", s)),
        }
    }
}

/// A follow-up write, relative to the event's trigger.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    /// Delay in milliseconds.
    #[serde(default, deserialize_with = "millis")]
    pub time_offset: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fractional minute durations leave float millisecond counts in stored
/// records; they are rounded to whole milliseconds.
fn millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    number
        .as_i64()
        .or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.round() as i64)
        })
        .ok_or_else(|| serde::de::Error::custom(format!("invalid time offset {}", number)))
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNative {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,

    #[serde(rename = "type", default)]
    pub action: ActionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervals: Option<Vec<Interval>>,

    /// Recurrence string. Absent for one-shot events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,

    /// One-shot trigger, at the server's offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<FixedOffset>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub astro: Option<AstroEvent>,

    /// Minutes added to the astro event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,

    /// Random jitter in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_random_offset: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<States>,

    /// Older records kept their color here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// A new enabled event that fires daily at midnight.
    pub fn new(id: impl Into<String>, name: impl Into<Name>) -> Self {
        Event {
            id: id.into(),
            common: EventCommon {
                enabled: true,
                name: name.into(),
                color: None,
                icon: None,
                extra: Map::new(),
            },
            native: EventNative {
                cron: Some(DEFAULT_DAILY_CRON.to_string()),
                ..EventNative::default()
            },
        }
    }

    /// Parsed recurrence; `None` for one-shot or unreadable strings.
    pub fn recurrence(&self) -> Option<Recurrence> {
        self.native.cron.as_deref().and_then(Recurrence::parse)
    }

    pub fn period(&self) -> Period {
        Period::of(self.recurrence().as_ref())
    }

    pub fn color(&self) -> Option<&str> {
        self.common
            .color
            .as_deref()
            .or(self.native.color.as_deref())
    }

    /// The first interval, when there is one.
    pub fn first_interval(&self) -> Option<&Interval> {
        self.native.intervals.as_ref().and_then(|i| i.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored() -> Value {
        json!({
            "_id": "scheduler.0.events.porch",
            "common": {
                "enabled": true,
                "name": {"en": "Porch light", "de": "Verandalicht"},
                "icon": "data:image/svg+xml;base64,AAAA",
                "expert": true
            },
            "native": {
                "oid": "hue.0.porch.on",
                "type": "double",
                "startValue": true,
                "intervals": [{"timeOffset": 900000, "value": false}],
                "cron": "0 8 ? * 1-5",
                "astro": "sunset",
                "offset": -15,
                "timeRandomOffset": 30000,
                "states": {"0": "off", "1": "on"},
                "color": "#ff0000",
                "profile": "standard"
            }
        })
    }

    #[test]
    fn test_deserialize_stored_event() {
        let event: Event = serde_json::from_value(stored()).unwrap();

        assert_eq!(event.id, "scheduler.0.events.porch");
        assert_eq!(event.common.name.text("de"), "Verandalicht");
        assert_eq!(event.common.name.text("fr"), "Porch light");
        assert_eq!(event.native.action, ActionType::Double);
        assert_eq!(event.native.astro, Some(AstroEvent::Sunset));
        assert_eq!(event.first_interval().unwrap().time_offset, 900_000);
        assert_eq!(event.period(), Period::Daily);
        assert_eq!(event.color(), Some("#ff0000"));
    }

    #[test]
    fn test_unknown_keys_survive_roundtrip() {
        let event: Event = serde_json::from_value(stored()).unwrap();
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value, stored());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let event: Event = serde_json::from_value(json!({
            "_id": "e1",
            "common": {"name": "Minimal"},
            "native": {}
        }))
        .unwrap();

        assert!(!event.common.enabled);
        assert_eq!(event.native.action, ActionType::Single);
        assert_eq!(event.period(), Period::Once);
        assert_eq!(event.recurrence(), None);
    }

    #[test]
    fn test_one_shot_start_keeps_offset() {
        let event: Event = serde_json::from_value(json!({
            "_id": "e2",
            "common": {"name": "Once"},
            "native": {"start": "2024-05-01T06:30:00+02:00"}
        }))
        .unwrap();

        let start = event.native.start.unwrap();
        assert_eq!(start.offset().local_minus_utc(), 7200);
        assert_eq!(
            serde_json::to_value(&event).unwrap()["native"]["start"],
            json!("2024-05-01T06:30:00+02:00")
        );
    }

    #[test]
    fn test_unreadable_cron_is_once() {
        let mut event = Event::new("e3", "Broken");
        event.native.cron = Some("every day".into());

        assert_eq!(event.period(), Period::Once);
    }

    #[test]
    fn test_new_event_is_daily() {
        let event = Event::new("e4", "Fresh");
        assert!(event.common.enabled);
        assert_eq!(event.native.cron.as_deref(), Some(DEFAULT_DAILY_CRON));
        assert_eq!(event.period(), Period::Daily);
    }

    #[test]
    fn test_fractional_time_offset_is_rounded() {
        let event: Event = serde_json::from_value(json!({
            "_id": "e1",
            "common": {"name": "Pump"},
            "native": {"type": "double", "intervals": [{"timeOffset": 6000.000000000001, "value": 1}]}
        }))
        .unwrap();

        let first = event.first_interval().unwrap();
        assert_eq!(first.time_offset, 6000);
        assert_eq!(first.value, Some(json!(1)));
        assert_eq!(
            serde_json::to_value(&event).unwrap()["native"]["intervals"][0]["timeOffset"],
            json!(6000)
        );
    }

    #[test]
    fn test_non_numeric_time_offset_is_rejected() {
        let result = serde_json::from_value::<Event>(json!({
            "_id": "e1",
            "common": {"name": "Pump"},
            "native": {"intervals": [{"timeOffset": "soon"}]}
        }));
        assert!(result.is_err());
    }
}
