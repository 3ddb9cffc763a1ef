//! Device objects the events act on.
//!
//! The object directory is owned by the home-automation host; this module
//! only describes the slice of an object the editor reads (its kind, value
//! type, enumerated states and icon) and the async trait used to fetch one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AstroCronResult;
use crate::event::Name;

/// Enumerated states of an object, code to label.
///
/// Hosts store these as a map, a list of labels or a `"0:off;1:on"` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum States {
    Map(BTreeMap<String, String>),
    List(Vec<String>),
    Text(String),
}

impl States {
    /// `(code, label)` pairs in the order the host defined them.
    pub fn labels(&self) -> Vec<(String, String)> {
        match self {
            States::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            States::List(list) => list
                .iter()
                .enumerate()
                .map(|(i, label)| (i.to_string(), label.clone()))
                .collect(),
            States::Text(text) => text
                .split(';')
                .filter(|pair| !pair.trim().is_empty())
                .map(|pair| match pair.split_once(':') {
                    Some((code, label)) => (code.trim().to_string(), label.trim().to_string()),
                    None => (pair.trim().to_string(), pair.trim().to_string()),
                })
                .collect(),
        }
    }

    /// Label for a code, if defined.
    pub fn label(&self, code: &str) -> Option<String> {
        self.labels()
            .into_iter()
            .find(|(c, _)| c == code)
            .map(|(_, label)| label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    State,
    Channel,
    Device,
    Folder,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectCommon {
    /// Value type, e.g. `boolean`, `number`, `string`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<States>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub name: Name,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryObject {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    #[serde(default)]
    pub common: ObjectCommon,
}

/// Values an object accepts, as far as the editor cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueDomain {
    Boolean,
    Enumerated(Vec<(String, String)>),
    FreeForm,
}

impl DirectoryObject {
    pub fn value_domain(&self) -> ValueDomain {
        if self.common.value_type.as_deref() == Some("boolean") {
            ValueDomain::Boolean
        } else if let Some(states) = &self.common.states {
            ValueDomain::Enumerated(states.labels())
        } else {
            ValueDomain::FreeForm
        }
    }

    pub fn is_boolean(&self) -> bool {
        self.value_domain() == ValueDomain::Boolean
    }

    /// Id of the enclosing object (`a.b.c` -> `a.b`).
    pub fn parent_id(&self) -> Option<&str> {
        parent_of(&self.id)
    }

    /// The object's own icon, with adapter-relative paths made absolute.
    pub fn icon(&self) -> Option<String> {
        let icon = self.common.icon.as_deref().filter(|i| !i.is_empty())?;
        if icon.starts_with("data:") || icon.starts_with('/') || icon.contains("://") {
            return Some(icon.to_string());
        }
        let adapter = self.id.split('.').next().unwrap_or_default();
        Some(format!("/adapter/{}/{}", adapter, icon))
    }
}

fn parent_of(id: &str) -> Option<&str> {
    id.rsplit_once('.').map(|(parent, _)| parent)
}

/// Source of device objects.
#[async_trait]
pub trait ObjectDirectory: Send + Sync {
    /// `Ok(None)` when no object has that id.
    async fn get_object(&self, id: &str) -> AstroCronResult<Option<DirectoryObject>>;
}

#[async_trait]
impl ObjectDirectory for BTreeMap<String, DirectoryObject> {
    async fn get_object(&self, id: &str) -> AstroCronResult<Option<DirectoryObject>> {
        Ok(self.get(id).cloned())
    }
}

/// Icon to show for `object`.
///
/// A state without its own icon borrows its parent's. When the parent has no
/// icon either and is missing or a channel/device, the grandparent's is used.
pub async fn resolve_icon(
    directory: &dyn ObjectDirectory,
    object: &DirectoryObject,
) -> AstroCronResult<Option<String>> {
    if let Some(icon) = object.icon() {
        return Ok(Some(icon));
    }
    if object.kind != ObjectKind::State {
        return Ok(None);
    }

    let Some(parent_id) = object.parent_id() else {
        return Ok(None);
    };
    let parent = directory.get_object(parent_id).await?;

    if let Some(icon) = parent.as_ref().and_then(DirectoryObject::icon) {
        return Ok(Some(icon));
    }

    let climb = match &parent {
        None => true,
        Some(p) => matches!(p.kind, ObjectKind::Channel | ObjectKind::Device),
    };
    if !climb {
        return Ok(None);
    }

    let Some(grandparent_id) = parent_of(parent_id) else {
        return Ok(None);
    };
    Ok(directory
        .get_object(grandparent_id)
        .await?
        .as_ref()
        .and_then(DirectoryObject::icon))
}
