//! Event and object files on disk.
//!
//! Events are stored one per file as `<event_dir>/<id>.json`. Device objects
//! are read from a single JSON file holding either an array of objects or a
//! map from id to object.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use astrocron_core::directory::{DirectoryObject, ObjectDirectory};
use astrocron_core::error::{AstroCronError, AstroCronResult};
use astrocron_core::store::EventStore;
use astrocron_core::Event;
use async_trait::async_trait;

/// Event store backed by a directory of JSON files.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        let file_name: String = id
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }

    /// All readable events, sorted by id. Unreadable files are skipped.
    pub async fn list(&self) -> AstroCronResult<Vec<Event>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_event(&path).await {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping event file"),
            }
        }

        events.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(events)
    }
}

async fn read_event(path: &Path) -> AstroCronResult<Event> {
    let contents = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&contents).map_err(|e| AstroCronError::Serialization(e.to_string()))
}

#[async_trait]
impl EventStore for FileStore {
    async fn get(&self, id: &str) -> AstroCronResult<Option<Event>> {
        match read_event(&self.path_for(id)).await {
            Ok(event) => Ok(Some(event)),
            Err(AstroCronError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save(&self, id: &str, event: &Event) -> AstroCronResult<()> {
        let contents = serde_json::to_string_pretty(event)
            .map_err(|e| AstroCronError::Serialization(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AstroCronError::Store(format!("Could not create event directory: {e}")))?;
        tokio::fs::write(self.path_for(id), contents)
            .await
            .map_err(|e| AstroCronError::Store(format!("Could not write event file: {e}")))?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> AstroCronResult<()> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AstroCronError::EventNotFound(id.to_string()))
            }
            Err(e) => Err(AstroCronError::Store(format!("Could not delete event file: {e}"))),
        }
    }
}

/// Object directory backed by the objects file, read on every lookup.
/// A file that can't be read or parsed fails the lookup.
pub struct FileDirectory {
    path: PathBuf,
}

impl FileDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileDirectory { path: path.into() }
    }
}

#[async_trait]
impl ObjectDirectory for FileDirectory {
    async fn get_object(&self, id: &str) -> AstroCronResult<Option<DirectoryObject>> {
        let mut objects =
            load_objects(&self.path).map_err(|e| AstroCronError::Directory(format!("{e:#}")))?;
        Ok(objects.remove(id))
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ObjectsFile {
    List(Vec<DirectoryObject>),
    Map(BTreeMap<String, DirectoryObject>),
}

/// Read the objects file. A missing file is an empty directory.
pub fn load_objects(path: &Path) -> Result<BTreeMap<String, DirectoryObject>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let parsed: ObjectsFile = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let objects = match parsed {
        ObjectsFile::List(list) => list.into_iter().map(|o| (o.id.clone(), o)).collect(),
        ObjectsFile::Map(map) => map,
    };
    Ok(objects)
}
