pub mod astro;
pub mod config;
pub mod cron;
pub mod delete;
pub mod edit;
pub mod list;
pub mod new;
pub mod show;

use anyhow::Result;
use astrocron_core::config::Settings;
use astrocron_core::server_clock::ServerClock;
use astrocron_core::session::EditSession;
use astrocron_core::store::EventStore;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::store::{FileDirectory, FileStore};

/// What every command that touches events needs.
pub struct Context {
    pub settings: Settings,
    pub clock: ServerClock,
    /// The user's own time zone.
    pub tz: Tz,
    pub store: FileStore,
}

impl Context {
    pub fn load() -> Result<Self> {
        Self::new(Settings::load()?)
    }

    pub fn new(settings: Settings) -> Result<Self> {
        let clock = settings.server_clock(Utc::now())?;
        let store = FileStore::new(settings.event_dir());

        Ok(Context {
            clock,
            tz: local_timezone(),
            store,
            settings,
        })
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    pub fn objects(&self) -> FileDirectory {
        FileDirectory::new(self.settings.objects_file())
    }

    /// Load an event and start editing it, with its object bound.
    pub async fn open(&self, id: &str) -> Result<EditSession> {
        let Some(event) = self.store.get(id).await? else {
            anyhow::bail!(
                "Event '{}' not found in {}",
                id,
                self.store.dir().display()
            );
        };

        let mut session =
            EditSession::begin(event, self.settings.location(), self.now().date_naive());
        session.refresh_binding(&self.objects()).await;
        Ok(session)
    }
}

/// The system time zone, or UTC when it can't be determined.
pub fn local_timezone() -> Tz {
    iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| name.parse().ok())
        .unwrap_or(Tz::UTC)
}
