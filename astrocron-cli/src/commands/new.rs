use anyhow::Result;
use astrocron_core::Event;
use astrocron_core::session::EditSession;
use astrocron_core::store::EventStore;
use owo_colors::OwoColorize;

use crate::commands::Context;

/// Create a daily event at midnight, ready to be edited.
pub async fn run(ctx: &Context, name: String, id: Option<String>) -> Result<()> {
    let id = id.unwrap_or_else(|| format!("event-{}", uuid::Uuid::new_v4()));

    if ctx.store.get(&id).await?.is_some() {
        anyhow::bail!("Event '{}' already exists", id);
    }

    let event = Event::new(id.clone(), name);
    let mut session = EditSession::begin(event, ctx.settings.location(), ctx.now().date_naive());
    let saved = session.save(&ctx.store).await?;

    let name = saved.common.name.text(&ctx.settings.language);
    println!("{}", format!("  Created: {}", name).green());
    println!("  {}", format!("astrocron edit {} --help", id).dimmed());

    Ok(())
}
