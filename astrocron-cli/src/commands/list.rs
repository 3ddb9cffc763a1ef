use anyhow::Result;
use owo_colors::OwoColorize;

use crate::commands::Context;
use crate::render::Render;

pub async fn run(ctx: &Context) -> Result<()> {
    let events = ctx.store.list().await?;

    if events.is_empty() {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    for event in &events {
        println!("{}", event.render());
    }

    Ok(())
}
