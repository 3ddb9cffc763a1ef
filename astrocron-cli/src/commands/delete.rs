use anyhow::Result;
use dialoguer::Confirm;
use owo_colors::OwoColorize;

use crate::commands::Context;

pub async fn run(ctx: &Context, id: &str, yes: bool) -> Result<()> {
    let session = ctx.open(id).await?;
    let name = session.original().common.name.text(&ctx.settings.language).to_string();

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("  Delete '{}'?", name))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", "  Kept".dimmed());
            return Ok(());
        }
    }

    session.delete(&ctx.store).await?;
    println!("{}", format!("  Deleted: {}", name).red());

    Ok(())
}
