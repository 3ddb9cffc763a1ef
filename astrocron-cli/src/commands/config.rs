use anyhow::Result;
use astrocron_core::config::Settings;
use chrono::Utc;
use owo_colors::OwoColorize;

use crate::commands::local_timezone;

/// Print settings, storing a new site location first when one is given.
pub fn run(lat: Option<f64>, lon: Option<f64>) -> Result<()> {
    let config_path = Settings::config_path()?;
    let mut settings = Settings::load()?;

    if lat.is_some() || lon.is_some() {
        settings.latitude = lat.unwrap_or(settings.latitude);
        settings.longitude = lon.unwrap_or(settings.longitude);
        if !(-90.0..=90.0).contains(&settings.latitude)
            || !(-180.0..=180.0).contains(&settings.longitude)
        {
            anyhow::bail!("Location out of range");
        }
        settings.save()?;
        println!("{}", "  Location saved".green());
        println!();
    }
    let clock = settings.server_clock(Utc::now())?;

    println!("{}", "Paths".bold());
    println!("  Config:   {}", config_path.display());
    println!("  Events:   {}", settings.event_dir().display());
    println!("  Objects:  {}", settings.objects_file().display());

    println!();
    println!("{}", "Site".bold());
    println!("  Location:     {:.4}, {:.4}", settings.latitude, settings.longitude);
    println!("  Server clock: UTC{}", clock.offset());
    println!("  Local zone:   {}", local_timezone());

    Ok(())
}
