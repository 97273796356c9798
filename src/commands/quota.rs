//! Quota display handler

use crate::config::Settings;
use crate::error::Result;
use crate::quota::{DailyQuota, DAILY_LIMIT};
use crate::storage::Storage;
use colored::Colorize;

/// Show today's free-tier usage
pub fn show(storage: Storage) -> Result<()> {
    let settings = Settings::load(&storage)?;
    let quota = DailyQuota::new(storage);
    let count = quota.current_count()?;

    let badge = format!("⚡ {}/{} free messages used today", count, DAILY_LIMIT);
    let percentage = count * 100 / DAILY_LIMIT;
    if percentage >= 100 {
        println!("{}", badge.red());
        println!(
            "{}",
            "The free tier is exhausted for today. Add a personal Groq key for unlimited access."
                .red()
        );
    } else if percentage > 66 {
        println!("{}", badge.yellow());
    } else {
        println!("{}", badge.green());
    }

    if !settings.uses_relay() {
        println!(
            "{}",
            "Note: your current provider settings bypass the free tier, so this limit does not apply."
                .dimmed()
        );
    }
    Ok(())
}
