//! `bagel timebox get|set`: inspect or move a table's bookmark by hand.

use anyhow::Result;
use bagel_core::naming::{format_table_name, parse_user_timestamp};
use bagel_core::BagelError;

use crate::backends;
use crate::config::Config;

fn configured_table(config: &Config, table: &str) -> Result<String> {
    let name = format_table_name(table.trim());
    if !config.tables()?.iter().any(|t| t.name == name) {
        return Err(BagelError::Config(format!("table '{}' is not configured", name)).into());
    }
    Ok(name)
}

/// Print the persisted bookmark, without creating one.
pub async fn run_get(config: &Config, table: &str) -> Result<()> {
    let name = configured_table(config, table)?;
    let store = backends::timebox_store(config)?;
    let client = store.connect().await?;
    let value = client.read_timestamp(&config.source.name, &name).await;
    client.close().await?;

    match value? {
        Some(ts) => println!("{}/{}: {}", config.source.name, name, ts),
        None => println!("{}/{}: (no bookmark)", config.source.name, name),
    }
    Ok(())
}

/// Overwrite the bookmark. Accepts the bookmark pattern or RFC 3339.
pub async fn run_set(config: &Config, table: &str, timestamp: &str) -> Result<()> {
    let name = configured_table(config, table)?;
    let ts = parse_user_timestamp(timestamp).ok_or_else(|| {
        BagelError::Config(format!("{:?} is not a valid timestamp", timestamp))
    })?;

    let store = backends::timebox_store(config)?;
    let client = store.connect().await?;
    let entry = client.write_run_timestamp(&config.source.name, &name, ts).await;
    client.close().await?;

    let entry = entry?;
    println!(
        "{}/{}: {}",
        entry.system, entry.table, entry.last_updated_timestamp
    );
    Ok(())
}
