use anyhow::Result;

use crate::config::Config;

/// `bagel tables`: print the normalized table configuration.
pub fn list_tables(config: &Config) -> Result<()> {
    let tables = config.tables()?;

    println!(
        "{:<28} {:<10} {:<10} {:<8} INITIAL",
        "TABLE", "ELT_TYPE", "BATCH", "FORMAT"
    );
    for table in &tables {
        let batch = if table.historical_batch {
            let freq = table.frequency();
            format!("{}x{:?}", freq.count, freq.unit)
        } else {
            "-".to_string()
        };
        let initial = table
            .initial_timestamp
            .as_ref()
            .map(bagel_core::naming::format_bookmark)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<28} {:<10} {:<10} {:<8} {}",
            table.name,
            table.elt_type.as_deref().unwrap_or("-"),
            batch,
            table.output_format(),
            initial
        );
    }

    Ok(())
}
