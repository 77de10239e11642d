//! Read command - read object present values

use anyhow::Result;
use bacnet_reader::{BacnetReader, Quality};

use crate::output::{OutputContext, ValueRow};

/// Read the named objects, or every configured object when none are given
pub async fn read(reader: &BacnetReader, names: &[String], ctx: &OutputContext) -> Result<()> {
    let names = (!names.is_empty()).then_some(names);
    let results = reader.scope(|r| r.read_objects(names)).await;

    if let Some(names) = names {
        for name in names.iter().filter(|n| !results.contains_key(*n)) {
            ctx.warn(&format!("Unknown object: {}", name));
        }
    }

    let rows: Vec<ValueRow> = results
        .into_iter()
        .map(|(object, result)| match result {
            Some(result) => ValueRow {
                object,
                value: result.value.to_string(),
                unit: result.unit,
                quality: quality_label(result.quality).to_string(),
                timestamp: result.timestamp.to_rfc3339(),
            },
            None => ValueRow {
                object,
                value: "-".to_string(),
                unit: String::new(),
                quality: quality_label(Quality::Failed).to_string(),
                timestamp: String::new(),
            },
        })
        .collect();

    ctx.print(&rows);
    Ok(())
}

fn quality_label(quality: Quality) -> &'static str {
    match quality {
        Quality::Good => "good",
        Quality::Failed => "failed",
    }
}
