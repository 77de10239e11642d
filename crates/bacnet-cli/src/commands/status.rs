//! Status command - connect and show the reader status snapshot

use anyhow::Result;
use bacnet_reader::BacnetReader;

use crate::output::{health_label, OutputContext};

pub async fn status(reader: &BacnetReader, ctx: &OutputContext) -> Result<()> {
    let status = reader.scope(|r| async move { r.status() }).await;
    let stats = &status.stats;

    let pairs = [
        ("Device", status.device_id.clone()),
        ("Type", status.device_type.to_string()),
        (
            "Address",
            format!("{}:{}", status.device_address, status.port),
        ),
        ("Connected", status.is_connected.to_string()),
        ("Health", health_label(status.health_status)),
        ("Objects", status.object_count.to_string()),
        ("Discovered devices", status.discovered_devices_count.to_string()),
        ("Timeout", format!("{:.1}s", status.timeout_secs)),
        (
            "Retries",
            format!("{} (delay {:.1}s)", status.retry_count, status.retry_delay_secs),
        ),
        ("Connection errors", stats.connection_errors.to_string()),
        (
            "Last error",
            stats.last_error.clone().unwrap_or_else(|| "-".to_string()),
        ),
    ];

    ctx.print_kv(&pairs, &status);
    Ok(())
}
