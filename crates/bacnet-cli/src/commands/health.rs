//! Health command - run one health check

use anyhow::{bail, Result};
use bacnet_reader::BacnetReader;

use crate::output::{health_label, OutputContext};

pub async fn health(reader: &BacnetReader, ctx: &OutputContext) -> Result<()> {
    let healthy = reader.scope(|r| r.check_health()).await;
    let status = reader.status();

    let last_check = status
        .last_health_check
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    ctx.print_kv(
        &[
            ("Health", health_label(status.health_status)),
            ("Checked", last_check),
        ],
        &serde_json::json!({
            "healthy": healthy,
            "health_status": status.health_status,
            "last_health_check": status.last_health_check,
        }),
    );

    if !healthy {
        bail!("Device {} is not healthy", status.device_id);
    }
    Ok(())
}
