//! Discover command - find devices with Who-Is

use anyhow::Result;
use bacnet_reader::BacnetReader;

use crate::output::{DeviceRow, OutputContext};

/// Broadcast Who-Is, optionally limited to an instance range
pub async fn discover(
    reader: &BacnetReader,
    range: Option<(u32, u32)>,
    ctx: &OutputContext,
) -> Result<()> {
    let devices = reader
        .scope(|r| async move {
            match range {
                Some((low, high)) => r.discover_devices_in_range(low, high).await,
                None => r.discover_devices().await,
            }
        })
        .await;

    if devices.is_empty() {
        ctx.warn("No devices answered");
    }

    let rows: Vec<DeviceRow> = devices
        .into_iter()
        .map(|d| DeviceRow {
            device_id: d.device_id,
            address: d.address,
            vendor_name: d.vendor_name,
            object_count: d.object_count,
        })
        .collect();

    ctx.print(&rows);
    Ok(())
}
