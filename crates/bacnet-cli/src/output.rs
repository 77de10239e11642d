//! Output formatting for bacnet-cli (table, json)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print rows in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    println!("{}", Table::new(data));
                }
            }
            OutputFormat::Json => self.print_json(&data),
        }
    }

    /// Print key-value pairs, or `json` as-is in JSON mode
    pub fn print_kv<T: Serialize>(&self, pairs: &[(&str, String)], json: &T) {
        match self.format {
            OutputFormat::Table => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => self.print_json(json),
        }
    }

    fn print_json<T: Serialize + ?Sized>(&self, data: &T) {
        println!(
            "{}",
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "null".to_string())
        );
    }
}

/// Colored health label
pub fn health_label(status: bacnet_reader::HealthStatus) -> String {
    use bacnet_reader::HealthStatus;

    let label = status.to_string();
    match status {
        HealthStatus::Healthy => label.green().to_string(),
        HealthStatus::Unhealthy => label.yellow().to_string(),
        HealthStatus::Error => label.red().to_string(),
        HealthStatus::Unknown => label.dimmed().to_string(),
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Object value display for read command
#[derive(Debug, Tabled, Serialize)]
pub struct ValueRow {
    #[tabled(rename = "Object")]
    pub object: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[tabled(rename = "Quality")]
    pub quality: String,
    #[tabled(rename = "Timestamp")]
    pub timestamp: String,
}

/// Device display for discover command
#[derive(Debug, Tabled, Serialize)]
pub struct DeviceRow {
    #[tabled(rename = "Device ID")]
    pub device_id: u32,
    #[tabled(rename = "Address")]
    pub address: String,
    #[tabled(rename = "Vendor")]
    pub vendor_name: String,
    #[tabled(rename = "Objects")]
    pub object_count: u32,
}
