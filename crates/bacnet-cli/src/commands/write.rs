//! Write command - write an object's present value

use anyhow::{Context, Result};
use bacnet_reader::{BacnetReader, PresentValue};

use crate::output::OutputContext;

/// Write a present value
pub async fn write(
    reader: &BacnetReader,
    name: &str,
    value: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let value = parse_value(value)?;

    reader
        .scope(|r| r.write_object(name, value.clone()))
        .await
        .with_context(|| format!("Failed to write {}", name))?;

    ctx.success(&format!("Successfully wrote {} = {}", name, value));
    Ok(())
}

/// Parse the value as JSON, falling back to plain text
fn parse_value(value: &str) -> Result<PresentValue> {
    let json = serde_json::from_str::<serde_json::Value>(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    PresentValue::try_from(json).context("Value must be a number, boolean or string")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("21.5").unwrap(), PresentValue::Number(21.5));
        assert_eq!(parse_value("true").unwrap(), PresentValue::Boolean(true));
        assert_eq!(
            parse_value("occupied").unwrap(),
            PresentValue::Text("occupied".into())
        );
        assert_eq!(
            parse_value("\"42\"").unwrap(),
            PresentValue::Text("42".into())
        );
        assert!(parse_value("[1, 2]").is_err());
        assert!(parse_value("null").is_err());
    }
}
