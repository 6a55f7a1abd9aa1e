// Mock weather forecast tool

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_schema_object, json_schema_string, tool_schema, Tool};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

const CONDITIONS: &[(&str, &str)] = &[
    ("Sunny", "\\   /"),
    ("Partly cloudy", "  \\  /"),
    ("Light rain", " ʻ ʻ ʻ"),
    ("Overcast", " .--."),
];

/// Serves a deterministic forecast derived from the location string
pub struct WeatherTool;

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    location: String,
}

impl WeatherTool {
    fn forecast(location: &str) -> String {
        let seed = location.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        let (condition, icon) = CONDITIONS[seed as usize % CONDITIONS.len()];
        let temperature = (seed % 30) as i32 - 2;
        let wind = seed % 25 + 3;

        format!(
            "Weather report: {location}\n\n{icon}     {condition}\n          {temperature} °C\n          ↗ {wind} km/h\n"
        )
    }
}

#[async_trait::async_trait]
impl Tool for WeatherTool {
    fn schema(&self) -> ToolSchema {
        tool_schema(
            "get_weather",
            "Get the weather for a given location\n\n\
             Examples of supported location types:\n\
             - paris: city name\n\
             - muc: airport code (3 letters)\n\
             - 94107: area codes\n\
             - -78.46,106.79: GPS coordinates",
            json_schema_object(
                json!({"location": json_schema_string("The location to get the weather for")}),
                vec!["location"],
            ),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: WeatherArgs =
            serde_json::from_value(arguments).context("Invalid arguments for get_weather")?;

        if args.location.trim().is_empty() {
            return Ok(CallToolResult::error("location must not be empty"));
        }

        Ok(CallToolResult::text(Self::forecast(args.location.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forecast_is_deterministic() {
        let first = WeatherTool.execute(json!({"location": "paris"})).await.unwrap();
        let second = WeatherTool.execute(json!({"location": "paris"})).await.unwrap();

        assert_eq!(first, second);
        assert!(first.content[0].as_text().unwrap().starts_with("Weather report: paris"));
    }

    #[tokio::test]
    async fn test_missing_location_is_rejected() {
        assert!(WeatherTool.execute(json!({})).await.is_err());

        let result = WeatherTool.execute(json!({"location": "  "})).await.unwrap();
        assert!(result.is_error());
    }
}
