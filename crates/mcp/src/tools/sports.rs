// Mock MLS scoreboard tool

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_schema_object, json_schema_string, tool_schema, Tool};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

/// (kickoff, home, home record, away, away record)
const FIXTURES: &[(&str, &str, &str, &str, &str)] = &[
    ("11:30 PM UTC", "TOR", "3-10-4", "RBNY", "8-7-3"),
    ("11:30 PM UTC", "NE", "6-5-5", "NSH", "9-4-5"),
    ("11:30 PM UTC", "MTL", "2-11-5", "CIN", "10-5-3"),
    ("11:30 PM UTC", "CLB", "8-3-7", "ATL", "4-9-5"),
    ("12:30 AM UTC", "STL", "3-9-6", "ORL", "8-4-6"),
    ("12:30 AM UTC", "MIN", "8-4-6", "HOU", "5-8-5"),
    ("12:30 AM UTC", "SKC", "4-10-4", "CLT", "8-9-1"),
    ("12:30 AM UTC", "DAL", "5-6-6", "SJ", "6-7-5"),
];

pub struct ScoreboardTool;

#[derive(Debug, Deserialize)]
struct ScoreboardArgs {
    date: String,
}

/// Accepts `YYYY-MM-DD` only
fn is_iso_date(date: &str) -> bool {
    let parts: Vec<&str> = date.split('-').collect();
    matches!(parts.as_slice(), [y, m, d]
        if y.len() == 4 && m.len() == 2 && d.len() == 2
            && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())))
}

fn render(date: &str) -> String {
    let mut board = format!("MLS scoreboard for {}\n", date);
    for (kickoff, home, home_record, away, away_record) in FIXTURES {
        board.push_str(&format!(
            "\n+---------------+\n| {:>13} |\n| {:<5}{:>8} |\n| {:<5}{:>8} |\n+---------------+\n",
            kickoff, home, home_record, away, away_record
        ));
    }
    board
}

#[async_trait::async_trait]
impl Tool for ScoreboardTool {
    fn schema(&self) -> ToolSchema {
        tool_schema(
            "get_mls_scoreboard",
            "Get the Major League Soccer (MLS) scores for a given date",
            json_schema_object(
                json!({"date": json_schema_string("The date to get MLS scores for, in YYYY-MM-DD format")}),
                vec!["date"],
            ),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: ScoreboardArgs =
            serde_json::from_value(arguments).context("Invalid arguments for get_mls_scoreboard")?;

        if !is_iso_date(&args.date) {
            return Ok(CallToolResult::error(format!(
                "Invalid date `{}`, expected YYYY-MM-DD",
                args.date
            )));
        }

        Ok(CallToolResult::text(render(&args.date)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_validation() {
        assert!(is_iso_date("2025-06-14"));
        assert!(!is_iso_date("14/06/2025"));
        assert!(!is_iso_date("2025-6-14"));
        assert!(!is_iso_date("2025-06-1x"));
    }

    #[tokio::test]
    async fn test_scoreboard_lists_every_fixture() {
        let result = ScoreboardTool
            .execute(json!({"date": "2025-06-14"}))
            .await
            .unwrap();
        let text = result.content[0].as_text().unwrap();

        assert!(text.starts_with("MLS scoreboard for 2025-06-14"));
        assert_eq!(text.matches("+---------------+").count(), FIXTURES.len() * 2);
        assert!(text.contains("| TOR    3-10-4 |"));
    }

    #[tokio::test]
    async fn test_bad_date_is_a_tool_error() {
        let result = ScoreboardTool.execute(json!({"date": "yesterday"})).await.unwrap();
        assert!(result.is_error());
    }
}
