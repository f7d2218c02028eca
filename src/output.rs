//! Output formatting shared by the command-line commands

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unified output format for all commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON (single line per object)
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// JSON Lines format (one JSON object per line, for streaming)
    JsonLine,
}

impl OutputFormat {
    /// Get a list of all format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &["table", "markdown", "json", "json-pretty", "json-line"]
    }

    /// Render a serializable value as JSON according to this format
    ///
    /// Returns `None` for table formats.
    pub fn render_json<T: Serialize>(&self, value: &T) -> Option<Result<String, serde_json::Error>> {
        match self {
            Self::Json | Self::JsonLine => Some(serde_json::to_string(value)),
            Self::JsonPretty => Some(serde_json::to_string_pretty(value)),
            Self::Table | Self::Markdown => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::JsonLine => write!(f, "json-line"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("table"), Ok(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("MD"), Ok(OutputFormat::Markdown));
        assert_eq!(OutputFormat::from_str("jsonl"), Ok(OutputFormat::JsonLine));
        assert!(OutputFormat::from_str("xml").is_err());
    }

    #[test]
    fn test_output_format_display_round_trip() {
        for name in OutputFormat::all_names() {
            let format = OutputFormat::from_str(name).unwrap();
            assert_eq!(&format.to_string(), name);
        }
    }

    #[test]
    fn test_render_json() {
        let value = serde_json::json!({"applied": 2});
        assert_eq!(
            OutputFormat::Json.render_json(&value).unwrap().unwrap(),
            "{\"applied\":2}"
        );
        assert!(OutputFormat::Table.render_json(&value).is_none());
        assert!(OutputFormat::JsonPretty.render_json(&value).is_some());
    }
}
