use anyhow::{Result, bail};
use serde::Serialize;
use std::str::FromStr;

/// Output format for the selection listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One selected test name per line
    #[default]
    Text,
    /// JSON - the full selection report, machine-parseable
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => bail!("Invalid format '{}'. Use: text or json", s),
        }
    }
}

impl OutputFormat {
    /// Serialize data to the requested format
    pub fn serialize<T: Serialize>(self, data: &T) -> Result<String> {
        match self {
            Self::Json => serde_json::to_string_pretty(data)
                .map_err(|e| anyhow::anyhow!("JSON serialization failed: {}", e)),
            Self::Text => {
                // Text listings are rendered by the caller
                bail!("Text format should not use serialize()")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("toon".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn json_serializes_structs() {
        #[derive(Serialize)]
        struct Listing {
            selected: Vec<&'static str>,
        }
        let out = OutputFormat::Json
            .serialize(&Listing {
                selected: vec!["plain_1d"],
            })
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["selected"][0], "plain_1d");
    }

    #[test]
    fn text_refuses_serialize() {
        assert!(OutputFormat::Text.serialize(&1).is_err());
    }
}
