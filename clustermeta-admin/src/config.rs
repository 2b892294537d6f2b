//! System table configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How rows refer to other resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierFormat {
    /// By human-readable name.
    #[default]
    Name,
    /// By internal UUID.
    Uuid,
}

impl fmt::Display for IdentifierFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => f.write_str("name"),
            Self::Uuid => f.write_str("uuid"),
        }
    }
}

impl FromStr for IdentifierFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "uuid" => Ok(Self::Uuid),
            other => Err(format!(
                "unknown identifier format `{other}` (expected `name` or `uuid`)"
            )),
        }
    }
}

/// Configuration for the system tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// How `table_config` rows show databases and servers.
    pub identifier_format: IdentifierFormat,
}

impl AdminConfig {
    /// Parses a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
