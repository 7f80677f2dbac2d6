//! Tabular ingestion and persistence layer.

pub mod candidates;
pub mod labels;
pub mod predictions;
pub mod statistics;
pub mod store;
pub mod truth;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

/// Train/dev/test partition of the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Dev,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Dev, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Dev => "dev",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = String;

    /// Accepts split names as well as the small integer codes (0/1/2) the
    /// upstream extraction writes.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "train" | "0" => Ok(Self::Train),
            "dev" | "tune" | "1" => Ok(Self::Dev),
            "test" | "2" => Ok(Self::Test),
            other => Err(format!("unknown split {other:?}")),
        }
    }
}

impl<'de> Deserialize<'de> for Split {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Deserialize a boolean flag written either as `0/1` or `true/false`.
pub(crate) fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "t" | "yes" => Ok(true),
        "0" | "0.0" | "false" | "f" | "no" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid flag {other:?}"))),
    }
}
