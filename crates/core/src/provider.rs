//! Supported external logging services.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// An external service that accepts uploaded log files.
///
/// The wire name (`LoTW`, `eQSL`, ...) is the value stored in an
/// account's `elog` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "LoTW")]
    Lotw,
    #[serde(rename = "eQSL")]
    Eqsl,
    #[serde(rename = "HAMLOG")]
    Hamlog,
    #[serde(rename = "dev.cfmrda")]
    Cfmrda,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Lotw,
        Provider::Eqsl,
        Provider::Hamlog,
        Provider::Cfmrda,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Lotw => "LoTW",
            Provider::Eqsl => "eQSL",
            Provider::Hamlog => "HAMLOG",
            Provider::Cfmrda => "dev.cfmrda",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CoreError::UnsupportedProvider(s.to_string()))
    }
}
