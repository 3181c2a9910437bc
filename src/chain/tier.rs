//! Tier identifiers
//!
//! The closed set of mastering tiers, ordered by increasing processing
//! intensity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PreviewError;

/// A named mastering configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierId {
    Basic,
    Advanced,
    Premium,
}

impl TierId {
    /// Every tier, lowest intensity first
    pub const ALL: [TierId; 3] = [TierId::Basic, TierId::Advanced, TierId::Premium];

    /// Lowercase identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            TierId::Basic => "basic",
            TierId::Advanced => "advanced",
            TierId::Premium => "premium",
        }
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierId {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(TierId::Basic),
            "advanced" => Ok(TierId::Advanced),
            "premium" => Ok(TierId::Premium),
            other => Err(PreviewError::InvalidParameter {
                param: "tier".to_string(),
                value: other.to_string(),
                expected: "basic, advanced or premium".to_string(),
            }),
        }
    }
}
