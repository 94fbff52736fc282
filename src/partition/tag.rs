use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PartitionError;

/// Dimension a cache encodes chunks for.
///
/// Several logical dimensions may share one in-memory world; the tag is what
/// tells the client how to interpret the streamed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionTag(pub u8);

impl PartitionTag {
    pub const OVERWORLD: Self = Self(0);
    pub const NETHER: Self = Self(1);
    pub const END: Self = Self(2);

    /// Number of vertical sub-chunk sections the client accepts for this
    /// dimension. Unknown tags get the overworld limit.
    pub fn sub_chunk_limit(self) -> usize {
        match self {
            Self::NETHER => 8,
            Self::END => 16,
            _ => 24,
        }
    }

    /// Parse a dimension name from the `apply-to-worlds` configuration.
    ///
    /// Only `nether` and `end` are accepted there: mapping a world to the
    /// overworld is what the default cache already does.
    pub fn from_config_name(name: &str) -> Result<Self, PartitionError> {
        match name {
            "nether" => Ok(Self::NETHER),
            "end" => Ok(Self::END),
            other => Err(PartitionError::InvalidDimension(other.to_string())),
        }
    }
}

impl fmt::Display for PartitionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::OVERWORLD => write!(f, "overworld"),
            Self::NETHER => write!(f, "nether"),
            Self::END => write!(f, "end"),
            Self(id) => write!(f, "dimension {}", id),
        }
    }
}

impl FromStr for PartitionTag {
    type Err = PartitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overworld" => Ok(Self::OVERWORLD),
            "nether" => Ok(Self::NETHER),
            "end" | "the_end" => Ok(Self::END),
            other => other
                .parse::<u8>()
                .map(Self)
                .map_err(|_| PartitionError::InvalidDimension(s.to_string())),
        }
    }
}
