//! Stable location identity used as the key for all container state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A block position in a named world.
///
/// This is the immutable identity a container is tracked by, deliberately
/// separate from any live block handle so state survives chunk unload and
/// reload. Live-handle resolution happens only at the point of physical
/// mutation, through [`crate::WorldHost`].
///
/// The textual form is `world;x;y;z`, the only supported persisted key
/// format. World names containing `;` are therefore unsupported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationKey {
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl LocationKey {
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Chunk coordinates of the containing 16×16 column.
    pub fn chunk(&self) -> (i32, i32) {
        (self.x >> 4, self.z >> 4)
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{};{}", self.world, self.x, self.y, self.z)
    }
}

/// Error parsing a `world;x;y;z` key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationParseError {
    #[error("expected 4 semicolon-separated fields, got {0}")]
    FieldCount(usize),

    #[error("invalid coordinate '{0}'")]
    Coordinate(String),
}

impl FromStr for LocationKey {
    type Err = LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(';').collect();
        if parts.len() != 4 {
            return Err(LocationParseError::FieldCount(parts.len()));
        }
        let coord = |p: &str| {
            p.parse::<i32>()
                .map_err(|_| LocationParseError::Coordinate(p.to_string()))
        };
        Ok(Self {
            world: parts[0].to_string(),
            x: coord(parts[1])?,
            y: coord(parts[2])?,
            z: coord(parts[3])?,
        })
    }
}
