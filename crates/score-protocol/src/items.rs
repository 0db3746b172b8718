//! Collectible item scoring table

use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Collectible pickups and the points they award
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Coin,
    Gem,
    Crystal,
}

impl ItemKind {
    pub const ALL: [ItemKind; 3] = [ItemKind::Coin, ItemKind::Gem, ItemKind::Crystal];

    /// Points awarded for collecting this item
    pub const fn points(self) -> u64 {
        match self {
            ItemKind::Coin => 10,
            ItemKind::Gem => 25,
            ItemKind::Crystal => 50,
        }
    }

    /// Item awarding exactly `points`, if any
    pub fn from_points(points: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|item| item.points() == points)
    }

    pub const fn key(self) -> &'static str {
        match self {
            ItemKind::Coin => "coin",
            ItemKind::Gem => "gem",
            ItemKind::Crystal => "crystal",
        }
    }
}

impl FromStr for ItemKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|item| item.key() == s)
            .ok_or_else(|| ProtocolError::UnknownItem(s.to_string()))
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
