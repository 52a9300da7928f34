use std::fmt;

use serde::{Deserialize, Serialize};

/// Saveable data kinds. Each maps to the save key of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameDataType {
    InputKeyBindings,
    PlayerStats,
}

impl GameDataType {
    pub const ALL: [GameDataType; 2] = [GameDataType::InputKeyBindings, GameDataType::PlayerStats];

    pub fn key(self) -> &'static str {
        match self {
            GameDataType::InputKeyBindings => "inputKeyBindings",
            GameDataType::PlayerStats => "playerStats",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for GameDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerStats {
    pub player_name: String,
    pub level: i32,
    pub health: f32,
    pub experience: i32,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            player_name: "Player".to_string(),
            level: 1,
            health: 100.0,
            experience: 0,
        }
    }
}

impl fmt::Display for PlayerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name: {}, level: {}", self.player_name, self.level)
    }
}
