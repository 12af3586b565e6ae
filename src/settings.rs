//! Per-room settings and the lenient patch applied by `create_room` / `update_settings`

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{
    DEFAULT_LIVES, DEFAULT_MAX_PLAYERS, DEFAULT_MAX_ROUNDS, DEFAULT_TURN_TIME_LIMIT_MS,
    LIVES_RANGE, MAX_PLAYERS_RANGE, MAX_ROUNDS_RANGE, TURN_TIME_LIMIT_MS_RANGE,
};
use crate::words::Difficulty;

/// Which scoring policy a room plays with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Timeouts cost a life; players with no lives left are out.
    #[default]
    Lives,
    /// Nobody is eliminated; valid words add up.
    Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnOrder {
    #[default]
    Join,
    Shuffle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub max_players: usize,
    #[serde(rename = "turnTimeLimit")]
    pub turn_time_limit_ms: u64,
    pub max_rounds: u32,
    pub lives: u32,
    pub difficulty: Option<Difficulty>,
    pub mode: GameMode,
    pub turn_order: TurnOrder,
    pub private: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
            turn_time_limit_ms: DEFAULT_TURN_TIME_LIMIT_MS,
            max_rounds: DEFAULT_MAX_ROUNDS,
            lives: DEFAULT_LIVES,
            difficulty: None,
            mode: GameMode::default(),
            turn_order: TurnOrder::default(),
            private: false,
        }
    }
}

impl Settings {
    pub fn turn_time_limit(&self) -> Duration {
        Duration::from_millis(self.turn_time_limit_ms)
    }

    /// Defaults with `patch` applied on top.
    pub fn from_patch(patch: &SettingsPatch) -> Self {
        let mut settings = Self::default();
        settings.apply(patch);
        settings
    }

    /// Apply every field of `patch` that is present and in range; drop the rest.
    ///
    /// A partially valid patch still applies its valid parts.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(n) = patch.max_players.and_then(|n| in_range(n, MAX_PLAYERS_RANGE)) {
            self.max_players = n as usize;
        }
        if let Some(ms) = patch
            .turn_time_limit
            .and_then(|ms| in_range(ms, TURN_TIME_LIMIT_MS_RANGE))
        {
            self.turn_time_limit_ms = ms as u64;
        }
        if let Some(n) = patch.max_rounds.and_then(|n| in_range(n, MAX_ROUNDS_RANGE)) {
            self.max_rounds = n as u32;
        }
        if let Some(n) = patch.lives.and_then(|n| in_range(n, LIVES_RANGE)) {
            self.lives = n as u32;
        }
        if let Some(difficulty) = patch.difficulty.as_deref() {
            match difficulty.trim() {
                "" | "any" => self.difficulty = None,
                other => {
                    if let Some(d) = Difficulty::parse(other) {
                        self.difficulty = Some(d);
                    }
                }
            }
        }
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(order) = patch.turn_order {
            self.turn_order = order;
        }
        if let Some(private) = patch.private {
            self.private = private;
        }
    }
}

fn in_range(value: i64, (min, max): (i64, i64)) -> Option<i64> {
    (min..=max).contains(&value).then_some(value)
}

/// Incoming settings. Each field is optional, and a field of the wrong type
/// is treated as absent instead of failing the whole message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    #[serde(deserialize_with = "lenient")]
    pub max_players: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub turn_time_limit: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub max_rounds: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub lives: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub difficulty: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub mode: Option<GameMode>,
    #[serde(deserialize_with = "lenient")]
    pub turn_order: Option<TurnOrder>,
    #[serde(deserialize_with = "lenient")]
    pub private: Option<bool>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
