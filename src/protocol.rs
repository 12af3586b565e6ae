//! Protocol messages for WebSocket communication
//!
//! Every frame is a JSON object with a `type` tag. Inbound frames are decoded
//! once into [`ClientMessage`]; outbound frames are built as [`ServerMessage`].

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, GameError};
use crate::ids::{PlayerId, RoomId};
use crate::player::{LeaderboardEntry, PlayerSummary};
use crate::room::RoomStatus;
use crate::settings::{GameMode, Settings, SettingsPatch};
use crate::words::Difficulty;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreateRoom {
        player_name: Option<String>,
        #[serde(default)]
        settings: SettingsPatch,
    },
    JoinRoom {
        room_id: String,
        player_name: Option<String>,
    },
    StartGame,
    SubmitWord {
        word: String,
    },
    /// Live preview of the word being typed; never validated
    WordUpdate {
        word: String,
    },
    UpdateSettings {
        #[serde(default)]
        settings: SettingsPatch,
    },
    BackToLobby,
    LeaveRoom,
    GetGameState,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, GameError> {
        serde_json::from_str(text).map_err(|e| GameError::Validation(format!("invalid message: {e}")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::CreateRoom { .. } => "create_room",
            ClientMessage::JoinRoom { .. } => "join_room",
            ClientMessage::StartGame => "start_game",
            ClientMessage::SubmitWord { .. } => "submit_word",
            ClientMessage::WordUpdate { .. } => "word_update",
            ClientMessage::UpdateSettings { .. } => "update_settings",
            ClientMessage::BackToLobby => "back_to_lobby",
            ClientMessage::LeaveRoom => "leave_room",
            ClientMessage::GetGameState => "get_game_state",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStart {
    pub round: u32,
    pub max_rounds: u32,
    pub prompt: String,
    pub difficulty: Difficulty,
    pub current_turn: PlayerId,
    pub player_name: String,
    /// Milliseconds
    pub time_limit: u64,
}

/// Outcome of a round for the player whose turn it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub player_id: PlayerId,
    pub player_name: String,
    pub word: Option<String>,
    pub is_valid: bool,
    pub points: u32,
    pub lives_lost: u32,
    pub eliminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundEnded {
    pub round: u32,
    pub results: Vec<RoundResult>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub correct_answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalStandings {
    pub final_leaderboard: Vec<LeaderboardEntry>,
    pub winner: Option<LeaderboardEntry>,
    pub total_rounds: u32,
}

/// A finished round, and the final standings if it also finished the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    pub ended: RoundEnded,
    pub finished: Option<FinalStandings>,
}

impl RoundSummary {
    pub fn into_messages(self) -> Vec<ServerMessage> {
        let mut messages = vec![ServerMessage::RoundEnded(self.ended)];
        if let Some(standings) = self.finished {
            messages.push(ServerMessage::GameFinished(standings));
        }
        messages
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub room_id: RoomId,
    pub status: RoomStatus,
    pub round: u32,
    pub max_rounds: u32,
    pub prompt: Option<String>,
    pub current_turn: Option<PlayerId>,
    /// Milliseconds left in the current turn
    pub time_remaining: u64,
    pub settings: Settings,
    pub players: Vec<PlayerSummary>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Read-only projection of a room for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub player_count: usize,
    pub max_players: usize,
    pub status: RoomStatus,
    pub mode: GameMode,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    RoomJoined {
        room_id: RoomId,
        player_id: PlayerId,
        is_creator: bool,
        players: Vec<PlayerSummary>,
        settings: Settings,
    },
    PlayerJoined {
        player: PlayerSummary,
        players: Vec<PlayerSummary>,
    },
    PlayerLeft {
        player_id: PlayerId,
        player_name: String,
        creator_id: Option<PlayerId>,
        players: Vec<PlayerSummary>,
    },
    LeftRoom {
        room_id: RoomId,
    },
    GameStarted {
        turn_order: Vec<PlayerId>,
        players: Vec<PlayerSummary>,
    },
    RoundStarted(RoundStart),
    WordUpdate {
        player_id: PlayerId,
        word: String,
    },
    RoundEnded(RoundEnded),
    GameFinished(FinalStandings),
    RoomReset {
        message: String,
        players: Vec<PlayerSummary>,
    },
    SettingsUpdated {
        settings: Settings,
    },
    GameState(GameStateView),
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(err: &GameError) -> Self {
        ServerMessage::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Serialize message to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
