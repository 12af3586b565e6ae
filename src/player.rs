use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use warp::ws::Message;

use crate::config::{MAX_LIVE_WORD_LEN, MAX_NAME_LEN};
use crate::ids::PlayerId;

/// One member of a room.
#[derive(Debug)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    sender: Option<UnboundedSender<Message>>,
    pub lives: u32,
    pub score: u32,
    pub correct_answers: u32,
    /// In-progress text shown to the others before submission
    pub current_word: String,
}

impl PlayerState {
    pub fn new(id: PlayerId, name: Option<&str>, sender: UnboundedSender<Message>) -> Self {
        let name = clean_name(name).unwrap_or_else(|| id.clone());
        Self {
            id,
            name,
            sender: Some(sender),
            lives: 0,
            score: 0,
            correct_answers: 0,
            current_word: String::new(),
        }
    }

    /// Send a text frame to this player.
    /// Returns false if the player has no live connection.
    pub fn send(&self, text: &str) -> bool {
        match &self.sender {
            Some(tx) => tx.send(Message::text(text)).is_ok(),
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sender.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Drop the connection handle; the player stays in the map.
    pub fn unbind(&mut self) {
        self.sender = None;
    }

    pub fn set_live_word(&mut self, word: &str) {
        self.current_word = word.chars().take(MAX_LIVE_WORD_LEN).collect();
    }

    pub fn reset_round_state(&mut self, lives: u32) {
        self.lives = lives;
        self.score = 0;
        self.correct_answers = 0;
        self.current_word.clear();
    }

    pub fn summary(&self, creator_id: Option<&str>, eligible: bool) -> PlayerSummary {
        PlayerSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            is_creator: creator_id == Some(self.id.as_str()),
            lives: self.lives,
            score: self.score,
            eligible,
        }
    }
}

/// Trimmed display name capped at `MAX_NAME_LEN` characters, or `None` if blank.
pub fn clean_name(name: Option<&str>) -> Option<String> {
    let name = name?.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.chars().take(MAX_NAME_LEN).collect())
}

/// What other clients get to see about a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub is_creator: bool,
    pub lives: u32,
    pub score: u32,
    pub eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: PlayerId,
    pub name: String,
    pub lives: u32,
    pub score: u32,
    pub correct_answers: u32,
}
