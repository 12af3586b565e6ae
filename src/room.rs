//! Room state machine
//!
//! A room moves `Waiting -> Active -> Finished` and back to `Waiting` on reset.
//! All mutation happens through `&mut Room`, i.e. while holding the room's
//! write lock, so operations on one room are serialized. Operations either
//! fully apply or return an error without touching state.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{Timings, MIN_PLAYERS_TO_START, REVEALED_ANSWERS};
use crate::error::GameError;
use crate::ids::{PlayerId, RoomId};
use crate::player::{LeaderboardEntry, PlayerState, PlayerSummary};
use crate::protocol::{
    FinalStandings, GameStateView, RoomSummary, RoundEnded, RoundResult, RoundStart, RoundSummary,
    ServerMessage,
};
use crate::rules::{rules_for, GameRules, TurnOutcome};
use crate::settings::{Settings, SettingsPatch, TurnOrder};
use crate::timer::{TimerKind, TimerSlot};
use crate::words::{normalize_word, WordSource};

pub type SharedRoom = Arc<RwLock<Room>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Active,
    Finished,
}

/// Result of removing a player.
#[derive(Debug)]
pub struct Departure {
    pub player: PlayerState,
    pub creator_changed: bool,
    /// No players left; the room has been shut down and must be dropped from the registry.
    pub empty: bool,
    /// Broadcasts caused by the departure itself (a round or the game ending).
    pub follow_up: Vec<ServerMessage>,
}

#[derive(Debug)]
pub struct Room {
    id: RoomId,
    status: RoomStatus,
    creator_id: Option<PlayerId>,
    /// Insertion order is join order
    players: Vec<PlayerState>,
    settings: Settings,
    rules: Box<dyn GameRules>,
    turn_order: Vec<PlayerId>,
    /// Index into `turn_order` of the last player to get a turn
    turn_cursor: Option<usize>,
    current_turn: Option<PlayerId>,
    turn_deadline: Option<Instant>,
    round: u32,
    current_prompt: Option<String>,
    used_prompts: HashSet<String>,
    guessed_words: HashSet<String>,
    words: Arc<WordSource>,
    timings: Timings,
    timer: TimerSlot,
    handle: Weak<RwLock<Room>>,
    closed: bool,
}

impl Room {
    pub fn create(
        id: RoomId,
        settings: Settings,
        words: Arc<WordSource>,
        timings: Timings,
    ) -> SharedRoom {
        Arc::new_cyclic(|handle| {
            RwLock::new(Room {
                id,
                status: RoomStatus::Waiting,
                creator_id: None,
                players: Vec::new(),
                rules: rules_for(&settings),
                settings,
                turn_order: Vec::new(),
                turn_cursor: None,
                current_turn: None,
                turn_deadline: None,
                round: 0,
                current_prompt: None,
                used_prompts: HashSet::new(),
                guessed_words: HashSet::new(),
                words,
                timings,
                timer: TimerSlot::default(),
                handle: handle.clone(),
                closed: false,
            })
        })
    }

    // =========================================================================
    // Membership
    // =========================================================================

    pub fn add_player(&mut self, mut player: PlayerState) -> Result<(), GameError> {
        if self.closed {
            return Err(GameError::RoomNotFound);
        }
        if self.player(&player.id).is_some() {
            return Err(GameError::AlreadyInRoom);
        }
        if self.status != RoomStatus::Waiting {
            return Err(GameError::GameInProgress);
        }
        if self.players.len() >= self.settings.max_players {
            return Err(GameError::RoomFull);
        }

        player.reset_round_state(self.rules.baseline_lives());
        if self.creator_id.is_none() {
            self.creator_id = Some(player.id.clone());
        }
        debug!("Room {}: {} ({}) joined", self.id, player.name, player.id);
        self.players.push(player);
        Ok(())
    }

    pub fn remove_player(&mut self, id: &str) -> Result<Departure, GameError> {
        let index = self
            .players
            .iter()
            .position(|p| p.id == id)
            .ok_or(GameError::NotInRoom)?;
        let player = self.players.remove(index);

        if let Some(pos) = self.turn_order.iter().position(|p| p == id) {
            self.turn_order.remove(pos);
            // Keep the cursor pointing at whoever played before the next player
            self.turn_cursor = match self.turn_cursor {
                Some(c) if pos < c => Some(c - 1),
                Some(c) if pos == c => c.checked_sub(1),
                other => other,
            };
        }

        let creator_changed = self.creator_id.as_deref() == Some(id);
        if creator_changed {
            self.creator_id = self.players.first().map(|p| p.id.clone());
            if let Some(creator) = &self.creator_id {
                info!("Room {}: creator role passed to {}", self.id, creator);
            }
        }

        if self.players.is_empty() {
            self.shutdown();
            return Ok(Departure {
                player,
                creator_changed,
                empty: true,
                follow_up: Vec::new(),
            });
        }

        let mut follow_up = Vec::new();
        if self.status == RoomStatus::Active {
            if self.current_turn.as_deref() == Some(id) {
                follow_up = self.end_round(TurnOutcome::Abandoned).into_messages();
            } else if self.eligible_count() <= 1 {
                follow_up.push(ServerMessage::GameFinished(self.end_game()));
            }
        }

        Ok(Departure {
            player,
            creator_changed,
            empty: false,
            follow_up,
        })
    }

    // =========================================================================
    // Lobby
    // =========================================================================

    pub fn update_settings(
        &mut self,
        by: &str,
        patch: &SettingsPatch,
    ) -> Result<&Settings, GameError> {
        self.require_creator(by, "change settings")?;
        if self.status != RoomStatus::Waiting {
            return Err(GameError::SettingsLocked);
        }

        self.settings.apply(patch);
        self.rules = rules_for(&self.settings);
        let lives = self.rules.baseline_lives();
        for player in &mut self.players {
            player.reset_round_state(lives);
        }
        Ok(&self.settings)
    }

    pub fn start_game(&mut self, by: &str) -> Result<RoundStart, GameError> {
        self.require_creator(by, "start the game")?;
        if self.status != RoomStatus::Waiting {
            return Err(GameError::AlreadyStarted);
        }
        if self.players.len() < MIN_PLAYERS_TO_START {
            return Err(GameError::NotEnoughPlayers);
        }

        self.rules = rules_for(&self.settings);
        let lives = self.rules.baseline_lives();
        for player in &mut self.players {
            player.reset_round_state(lives);
        }

        self.turn_order = self.players.iter().map(|p| p.id.clone()).collect();
        if self.settings.turn_order == TurnOrder::Shuffle {
            self.turn_order.shuffle(&mut rand::thread_rng());
        }
        self.turn_cursor = None;
        self.round = 0;
        self.status = RoomStatus::Active;
        info!(
            "Room {}: game started with {} players ({:?} mode)",
            self.id,
            self.players.len(),
            self.rules.mode()
        );

        // Every player starts with baseline eligibility, so a first turn exists
        self.start_new_round().ok_or(GameError::NotEnoughPlayers)
    }

    // =========================================================================
    // Rounds
    // =========================================================================

    /// Hand the turn to the next eligible player and arm the turn timer.
    /// Returns `None` if nobody is eligible.
    pub fn start_new_round(&mut self) -> Option<RoundStart> {
        self.timer.cancel();
        let next = self.next_eligible()?;
        let player_id = self.turn_order[next].clone();
        let player_name = self.player(&player_id)?.name.clone();

        let (criteria, difficulty) = {
            let prompt = self.words.pick_prompt(
                &self.used_prompts,
                self.settings.difficulty,
                &mut rand::thread_rng(),
            );
            (prompt.criteria.clone(), prompt.difficulty)
        };
        self.used_prompts.insert(criteria.clone());
        self.current_prompt = Some(criteria.clone());

        for player in &mut self.players {
            player.current_word.clear();
        }
        self.turn_cursor = Some(next);
        self.current_turn = Some(player_id.clone());
        self.round += 1;

        let limit = self.settings.turn_time_limit();
        self.turn_deadline = Some(Instant::now() + limit);
        self.arm_timer(TimerKind::TurnExpiry, limit);

        debug!(
            "Room {}: round {} for {} with prompt {:?}",
            self.id, self.round, player_id, criteria
        );

        Some(RoundStart {
            round: self.round,
            max_rounds: self.settings.max_rounds,
            prompt: criteria,
            difficulty,
            current_turn: player_id,
            player_name,
            time_limit: self.settings.turn_time_limit_ms,
        })
    }

    pub fn submit_word(&mut self, by: &str, word: &str) -> Result<RoundSummary, GameError> {
        let word = normalize_word(word);
        if word.is_empty() {
            return Err(GameError::Validation("valid word required".to_string()));
        }
        if self.player(by).is_none() {
            return Err(GameError::NotInRoom);
        }
        if self.status != RoomStatus::Active {
            return Err(GameError::GameNotActive);
        }
        let Some(turn) = self.current_turn.as_deref() else {
            return Err(GameError::RoundOver);
        };
        if turn != by {
            return Err(GameError::NotYourTurn);
        }
        if self.guessed_words.contains(&word) {
            return Err(GameError::InvalidWord("word already used"));
        }
        let fits = self
            .current_prompt
            .as_deref()
            .is_some_and(|criteria| self.words.accepts(criteria, &word));
        if !fits {
            return Err(GameError::InvalidWord("word does not fit the prompt"));
        }

        self.guessed_words.insert(word.clone());
        Ok(self.end_round(TurnOutcome::Submitted { word }))
    }

    /// Live preview of the turn player's text. Anything else is ignored.
    pub fn update_word(&mut self, by: &str, word: &str) -> Option<ServerMessage> {
        if self.status != RoomStatus::Active || self.current_turn.as_deref() != Some(by) {
            return None;
        }
        let player = self.players.iter_mut().find(|p| p.id == by)?;
        player.set_live_word(word);
        Some(ServerMessage::WordUpdate {
            player_id: player.id.clone(),
            word: player.current_word.clone(),
        })
    }

    /// Close the current turn, score it, and either schedule the next round
    /// or finish the game.
    pub fn end_round(&mut self, outcome: TurnOutcome) -> RoundSummary {
        self.timer.cancel();
        self.turn_deadline = None;

        let mut results = Vec::new();
        if let Some(turn) = self.current_turn.take() {
            if let Some(player) = self.players.iter_mut().find(|p| p.id == turn) {
                let change = self.rules.apply(player, &outcome);
                player.current_word.clear();
                results.push(RoundResult {
                    player_id: player.id.clone(),
                    player_name: player.name.clone(),
                    word: match &outcome {
                        TurnOutcome::Submitted { word } => Some(word.clone()),
                        _ => None,
                    },
                    is_valid: matches!(outcome, TurnOutcome::Submitted { .. }),
                    points: change.points,
                    lives_lost: change.lives_lost,
                    eliminated: !self.rules.is_eligible(player),
                });
            }
        }

        let correct_answers = self
            .current_prompt
            .as_deref()
            .map(|criteria| self.words.sample_answers(criteria, REVEALED_ANSWERS))
            .unwrap_or_default();

        let game_over =
            self.rules
                .is_over(self.eligible_count(), self.round, self.settings.max_rounds);
        let finished = if game_over {
            Some(self.end_game())
        } else {
            self.arm_timer(TimerKind::NextRound, self.timings.round_delay);
            None
        };

        RoundSummary {
            ended: RoundEnded {
                round: self.round,
                results,
                leaderboard: self.leaderboard(),
                correct_answers,
            },
            finished,
        }
    }

    pub fn end_game(&mut self) -> FinalStandings {
        self.timer.cancel();
        self.status = RoomStatus::Finished;
        self.current_turn = None;
        self.turn_deadline = None;

        let final_leaderboard = self.leaderboard();
        let winner = final_leaderboard.first().cloned();
        info!(
            "Room {}: game finished after {} rounds, winner {:?}",
            self.id,
            self.round,
            winner.as_ref().map(|w| &w.name)
        );

        self.arm_timer(TimerKind::ResetLobby, self.timings.reset_delay);
        FinalStandings {
            final_leaderboard,
            winner,
            total_rounds: self.round,
        }
    }

    /// Back to the lobby with the same members and settings.
    pub fn reset_to_lobby(&mut self) {
        self.timer.cancel();
        self.status = RoomStatus::Waiting;
        self.current_turn = None;
        self.turn_deadline = None;
        self.turn_order.clear();
        self.turn_cursor = None;
        self.round = 0;
        self.current_prompt = None;
        self.used_prompts.clear();
        self.guessed_words.clear();

        let lives = self.rules.baseline_lives();
        for player in &mut self.players {
            player.reset_round_state(lives);
        }
        info!("Room {}: reset to lobby", self.id);
    }

    /// Creator-initiated reset, from an active or finished game.
    pub fn force_reset(&mut self, by: &str) -> Result<(), GameError> {
        self.require_creator(by, "reset the game")?;
        if self.status == RoomStatus::Waiting {
            return Err(GameError::AlreadyInLobby);
        }
        self.reset_to_lobby();
        Ok(())
    }

    /// Cancel timers and sever every connection. Idempotent.
    pub fn shutdown(&mut self) {
        self.timer.cancel();
        if !self.closed {
            debug!("Room {}: shut down", self.id);
        }
        self.closed = true;
        self.current_turn = None;
        self.turn_deadline = None;
        for player in &mut self.players {
            player.unbind();
        }
    }

    // =========================================================================
    // Timers
    // =========================================================================

    fn arm_timer(&mut self, kind: TimerKind, delay: Duration) {
        self.timer.arm(self.handle.clone(), kind, delay);
    }

    /// Entry point for a fired timer task, holding the write lock.
    pub(crate) fn fire_timer(&mut self, generation: u64, kind: TimerKind) {
        if self.closed || !self.timer.claim(generation) {
            debug!("Room {}: stale {:?} timer ignored", self.id, kind);
            return;
        }
        debug!("Room {}: {:?} timer fired", self.id, kind);
        for msg in self.on_timer(kind) {
            self.broadcast(&msg);
        }
    }

    /// Apply a timer transition and return what to broadcast.
    /// A transition that no longer fits the room's state is a no-op.
    pub fn on_timer(&mut self, kind: TimerKind) -> Vec<ServerMessage> {
        match kind {
            TimerKind::TurnExpiry => {
                if self.status != RoomStatus::Active || self.current_turn.is_none() {
                    return Vec::new();
                }
                self.end_round(TurnOutcome::TimedOut).into_messages()
            }
            TimerKind::NextRound => {
                if self.status != RoomStatus::Active || self.current_turn.is_some() {
                    return Vec::new();
                }
                match self.start_new_round() {
                    Some(start) => vec![ServerMessage::RoundStarted(start)],
                    None => vec![ServerMessage::GameFinished(self.end_game())],
                }
            }
            TimerKind::ResetLobby => {
                if self.status != RoomStatus::Finished {
                    return Vec::new();
                }
                self.reset_to_lobby();
                vec![self.reset_message()]
            }
        }
    }

    pub fn pending_timer(&self) -> Option<TimerKind> {
        self.timer.kind()
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    pub fn broadcast(&self, msg: &ServerMessage) {
        let text = msg.to_json();
        for player in &self.players {
            if !player.send(&text) {
                debug!("Room {}: dropped message for {}", self.id, player.id);
            }
        }
    }

    pub fn broadcast_except(&self, except: &str, msg: &ServerMessage) {
        let text = msg.to_json();
        for player in self.players.iter().filter(|p| p.id != except) {
            player.send(&text);
        }
    }

    pub fn reset_message(&self) -> ServerMessage {
        ServerMessage::RoomReset {
            message: "Room is ready for a new game".to_string(),
            players: self.player_summaries(),
        }
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn creator_id(&self) -> Option<&str> {
        self.creator_id.as_deref()
    }

    pub fn current_turn(&self) -> Option<&str> {
        self.current_turn.as_deref()
    }

    pub fn turn_deadline(&self) -> Option<Instant> {
        self.turn_deadline
    }

    pub fn turn_order(&self) -> &[PlayerId] {
        &self.turn_order
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn guessed_words(&self) -> &HashSet<String> {
        &self.guessed_words
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn player(&self, id: &str) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.iter()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_eligible(&self, id: &str) -> bool {
        self.player(id).is_some_and(|p| self.rules.is_eligible(p))
    }

    pub fn eligible_count(&self) -> usize {
        self.players
            .iter()
            .filter(|p| self.rules.is_eligible(p))
            .count()
    }

    pub fn player_summary(&self, id: &str) -> Option<PlayerSummary> {
        self.player(id)
            .map(|p| p.summary(self.creator_id(), self.rules.is_eligible(p)))
    }

    pub fn player_summaries(&self) -> Vec<PlayerSummary> {
        self.players
            .iter()
            .map(|p| p.summary(self.creator_id(), self.rules.is_eligible(p)))
            .collect()
    }

    /// Best first; ties keep join order.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut ranked: Vec<&PlayerState> = self.players.iter().collect();
        ranked.sort_by_key(|p| Reverse(self.rules.rank_key(p)));
        ranked
            .into_iter()
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                rank: i + 1,
                id: p.id.clone(),
                name: p.name.clone(),
                lives: p.lives,
                score: p.score,
                correct_answers: p.correct_answers,
            })
            .collect()
    }

    pub fn time_remaining(&self) -> Duration {
        self.turn_deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    pub fn game_state(&self) -> GameStateView {
        GameStateView {
            room_id: self.id.clone(),
            status: self.status,
            round: self.round,
            max_rounds: self.settings.max_rounds,
            prompt: self.current_prompt.clone(),
            current_turn: self.current_turn.clone(),
            time_remaining: self.time_remaining().as_millis() as u64,
            settings: self.settings.clone(),
            players: self.player_summaries(),
            leaderboard: self.leaderboard(),
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            player_count: self.players.len(),
            max_players: self.settings.max_players,
            status: self.status,
            mode: self.settings.mode,
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn require_creator(&self, by: &str, action: &'static str) -> Result<(), GameError> {
        if self.player(by).is_none() {
            return Err(GameError::NotInRoom);
        }
        if self.creator_id.as_deref() != Some(by) {
            return Err(GameError::NotCreator(action));
        }
        Ok(())
    }

    /// Next eligible index after the cursor, giving up after one full lap.
    fn next_eligible(&self) -> Option<usize> {
        let len = self.turn_order.len();
        let start = self.turn_cursor.map_or(0, |c| c + 1);
        (0..len)
            .map(|step| (start + step) % len)
            .find(|&i| self.is_eligible(&self.turn_order[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GameMode;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use warp::ws::Message;

    fn words() -> Arc<WordSource> {
        Arc::new(
            WordSource::from_entries([
                ("a fruit", vec!["apple", "banana", "cherry"]),
                ("a colour", vec!["red", "green", "apple"]),
            ])
            .unwrap(),
        )
    }

    fn timings() -> Timings {
        Timings {
            round_delay: Duration::from_millis(100),
            reset_delay: Duration::from_millis(500),
        }
    }

    fn new_room(settings: Settings) -> SharedRoom {
        Room::create("BCDFGJ".to_string(), settings, words(), timings())
    }

    fn player(id: &str) -> (PlayerState, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PlayerState::new(id.to_string(), Some(id), tx), rx)
    }

    fn join(room: &mut Room, id: &str) -> UnboundedReceiver<Message> {
        let (p, rx) = player(id);
        room.add_player(p).unwrap();
        rx
    }

    fn types(rx: &mut UnboundedReceiver<Message>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            let json: serde_json::Value = serde_json::from_str(msg.to_str().unwrap()).unwrap();
            out.push(json["type"].as_str().unwrap().to_string());
        }
        out
    }

    /// Submit whatever word fits the current prompt and has not been used.
    fn fitting_word(room: &Room) -> String {
        let criteria = room.game_state().prompt.unwrap();
        let prompt = room.words.prompt(&criteria).unwrap();
        prompt
            .answers
            .iter()
            .find(|w| !room.guessed_words().contains(*w))
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn test_add_player_rules() {
        let room = new_room(Settings {
            max_players: 2,
            ..Settings::default()
        });
        let mut room = room.write().await;

        let _a = join(&mut room, "a");
        assert_eq!(room.creator_id(), Some("a"));

        let (dup, _rx) = player("a");
        assert_eq!(room.add_player(dup), Err(GameError::AlreadyInRoom));
        assert_eq!(room.player_count(), 1);

        let _b = join(&mut room, "b");
        let (c, _rx) = player("c");
        assert_eq!(room.add_player(c), Err(GameError::RoomFull));
        assert_eq!(room.player_count(), 2);
        assert_eq!(room.creator_id(), Some("a"));
    }

    #[tokio::test]
    async fn test_join_rejected_while_active() {
        let room = new_room(Settings::default());
        let mut room = room.write().await;
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        room.start_game("a").unwrap();

        let (c, _rx) = player("c");
        assert_eq!(room.add_player(c), Err(GameError::GameInProgress));
        assert_eq!(room.player_count(), 2);
    }

    #[tokio::test]
    async fn test_remove_player_reassigns_creator_in_join_order() {
        let room = new_room(Settings::default());
        let mut room = room.write().await;
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        let _c = join(&mut room, "c");

        assert!(matches!(room.remove_player("zzz"), Err(GameError::NotInRoom)));

        let departure = room.remove_player("a").unwrap();
        assert!(departure.creator_changed);
        assert!(!departure.empty);
        assert_eq!(room.creator_id(), Some("b"));
        assert_eq!(room.player_count(), 2);

        let departure = room.remove_player("c").unwrap();
        assert!(!departure.creator_changed);
        assert_eq!(room.creator_id(), Some("b"));

        let departure = room.remove_player("b").unwrap();
        assert!(departure.empty);
        assert!(room.is_closed());
        assert_eq!(room.creator_id(), None);
    }

    #[tokio::test]
    async fn test_start_requires_creator_and_two_players() {
        let room = new_room(Settings::default());
        let mut room = room.write().await;
        let _a = join(&mut room, "a");

        assert_eq!(room.start_game("a"), Err(GameError::NotEnoughPlayers));
        assert_eq!(room.status(), RoomStatus::Waiting);

        let _b = join(&mut room, "b");
        assert_eq!(
            room.start_game("b"),
            Err(GameError::NotCreator("start the game"))
        );
        assert_eq!(room.status(), RoomStatus::Waiting);

        let first = room.start_game("a").unwrap();
        assert_eq!(room.status(), RoomStatus::Active);
        assert_eq!(first.round, 1);
        assert_eq!(first.current_turn, "a");
        assert_eq!(room.current_turn(), Some("a"));
        assert_eq!(room.pending_timer(), Some(TimerKind::TurnExpiry));
        assert!(room.turn_deadline().is_some());

        assert_eq!(room.start_game("a"), Err(GameError::AlreadyStarted));
    }

    #[tokio::test]
    async fn test_shuffled_turn_order_keeps_members() {
        let room = new_room(Settings {
            turn_order: TurnOrder::Shuffle,
            ..Settings::default()
        });
        let mut room = room.write().await;
        let _rx: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| join(&mut room, id))
            .collect();
        room.start_game("a").unwrap();

        let mut order = room.turn_order().to_vec();
        order.sort();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
        assert_eq!(room.current_turn(), Some(room.turn_order()[0].as_str()));
    }

    #[tokio::test]
    async fn test_settings_only_by_creator_in_lobby() {
        let room = new_room(Settings::default());
        let mut room = room.write().await;
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");

        let patch: SettingsPatch =
            serde_json::from_str(r#"{"maxPlayers": 4, "turnTimeLimit": 5}"#).unwrap();
        assert_eq!(
            room.update_settings("b", &patch),
            Err(GameError::NotCreator("change settings"))
        );
        assert_eq!(room.settings().max_players, 8);

        let settings = room.update_settings("a", &patch).unwrap();
        assert_eq!(settings.max_players, 4);
        assert_eq!(settings.turn_time_limit_ms, 30_000);

        room.start_game("a").unwrap();
        assert_eq!(
            room.update_settings("a", &patch),
            Err(GameError::SettingsLocked)
        );
    }

    #[tokio::test]
    async fn test_submit_word_rules() {
        let room = new_room(Settings::default());
        let mut room = room.write().await;
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");

        assert_eq!(room.submit_word("a", "apple"), Err(GameError::GameNotActive));
        room.start_game("a").unwrap();

        let before = room.leaderboard();
        assert_eq!(room.submit_word("b", "apple"), Err(GameError::NotYourTurn));
        assert_eq!(room.submit_word("zzz", "apple"), Err(GameError::NotInRoom));
        assert_eq!(
            room.submit_word("a", "pineapple"),
            Err(GameError::InvalidWord("word does not fit the prompt"))
        );
        assert!(matches!(
            room.submit_word("a", "   "),
            Err(GameError::Validation(_))
        ));
        assert!(room.guessed_words().is_empty());
        assert_eq!(room.leaderboard(), before);
        assert_eq!(room.current_turn(), Some("a"));

        let word = fitting_word(&room);
        let summary = room.submit_word("a", &word.to_uppercase()).unwrap();
        assert!(summary.finished.is_none());
        let result = &summary.ended.results[0];
        assert_eq!(result.player_id, "a");
        assert!(result.is_valid);
        assert_eq!(result.points, 1);
        assert_eq!(result.word.as_deref(), Some(word.as_str()));
        assert!(room.guessed_words().contains(&word));

        // Between rounds nobody holds the turn
        assert_eq!(room.current_turn(), None);
        assert_eq!(room.pending_timer(), Some(TimerKind::NextRound));
        assert_eq!(room.submit_word("a", &word), Err(GameError::RoundOver));
    }

    #[tokio::test(start_paused = true)]
    async fn test_word_cannot_repeat_across_players() {
        let room = new_room(Settings::default());
        {
            let mut room = room.write().await;
            let _a = join(&mut room, "a");
            let _b = join(&mut room, "b");
            room.start_game("a").unwrap();
            // "apple" fits both prompts
            room.submit_word("a", "apple").unwrap();
        }

        tokio::time::sleep(Duration::from_millis(150)).await;

        let mut room = room.write().await;
        assert_eq!(room.current_turn(), Some("b"));
        assert_eq!(
            room.submit_word("b", " Apple "),
            Err(GameError::InvalidWord("word already used"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_costs_one_life_and_advances() {
        let room = new_room(Settings {
            turn_time_limit_ms: 1_000,
            ..Settings::default()
        });
        let mut rx_a = {
            let mut room = room.write().await;
            let rx_a = join(&mut room, "a");
            let _b = join(&mut room, "b");
            room.start_game("a").unwrap();
            rx_a
        };

        tokio::time::sleep(Duration::from_millis(1_050)).await;
        {
            let room = room.read().await;
            assert_eq!(room.player("a").unwrap().lives, 2);
            assert_eq!(room.player("b").unwrap().lives, 3);
            assert_eq!(room.current_turn(), None);
            assert_eq!(room.pending_timer(), Some(TimerKind::NextRound));
        }
        assert_eq!(types(&mut rx_a), vec!["round_ended"]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let room = room.read().await;
        assert_eq!(room.current_turn(), Some("b"));
        assert_eq!(room.round(), 2);
        assert_eq!(room.player("a").unwrap().lives, 2);
        assert_eq!(types(&mut rx_a), vec!["round_started"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elimination_finishes_game_once() {
        let room = new_room(Settings {
            turn_time_limit_ms: 1_000,
            lives: 2,
            ..Settings::default()
        });
        let mut rx_a = {
            let mut room = room.write().await;
            let rx_a = join(&mut room, "a");
            let _b = join(&mut room, "b");
            room.start_game("a").unwrap();
            rx_a
        };

        // a, b, a time out; a is then out of lives
        tokio::time::sleep(Duration::from_millis(3 * 1_000 + 2 * 100 + 50)).await;
        {
            let room = room.read().await;
            assert_eq!(room.status(), RoomStatus::Finished);
            assert_eq!(room.round(), 3);
            assert_eq!(room.eligible_count(), 1);
            assert_eq!(room.current_turn(), None);
            assert_eq!(room.pending_timer(), Some(TimerKind::ResetLobby));
            assert_eq!(room.leaderboard()[0].id, "b");
        }
        let seen = types(&mut rx_a);
        assert_eq!(seen.iter().filter(|t| *t == "round_ended").count(), 3);
        assert_eq!(seen.iter().filter(|t| *t == "game_finished").count(), 1);
        assert_eq!(seen.last().map(String::as_str), Some("game_finished"));

        // Reset timer brings everyone back with full lives
        tokio::time::sleep(Duration::from_millis(500)).await;
        let room = room.read().await;
        assert_eq!(room.status(), RoomStatus::Waiting);
        assert_eq!(room.player("a").unwrap().lives, 2);
        assert!(room.guessed_words().is_empty());
        assert_eq!(types(&mut rx_a), vec!["room_reset"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_score_mode_ends_at_round_cap() {
        let room = new_room(Settings {
            mode: GameMode::Score,
            max_rounds: 2,
            ..Settings::default()
        });
        {
            let mut room = room.write().await;
            let _a = join(&mut room, "a");
            let _b = join(&mut room, "b");
            room.start_game("a").unwrap();
            let word = fitting_word(&room);
            assert!(room.submit_word("a", &word).unwrap().finished.is_none());
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        let mut room = room.write().await;
        assert_eq!(room.current_turn(), Some("b"));
        let summary = room.end_round(TurnOutcome::TimedOut);
        let standings = summary.finished.unwrap();
        assert_eq!(standings.total_rounds, 2);
        assert_eq!(standings.winner.unwrap().id, "a");
        // Nobody loses lives in score mode
        assert!(room.players().all(|p| room.is_eligible(&p.id)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ineligible_players_are_skipped() {
        let room = new_room(Settings {
            lives: 1,
            ..Settings::default()
        });
        let mut room = room.write().await;
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        let _c = join(&mut room, "c");
        room.start_game("a").unwrap();

        // a times out and is eliminated; b then c, never a again
        room.end_round(TurnOutcome::TimedOut);
        assert!(!room.is_eligible("a"));
        assert_eq!(room.start_new_round().unwrap().current_turn, "b");
        let word = fitting_word(&room);
        room.submit_word("b", &word).unwrap();
        assert_eq!(room.start_new_round().unwrap().current_turn, "c");
        let word = fitting_word(&room);
        room.submit_word("c", &word).unwrap();
        assert_eq!(room.start_new_round().unwrap().current_turn, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_player_leaving_ends_round_without_penalty() {
        let room = new_room(Settings::default());
        let mut room = room.write().await;
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        let _c = join(&mut room, "c");
        room.start_game("a").unwrap();

        let departure = room.remove_player("a").unwrap();
        assert!(departure.creator_changed);
        assert_eq!(departure.follow_up.len(), 1);
        assert!(matches!(
            &departure.follow_up[0],
            ServerMessage::RoundEnded(ended) if ended.results.is_empty()
        ));
        assert_eq!(room.status(), RoomStatus::Active);
        assert_eq!(room.pending_timer(), Some(TimerKind::NextRound));

        // The player after a takes the next turn
        assert_eq!(room.start_new_round().unwrap().current_turn, "b");
    }

    #[tokio::test]
    async fn test_leaving_to_one_player_finishes_game() {
        let room = new_room(Settings::default());
        let mut room = room.write().await;
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        room.start_game("a").unwrap();

        let departure = room.remove_player("b").unwrap();
        assert!(matches!(
            departure.follow_up.as_slice(),
            [ServerMessage::GameFinished(_)]
        ));
        assert_eq!(room.status(), RoomStatus::Finished);
    }

    #[tokio::test]
    async fn test_force_reset() {
        let room = new_room(Settings::default());
        let mut room = room.write().await;
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");

        assert_eq!(room.force_reset("a"), Err(GameError::AlreadyInLobby));
        room.start_game("a").unwrap();
        assert_eq!(
            room.force_reset("b"),
            Err(GameError::NotCreator("reset the game"))
        );
        assert_eq!(room.status(), RoomStatus::Active);

        room.force_reset("a").unwrap();
        assert_eq!(room.status(), RoomStatus::Waiting);
        assert_eq!(room.current_turn(), None);
        assert_eq!(room.round(), 0);
        assert!(!room.timer.is_armed());
        assert_eq!(room.player_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_after_submission_is_noop() {
        let room = new_room(Settings {
            turn_time_limit_ms: 1_000,
            ..Settings::default()
        });
        {
            let mut room = room.write().await;
            let _a = join(&mut room, "a");
            let _b = join(&mut room, "b");
            room.start_game("a").unwrap();
            // A submission that lands just before the deadline wins the race
            let word = fitting_word(&room);
            room.submit_word("a", &word).unwrap();
            // Old turn generation can no longer fire
            room.fire_timer(1, TimerKind::TurnExpiry);
            assert_eq!(room.player("a").unwrap().lives, 3);
            assert_eq!(room.pending_timer(), Some(TimerKind::NextRound));
        }
        tokio::time::sleep(Duration::from_millis(1_050)).await;
        let room = room.read().await;
        assert_eq!(room.player("a").unwrap().lives, 3);
        assert_eq!(room.round(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_timers_idempotently() {
        let room = new_room(Settings::default());
        {
            let mut room = room.write().await;
            let _a = join(&mut room, "a");
            let _b = join(&mut room, "b");
            room.start_game("a").unwrap();
            let word = fitting_word(&room);
            room.submit_word("a", &word).unwrap();
            room.shutdown();
            room.shutdown();
            assert!(room.is_closed());
            assert_eq!(room.pending_timer(), None);
        }
        tokio::time::sleep(Duration::from_secs(60)).await;
        let room = room.read().await;
        assert_eq!(room.round(), 1);
        assert_eq!(room.current_turn(), None);
    }

    #[tokio::test]
    async fn test_word_update_only_from_turn_player() {
        let room = new_room(Settings::default());
        let mut room = room.write().await;
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        assert!(room.update_word("a", "ap").is_none());

        room.start_game("a").unwrap();
        assert!(room.update_word("b", "ap").is_none());
        match room.update_word("a", "ap") {
            Some(ServerMessage::WordUpdate { player_id, word }) => {
                assert_eq!(player_id, "a");
                assert_eq!(word, "ap");
            }
            other => panic!("Expected WordUpdate, got {other:?}"),
        }
        assert_eq!(room.player("a").unwrap().current_word, "ap");
    }

    #[tokio::test]
    async fn test_leaderboard_ties_keep_join_order() {
        let room = new_room(Settings::default());
        let mut room = room.write().await;
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        let _c = join(&mut room, "c");
        room.start_game("a").unwrap();
        room.end_round(TurnOutcome::TimedOut);

        let ids: Vec<_> = room.leaderboard().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
