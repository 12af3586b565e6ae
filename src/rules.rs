//! Scoring and elimination policies
//!
//! The room state machine is the same for every variant; what differs is who
//! may still take turns, what a turn outcome does to the player, and when the
//! game is over.

use std::fmt::Debug;

use crate::player::PlayerState;
use crate::settings::{GameMode, Settings};

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn player submitted an accepted word.
    Submitted { word: String },
    /// The deadline passed without an accepted word.
    TimedOut,
    /// The turn player left the room mid-turn.
    Abandoned,
}

/// Effect of one outcome on the turn player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnChange {
    pub points: u32,
    pub lives_lost: u32,
}

pub trait GameRules: Send + Sync + Debug {
    fn mode(&self) -> GameMode;

    /// Lives every player starts a game with.
    fn baseline_lives(&self) -> u32;

    fn is_eligible(&self, player: &PlayerState) -> bool;

    fn apply(&self, player: &mut PlayerState, outcome: &TurnOutcome) -> TurnChange;

    fn is_over(&self, eligible: usize, rounds_played: u32, max_rounds: u32) -> bool {
        eligible <= 1 || rounds_played >= max_rounds
    }

    /// Leaderboard key, higher is better.
    fn rank_key(&self, player: &PlayerState) -> (u32, u32);
}

pub fn rules_for(settings: &Settings) -> Box<dyn GameRules> {
    match settings.mode {
        GameMode::Lives => Box::new(Elimination {
            lives: settings.lives,
        }),
        GameMode::Score => Box::new(CumulativeScore),
    }
}

/// Timeouts cost a life; a player with no lives left sits out.
#[derive(Debug, Clone, Copy)]
pub struct Elimination {
    pub lives: u32,
}

impl GameRules for Elimination {
    fn mode(&self) -> GameMode {
        GameMode::Lives
    }

    fn baseline_lives(&self) -> u32 {
        self.lives
    }

    fn is_eligible(&self, player: &PlayerState) -> bool {
        player.lives > 0
    }

    fn apply(&self, player: &mut PlayerState, outcome: &TurnOutcome) -> TurnChange {
        match outcome {
            TurnOutcome::Submitted { .. } => {
                player.score += 1;
                player.correct_answers += 1;
                TurnChange {
                    points: 1,
                    lives_lost: 0,
                }
            }
            TurnOutcome::TimedOut => {
                let lost = player.lives.min(1);
                player.lives -= lost;
                TurnChange {
                    points: 0,
                    lives_lost: lost,
                }
            }
            TurnOutcome::Abandoned => TurnChange::default(),
        }
    }

    fn rank_key(&self, player: &PlayerState) -> (u32, u32) {
        (player.lives, player.score)
    }
}

/// Nobody is eliminated; each accepted word is worth a point.
#[derive(Debug, Clone, Copy)]
pub struct CumulativeScore;

impl GameRules for CumulativeScore {
    fn mode(&self) -> GameMode {
        GameMode::Score
    }

    fn baseline_lives(&self) -> u32 {
        0
    }

    fn is_eligible(&self, _player: &PlayerState) -> bool {
        true
    }

    fn apply(&self, player: &mut PlayerState, outcome: &TurnOutcome) -> TurnChange {
        match outcome {
            TurnOutcome::Submitted { .. } => {
                player.score += 1;
                player.correct_answers += 1;
                TurnChange {
                    points: 1,
                    lives_lost: 0,
                }
            }
            TurnOutcome::TimedOut | TurnOutcome::Abandoned => TurnChange::default(),
        }
    }

    fn rank_key(&self, player: &PlayerState) -> (u32, u32) {
        (player.score, 0)
    }
}
