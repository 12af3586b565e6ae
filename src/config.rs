//! Command line options and gameplay constants

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// IPv4 address or path to the Unix socket the server will be listening on
    pub addr: String,

    /// Listening port
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Enable https
    #[arg(long)]
    pub https: bool,

    /// Path to https certificate
    #[arg(short, long, default_value = "cert.pem")]
    pub cert: String,

    /// Path to https private key
    #[arg(short, long, default_value = "key.rsa")]
    pub key: String,

    /// Use Unix socket instead of IP
    #[arg(short, long)]
    pub usock: bool,

    /// JSON file mapping each prompt to its accepted answers
    #[arg(short, long, default_value = "data/criteria.json")]
    pub words: PathBuf,

    /// Directory served as static frontend files
    #[arg(long, default_value = "public")]
    pub static_dir: PathBuf,

    /// Pause between the end of a round and the start of the next one
    #[arg(long, default_value_t = 5000)]
    pub round_delay_ms: u64,

    /// How long final results stay up before the room returns to the lobby
    #[arg(long, default_value_t = 10000)]
    pub reset_delay_ms: u64,

    /// WebSocket keepalive ping interval
    #[arg(long, default_value_t = 5)]
    pub ping_secs: u64,
}

impl Cli {
    pub fn timings(&self) -> Timings {
        Timings {
            round_delay: Duration::from_millis(self.round_delay_ms),
            reset_delay: Duration::from_millis(self.reset_delay_ms),
        }
    }

    /// At least one second; tokio intervals reject a zero period.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_secs.max(1))
    }
}

/// Fixed delays between game phases, shared by every room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub round_delay: Duration,
    pub reset_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            round_delay: Duration::from_millis(5000),
            reset_delay: Duration::from_millis(10000),
        }
    }
}

// =============================================================================
// Settings ranges
// =============================================================================

pub const MAX_PLAYERS_RANGE: (i64, i64) = (1, 20);
pub const TURN_TIME_LIMIT_MS_RANGE: (i64, i64) = (1_000, 120_000);
pub const MAX_ROUNDS_RANGE: (i64, i64) = (1, 50);
pub const LIVES_RANGE: (i64, i64) = (1, 10);

pub const DEFAULT_MAX_PLAYERS: usize = 8;
pub const DEFAULT_TURN_TIME_LIMIT_MS: u64 = 30_000;
pub const DEFAULT_MAX_ROUNDS: u32 = 10;
pub const DEFAULT_LIVES: u32 = 3;

/// Hard floor for starting a game, not configurable.
pub const MIN_PLAYERS_TO_START: usize = 2;

// =============================================================================
// Identifiers and text limits
// =============================================================================

/// Room code alphabet, without characters that are easy to misread
pub const ROOM_CODE_ALPHABET: &[u8] = b"BCDFGJMPQRSTYZ235789";
pub const ROOM_CODE_LEN: usize = 6;

pub const PLAYER_ID_PREFIX: &str = "player_";
pub const PLAYER_ID_LEN: usize = 9;

pub const MAX_NAME_LEN: usize = 24;
pub const MAX_LIVE_WORD_LEN: usize = 64;

/// Number of accepted answers revealed when a round ends
pub const REVEALED_ANSWERS: usize = 5;
