//! Room-based multiplayer word game server.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod player;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod rules;
pub mod server;
pub mod session;
pub mod settings;
pub mod timer;
pub mod words;
