use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::Timings;
use crate::error::GameError;
use crate::ids::{generate_room_code, RoomId};
use crate::player::PlayerState;
use crate::protocol::RoomSummary;
use crate::room::{Room, SharedRoom};
use crate::settings::Settings;
use crate::words::WordSource;

/// All live rooms, keyed by room code.
///
/// The map lock is never held while waiting on a room lock, except in
/// [`Registry::create`] where the room is brand new and nobody else can see it.
#[derive(Debug)]
pub struct Registry {
    rooms: RwLock<HashMap<RoomId, SharedRoom>>,
    words: Arc<WordSource>,
    timings: Timings,
}

impl Registry {
    pub fn new(words: Arc<WordSource>, timings: Timings) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            words,
            timings,
        }
    }

    /// Create a room under a fresh code with `creator` as its first member.
    pub async fn create(
        &self,
        settings: Settings,
        creator: PlayerState,
    ) -> Result<SharedRoom, GameError> {
        let mut rooms = self.rooms.write().await;
        let id = loop {
            let code = generate_room_code(&mut rand::thread_rng());
            if !rooms.contains_key(&code) {
                break code;
            }
        };

        let room = Room::create(id.clone(), settings, self.words.clone(), self.timings);
        room.write().await.add_player(creator)?;
        rooms.insert(id.clone(), room.clone());
        info!("Room {} created ({} rooms live)", id, rooms.len());
        Ok(room)
    }

    pub async fn get(&self, id: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(id).cloned()
    }

    /// Public rooms, in no particular order.
    pub async fn list_public(&self) -> Vec<RoomSummary> {
        let rooms: Vec<SharedRoom> = self.rooms.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(rooms.len());
        for room in rooms {
            let room = room.read().await;
            if room.is_closed() || room.settings().private {
                continue;
            }
            out.push(room.summary());
        }
        out
    }

    /// Remove a room and shut it down. Returns false if it was already gone.
    pub async fn destroy(&self, id: &str) -> bool {
        let removed = self.rooms.write().await.remove(id);
        match removed {
            Some(room) => {
                room.write().await.shutdown();
                info!("Room {} destroyed", id);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}
