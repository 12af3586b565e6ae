use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::GameError;
use crate::ids::{PlayerId, RoomId};

pub type ConnectionId = Uuid;

/// Which room and player a connection is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub player_id: PlayerId,
    pub room_id: RoomId,
    pub player_name: String,
}

/// Connection to player binding. A connection is in at most one room.
#[derive(Debug, Default)]
pub struct SessionMap {
    entries: RwLock<HashMap<ConnectionId, SessionEntry>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, conn: ConnectionId, entry: SessionEntry) -> Result<(), GameError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&conn) {
            return Err(GameError::AlreadyConnected);
        }
        entries.insert(conn, entry);
        Ok(())
    }

    pub async fn get(&self, conn: &ConnectionId) -> Option<SessionEntry> {
        self.entries.read().await.get(conn).cloned()
    }

    pub async fn remove(&self, conn: &ConnectionId) -> Option<SessionEntry> {
        self.entries.write().await.remove(conn)
    }

    pub async fn contains(&self, conn: &ConnectionId) -> bool {
        self.entries.read().await.contains_key(conn)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
