//! Routes decoded client messages to rooms
//!
//! Every failure ends up as a single `error` frame to the sender. Nothing a
//! client sends can close its connection or reach other players unless the
//! room operation succeeded.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warp::ws::Message;

use crate::error::GameError;
use crate::ids::{generate_player_id, normalize_room_code};
use crate::player::PlayerState;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::Registry;
use crate::room::{Room, SharedRoom};
use crate::session::{ConnectionId, SessionEntry, SessionMap};
use crate::settings::{Settings, SettingsPatch};

/// The sending half of one client connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    tx: UnboundedSender<Message>,
}

impl Connection {
    pub fn new(tx: UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    pub fn sender(&self) -> UnboundedSender<Message> {
        self.tx.clone()
    }

    pub fn send(&self, msg: &ServerMessage) -> bool {
        self.tx.send(Message::text(msg.to_json())).is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    sessions: Arc<SessionMap>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, sessions: Arc<SessionMap>) -> Self {
        Self { registry, sessions }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionMap> {
        &self.sessions
    }

    /// Handle one inbound text frame.
    pub async fn dispatch(&self, conn: &Connection, text: &str) {
        let msg = match ClientMessage::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Connection {}: {}", conn.id, e);
                conn.send(&ServerMessage::error(&e));
                return;
            }
        };

        let name = msg.name();
        debug!("Connection {}: {}", conn.id, name);
        if let Err(e) = self.route(conn, msg).await {
            warn!("Connection {}: {} rejected: {}", conn.id, name, e);
            conn.send(&ServerMessage::error(&e));
        }
    }

    async fn route(&self, conn: &Connection, msg: ClientMessage) -> Result<(), GameError> {
        match msg {
            ClientMessage::CreateRoom {
                player_name,
                settings,
            } => self.create_room(conn, player_name.as_deref(), &settings).await,
            ClientMessage::JoinRoom {
                room_id,
                player_name,
            } => self.join_room(conn, &room_id, player_name.as_deref()).await,
            ClientMessage::StartGame => self.start_game(conn).await,
            ClientMessage::SubmitWord { word } => self.submit_word(conn, &word).await,
            ClientMessage::WordUpdate { word } => self.word_update(conn, &word).await,
            ClientMessage::UpdateSettings { settings } => {
                self.update_settings(conn, &settings).await
            }
            ClientMessage::BackToLobby => self.back_to_lobby(conn).await,
            ClientMessage::LeaveRoom => self.leave_room(conn).await,
            ClientMessage::GetGameState => self.get_game_state(conn).await,
        }
    }

    async fn create_room(
        &self,
        conn: &Connection,
        player_name: Option<&str>,
        patch: &SettingsPatch,
    ) -> Result<(), GameError> {
        if self.sessions.contains(&conn.id).await {
            return Err(GameError::AlreadyConnected);
        }

        let player = PlayerState::new(generate_player_id(), player_name, conn.sender());
        let player_id = player.id.clone();
        let player_name = player.name.clone();
        let room = self
            .registry
            .create(Settings::from_patch(patch), player)
            .await?;

        let mut room = room.write().await;
        self.bind(conn, &mut room, player_id, player_name).await
    }

    async fn join_room(
        &self,
        conn: &Connection,
        room_id: &str,
        player_name: Option<&str>,
    ) -> Result<(), GameError> {
        if self.sessions.contains(&conn.id).await {
            return Err(GameError::AlreadyConnected);
        }
        let code = normalize_room_code(room_id);
        if code.is_empty() {
            return Err(GameError::Validation("room code required".to_string()));
        }
        let room = self
            .registry
            .get(&code)
            .await
            .ok_or(GameError::RoomNotFound)?;

        let player = PlayerState::new(generate_player_id(), player_name, conn.sender());
        let player_id = player.id.clone();
        let player_name = player.name.clone();

        let mut room = room.write().await;
        room.add_player(player)?;
        self.bind(conn, &mut room, player_id, player_name).await
    }

    /// Record the session for a player just added to `room`, confirm to the
    /// sender and announce to everybody else.
    async fn bind(
        &self,
        conn: &Connection,
        room: &mut Room,
        player_id: String,
        player_name: String,
    ) -> Result<(), GameError> {
        let entry = SessionEntry {
            player_id: player_id.clone(),
            room_id: room.id().to_string(),
            player_name,
        };
        if let Err(e) = self.sessions.insert(conn.id, entry).await {
            let _ = room.remove_player(&player_id);
            return Err(e);
        }

        info!("Connection {} is {} in room {}", conn.id, player_id, room.id());
        conn.send(&ServerMessage::RoomJoined {
            room_id: room.id().to_string(),
            player_id: player_id.clone(),
            is_creator: room.creator_id() == Some(player_id.as_str()),
            players: room.player_summaries(),
            settings: room.settings().clone(),
        });
        if let Some(player) = room.player_summary(&player_id) {
            room.broadcast_except(
                &player_id,
                &ServerMessage::PlayerJoined {
                    player,
                    players: room.player_summaries(),
                },
            );
        }
        Ok(())
    }

    /// The session and live room behind a connection.
    async fn session_room(
        &self,
        conn: &Connection,
    ) -> Result<(SessionEntry, SharedRoom), GameError> {
        let entry = self
            .sessions
            .get(&conn.id)
            .await
            .ok_or(GameError::NotConnected)?;
        let room = self
            .registry
            .get(&entry.room_id)
            .await
            .ok_or(GameError::RoomNotFound)?;
        Ok((entry, room))
    }

    async fn start_game(&self, conn: &Connection) -> Result<(), GameError> {
        let (entry, room) = self.session_room(conn).await?;
        let mut room = room.write().await;
        ensure_open(&room)?;

        let first = room.start_game(&entry.player_id)?;
        room.broadcast(&ServerMessage::GameStarted {
            turn_order: room.turn_order().to_vec(),
            players: room.player_summaries(),
        });
        room.broadcast(&ServerMessage::RoundStarted(first));
        Ok(())
    }

    async fn submit_word(&self, conn: &Connection, word: &str) -> Result<(), GameError> {
        let (entry, room) = self.session_room(conn).await?;
        let mut room = room.write().await;
        ensure_open(&room)?;

        let summary = room.submit_word(&entry.player_id, word)?;
        for msg in summary.into_messages() {
            room.broadcast(&msg);
        }
        Ok(())
    }

    async fn word_update(&self, conn: &Connection, word: &str) -> Result<(), GameError> {
        let (entry, room) = self.session_room(conn).await?;
        let mut room = room.write().await;
        ensure_open(&room)?;

        if let Some(msg) = room.update_word(&entry.player_id, word) {
            room.broadcast_except(&entry.player_id, &msg);
        }
        Ok(())
    }

    async fn update_settings(
        &self,
        conn: &Connection,
        patch: &SettingsPatch,
    ) -> Result<(), GameError> {
        let (entry, room) = self.session_room(conn).await?;
        let mut room = room.write().await;
        ensure_open(&room)?;

        let settings = room.update_settings(&entry.player_id, patch)?.clone();
        room.broadcast(&ServerMessage::SettingsUpdated { settings });
        Ok(())
    }

    async fn back_to_lobby(&self, conn: &Connection) -> Result<(), GameError> {
        let (entry, room) = self.session_room(conn).await?;
        let mut room = room.write().await;
        ensure_open(&room)?;

        room.force_reset(&entry.player_id)?;
        room.broadcast(&room.reset_message());
        Ok(())
    }

    async fn get_game_state(&self, conn: &Connection) -> Result<(), GameError> {
        let (_, room) = self.session_room(conn).await?;
        let room = room.read().await;
        ensure_open(&room)?;

        conn.send(&ServerMessage::GameState(room.game_state()));
        Ok(())
    }

    async fn leave_room(&self, conn: &Connection) -> Result<(), GameError> {
        let room_id = self
            .depart(conn.id)
            .await
            .ok_or(GameError::NotConnected)?;
        conn.send(&ServerMessage::LeftRoom { room_id });
        Ok(())
    }

    /// Connection closed. Safe to call for connections that never joined.
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        if let Some(room_id) = self.depart(conn_id).await {
            info!("Connection {} left room {}", conn_id, room_id);
        }
    }

    /// Unbind the connection's session and take its player out of the room.
    /// Returns the room the connection was in, if any.
    async fn depart(&self, conn_id: ConnectionId) -> Option<String> {
        let entry = self.sessions.remove(&conn_id).await?;
        let Some(room) = self.registry.get(&entry.room_id).await else {
            return Some(entry.room_id);
        };

        // The room lock is released before touching the registry
        let empty = {
            let mut room = room.write().await;
            match room.remove_player(&entry.player_id) {
                Ok(departure) => {
                    if !departure.empty {
                        room.broadcast(&ServerMessage::PlayerLeft {
                            player_id: departure.player.id.clone(),
                            player_name: departure.player.name.clone(),
                            creator_id: room.creator_id().map(str::to_string),
                            players: room.player_summaries(),
                        });
                        for msg in &departure.follow_up {
                            room.broadcast(msg);
                        }
                    }
                    departure.empty
                }
                Err(e) => {
                    warn!(
                        "Room {}: session for {} had no player: {}",
                        entry.room_id, entry.player_id, e
                    );
                    false
                }
            }
        };

        if empty {
            self.registry.destroy(&entry.room_id).await;
        }
        Some(entry.room_id)
    }
}

/// A room handle fetched before it was shut down may still be reachable.
fn ensure_open(room: &Room) -> Result<(), GameError> {
    if room.is_closed() {
        return Err(GameError::RoomNotFound);
    }
    Ok(())
}
