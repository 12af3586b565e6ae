use std::convert::Infallible;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket};
use warp::{Filter, Rejection, Reply};

use crate::dispatcher::{Connection, Dispatcher};
use crate::ids::normalize_room_code;

/// All HTTP routes:
/// `GET /ws` upgrades to the game socket, `GET /games[/{roomId}]` lists
/// public rooms, anything else is served from `static_dir`.
pub fn routes(
    dispatcher: Dispatcher,
    static_dir: PathBuf,
    ping_every: Duration,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    // Put the dispatcher into a Warp filter, so we can pass it to every petition
    let dispatcher = warp::any().map(move || dispatcher.clone());

    // GET /ws -> Websocket upgrade
    let ws = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(dispatcher.clone())
        .map(move |ws: warp::ws::Ws, dispatcher: Dispatcher| {
            ws.on_upgrade(move |socket| new_ws_connection(socket, dispatcher, ping_every))
        });

    // GET /games -> public room listing
    let games = warp::path("games")
        .and(warp::path::end())
        .and(warp::get())
        .and(dispatcher.clone())
        .and_then(list_games);

    // GET /games/:roomId -> one room
    let game = warp::path("games")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(dispatcher)
        .and_then(get_game);

    let frontend = warp::fs::dir(static_dir);

    ws.or(games).or(game).or(frontend)
}

async fn list_games(dispatcher: Dispatcher) -> Result<impl Reply, Infallible> {
    let rooms = dispatcher.registry().list_public().await;
    Ok(warp::reply::json(&rooms))
}

async fn get_game(room_id: String, dispatcher: Dispatcher) -> Result<impl Reply, Infallible> {
    let room = dispatcher
        .registry()
        .get(&normalize_room_code(&room_id))
        .await;
    let reply = match room {
        Some(room) => {
            let summary = room.read().await.summary();
            warp::reply::with_status(warp::reply::json(&summary), StatusCode::OK)
        }
        None => warp::reply::with_status(
            warp::reply::json(&json!({"error": "room not found"})),
            StatusCode::NOT_FOUND,
        ),
    };
    Ok(reply)
}

pub async fn new_ws_connection(ws: WebSocket, dispatcher: Dispatcher, ping_every: Duration) {
    // Split the socket into a message sender and receiver.
    let (user_ws_tx, mut user_ws_rx) = ws.split();

    let tx = create_sender(user_ws_tx);
    let conn = Connection::new(tx.clone());
    info!("Connection {} opened", conn.id);

    // Periodically ping the client to keep the socket alive
    let ping = tokio::spawn(async move {
        let mut interval = tokio::time::interval(ping_every);
        interval.tick().await;
        loop {
            interval.tick().await;
            if tx.send(Message::ping(Vec::new())).is_err() {
                break;
            }
        }
    });

    // The socket stays open until the client closes it or the transport fails
    while let Some(msg) = user_ws_rx.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                debug!("Connection {}: websocket error: {}", conn.id, e);
                break;
            }
        };
        if msg.is_close() {
            break;
        }
        // Pings, pongs and binary frames carry nothing for us
        if let Ok(text) = msg.to_str() {
            dispatcher.dispatch(&conn, text).await;
        }
    }

    ping.abort();
    dispatcher.disconnect(conn.id).await;
    info!("Connection {} closed", conn.id);
}

/// Spawn the task that drains a connection's outbound queue into its socket.
fn create_sender(mut user_ws_tx: SplitSink<WebSocket, Message>) -> UnboundedSender<Message> {
    // An unbounded channel buffers outbound frames so that room broadcasts
    // never wait on a slow socket.
    let (tx, rx) = mpsc::unbounded_channel();
    let mut rx = UnboundedReceiverStream::new(rx);

    tokio::task::spawn(async move {
        while let Some(message) = rx.next().await {
            if let Err(e) = user_ws_tx.send(message).await {
                warn!("Websocket send error: {}", e);
                break;
            }
        }
        let _ = user_ws_tx.close().await;
    });

    tx
}

