use crate::listeners::Listeners;
use crate::manager::ManagerConfig;
use crate::model::{EventPayload, IncomingMessage, PlayerUpdate};
use crate::player::{AudioPlayer, AudioPlayerManager};
use crate::Error;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::{SinkExt, StreamExt};
use http::HeaderValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use super::{NodeConfig, NodeEvent, NodeState, NodeStats};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// A connection to a single Lavalink node.
///
/// This is a cheap handle; clones refer to the same connection. A node starts
/// out [`Unopened`], and once [`open`]ed moves through [`Connecting`] and
/// [`Ready`] to [`Closed`]. A closed node is never reopened: replace it in the
/// [`NodeManager`] instead.
///
/// [`Closed`]: enum.NodeState.html#variant.Closed
/// [`Connecting`]: enum.NodeState.html#variant.Connecting
/// [`NodeManager`]: struct.NodeManager.html
/// [`Ready`]: enum.NodeState.html#variant.Ready
/// [`Unopened`]: enum.NodeState.html#variant.Unopened
/// [`open`]: #method.open
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

struct NodeInner {
    config: NodeConfig,
    user_id: String,
    num_shards: u64,
    state: Cell<NodeState>,
    stats: RefCell<Option<NodeStats>>,
    sender: RefCell<Option<UnboundedSender<Message>>>,
    players: Weak<RefCell<AudioPlayerManager>>,
    listeners: Listeners<NodeEvent>,
}

/// A non-owning reference to a [`Node`], held by players.
///
/// [`Node`]: struct.Node.html
#[derive(Clone)]
pub(crate) struct WeakNode(Weak<NodeInner>);

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(|inner| Node { inner })
    }
}

impl Node {
    pub(crate) fn new(
        config: NodeConfig,
        settings: &ManagerConfig,
        players: Weak<RefCell<AudioPlayerManager>>,
    ) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                config,
                user_id: settings.user_id.clone(),
                num_shards: settings.num_shards,
                state: Cell::new(NodeState::Unopened),
                stats: RefCell::new(None),
                sender: RefCell::new(None),
                players,
                listeners: Listeners::default(),
            }),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    pub fn state(&self) -> NodeState {
        self.inner.state.get()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state() == NodeState::Ready
    }

    /// The stats last reported by the node, if any.
    pub fn stats(&self) -> Option<NodeStats> {
        self.inner.stats.borrow().clone()
    }

    /// The node's load penalty. Nodes that have not reported stats yet have
    /// no penalty.
    pub fn penalty(&self) -> f64 {
        self.inner
            .stats
            .borrow()
            .as_ref()
            .map(NodeStats::penalty)
            .unwrap_or(0.0)
    }

    /// Subscribes to the node's events.
    pub fn events(&self) -> UnboundedReceiver<NodeEvent> {
        self.inner.listeners.subscribe()
    }

    /// Whether both handles refer to the same connection.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.inner))
    }

    /// Starts connecting to the node in the background.
    ///
    /// This spawns onto the current [`LocalSet`], so it must be called from
    /// within one. Calling this on a node that was already opened does
    /// nothing.
    ///
    /// [`LocalSet`]: https://docs.rs/tokio/*/tokio/task/struct.LocalSet.html
    pub fn open(&self) {
        if self.state() != NodeState::Unopened {
            warn!("Node {} was already opened", self.host());

            return;
        }

        self.inner.state.set(NodeState::Connecting);

        tokio::task::spawn_local(self.clone().run());
    }

    /// Serializes the payload and queues it to be written to the node.
    ///
    /// Fails immediately if the node is not ready.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), Error> {
        if !self.is_ready() {
            return Err(Error::NotConnected(self.host().to_owned()));
        }

        let json = serde_json::to_string(payload)?;
        trace!("Sending to {}: {}", self.host(), json);

        self.write(Message::Text(json.into()))
    }

    /// Sends a close frame over the WebSocket, terminating the connection.
    ///
    /// A node that has not finished connecting is marked closed right away.
    pub fn close(&self) -> Result<(), Error> {
        match self.state() {
            NodeState::Ready => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "Node closed by client.".into(),
                };

                self.write(Message::Close(Some(frame)))
            },
            NodeState::Unopened | NodeState::Connecting => {
                self.on_close(1000, Some("Node closed before it was ready."));

                Ok(())
            },
            NodeState::Closed => Ok(()),
        }
    }

    fn write(&self, message: Message) -> Result<(), Error> {
        match *self.inner.sender.borrow() {
            Some(ref tx) => tx
                .unbounded_send(message)
                .map_err(|_| Error::NotConnected(self.host().to_owned())),
            None => Err(Error::NotConnected(self.host().to_owned())),
        }
    }

    fn request(&self) -> Result<Request, Error> {
        let config = &self.inner.config;
        let mut request = format!("ws://{}:{}", config.host, config.port).into_client_request()?;

        let headers = request.headers_mut();
        headers.insert("authorization", HeaderValue::from_str(&config.password)?);
        headers.insert("num-shards", HeaderValue::from(self.inner.num_shards));
        headers.insert("user-id", HeaderValue::from_str(&self.inner.user_id)?);

        Ok(request)
    }

    async fn run(self) {
        let request = match self.request() {
            Ok(request) => request,
            Err(why) => return self.fail(why),
        };

        let (duplex, _) = match tokio_tungstenite::connect_async(request).await {
            Ok(connected) => connected,
            Err(why) => return self.fail(why.into()),
        };

        if self.state() == NodeState::Closed {
            debug!("Node {} was closed while connecting", self.host());

            return;
        }

        let (mut sink, mut stream) = duplex.split();
        let (tx, mut rx) = mpsc::unbounded();

        let writer = self.clone();
        tokio::task::spawn_local(async move {
            while let Some(message) = rx.next().await {
                if let Err(why) = sink.send(message).await {
                    writer.on_error(why.into());

                    break;
                }
            }
        });

        self.on_open(tx);

        let (code, reason) = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => self.on_message(text.as_str()),
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => self.on_message(text),
                    Err(why) => warn!("Received non-UTF-8 frame from {}: {:?}", self.host(), why),
                },
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => (u16::from(frame.code), Some(frame.reason.to_string())),
                        None => (1005, None),
                    };
                },
                Some(Ok(_)) => {},
                Some(Err(why)) => {
                    self.on_error(why.into());

                    break (1006, None);
                },
                None => break (1006, None),
            }
        };

        self.on_close(code, reason.as_deref());
    }

    fn fail(&self, why: Error) {
        if self.state() == NodeState::Closed {
            debug!("Node {} was closed before failing: {:?}", self.host(), why);

            return;
        }

        self.on_error(why);
        self.on_close(1006, None);
    }

    pub(crate) fn on_open(&self, sender: UnboundedSender<Message>) {
        *self.inner.sender.borrow_mut() = Some(sender);
        self.inner.state.set(NodeState::Ready);

        info!("Node {} is ready", self.host());
        self.inner.listeners.emit(NodeEvent::Ready);
    }

    pub(crate) fn on_message(&self, text: &str) {
        trace!("Received text from {}: {}", self.host(), text);

        let json = match serde_json::from_str::<Value>(text) {
            Ok(json) => json,
            Err(why) => {
                warn!("Error parsing received JSON: {:?}", why);
                self.on_error(why.into());

                return;
            },
        };

        self.inner.listeners.emit(NodeEvent::Message(json.clone()));

        let message = match IncomingMessage::deserialize(&json) {
            Ok(message) => message,
            Err(why) => {
                warn!("Failed to deserialize frame from {}: {:?}", self.host(), why);

                return;
            },
        };

        match message {
            IncomingMessage::PlayerUpdate(update) => self.handle_player_update(update),
            IncomingMessage::Stats(stats) => {
                *self.inner.stats.borrow_mut() = Some(stats);
            },
            IncomingMessage::Event(event) => self.handle_event(event),
            IncomingMessage::Unknown => {
                debug!("Ignoring unknown op from {}: {:?}", self.host(), json.get("op"));
            },
        }
    }

    pub(crate) fn on_close(&self, code: u16, reason: Option<&str>) {
        if self.state() == NodeState::Closed {
            return;
        }

        self.inner.state.set(NodeState::Closed);
        self.inner.sender.borrow_mut().take();

        let message = close_message(code, reason);
        info!("Node {} ({}): {}", self.host(), code, message);

        self.inner.listeners.emit(NodeEvent::Close { code, message });
    }

    pub(crate) fn on_error(&self, why: Error) {
        warn!("Error on node {}: {:?}", self.host(), why);

        self.inner.listeners.emit(NodeEvent::Error(Arc::new(why)));
    }

    fn player(&self, guild_id: &str) -> Option<AudioPlayer> {
        let players = self.inner.players.upgrade()?;
        let player = players.borrow().get(guild_id);

        player
    }

    fn handle_player_update(&self, update: PlayerUpdate) {
        match self.player(&update.guild_id) {
            Some(player) => player.update_state(update.state.time, update.state.position),
            None => debug!("Dropping player update for guild {} without a player", update.guild_id),
        }
    }

    fn handle_event(&self, event: EventPayload) {
        match self.player(&event.guild_id) {
            Some(player) => player.handle_event(event),
            None => debug!("Dropping {} for guild {} without a player", event.kind, event.guild_id),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Node")
            .field("config", &self.inner.config)
            .field("state", &self.inner.state.get())
            .field("stats", &self.inner.stats.borrow())
            .finish()
    }
}

/// The human-readable message raised with a close event.
pub(crate) fn close_message(code: u16, reason: Option<&str>) -> String {
    let reason = match reason {
        Some(reason) if !reason.is_empty() => reason,
        _ => "No reason provided.",
    };

    if code == 1000 {
        format!("Connection to the node closed for: {}", reason)
    } else {
        format!("Connection to the node closed unexpectedly for: {}", reason)
    }
}
