use crate::manager::ManagerConfig;
use crate::nodes::{Node, NodeConfig};
use crate::player::{AudioPlayerManager, JoinOptions};
use crate::EventHandler;
use futures::channel::mpsc::{self, UnboundedReceiver};
use futures::{FutureExt, StreamExt};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Weak;
use tokio_tungstenite::tungstenite::Message;

pub fn node_config(host: &str) -> NodeConfig {
    NodeConfig {
        host: host.to_owned(),
        port: 2333,
        password: "youshallnotpass".to_owned(),
        region: "us".to_owned(),
        rest_port: 2333,
    }
}

/// A node that is ready, writing into the returned receiver instead of a
/// socket.
pub fn connected_node(
    host: &str,
    players: Weak<RefCell<AudioPlayerManager>>,
) -> (Node, UnboundedReceiver<Message>) {
    let node = Node::new(node_config(host), &ManagerConfig::default(), players);
    let (tx, rx) = mpsc::unbounded();
    node.on_open(tx);

    (node, rx)
}

pub fn join_options(guild: &str, host: &str) -> JoinOptions {
    JoinOptions {
        guild: guild.to_owned(),
        channel: "100".to_owned(),
        mute: false,
        deaf: false,
        host: Some(host.to_owned()),
    }
}

/// The next frame already queued for the node, as JSON.
pub fn next_frame(rx: &mut UnboundedReceiver<Message>) -> Value {
    match rx.next().now_or_never() {
        Some(Some(Message::Text(text))) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text frame, got {:?}", other),
    }
}

/// A gateway that records forwarded messages and knows a fixed set of voice
/// sessions.
#[derive(Default)]
pub struct RecordingGateway {
    pub forwarded: RefCell<Vec<(u64, Value)>>,
    pub sessions: HashMap<String, String>,
}

impl RecordingGateway {
    pub fn with_session(guild_id: &str, session_id: &str) -> Self {
        let mut gateway = Self::default();
        gateway.sessions.insert(guild_id.to_owned(), session_id.to_owned());

        gateway
    }
}

impl EventHandler for RecordingGateway {
    fn forward(&self, shard_id: u64, message: &str) {
        let message = serde_json::from_str(message).unwrap();
        self.forwarded.borrow_mut().push((shard_id, message));
    }

    fn current_member(&self, guild_id: &str) -> Option<Value> {
        self.sessions
            .get(guild_id)
            .map(|session_id| json!({"voice": {"sessionId": session_id}}))
    }
}
