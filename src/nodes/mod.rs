//! Connections to Lavalink nodes and the registry that owns them.

mod node;
mod node_manager;

pub use self::node::Node;
pub use self::node_manager::NodeManager;

pub(crate) use self::node::WeakNode;

use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

fn default_rest_port() -> u16 {
    2333
}

/// Where a node lives and how to authenticate with it. Nodes are keyed by
/// `host`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    #[serde(default)]
    pub region: String,
    #[serde(default = "default_rest_port")]
    pub rest_port: u16,
}

/// Connection lifecycle of a [`Node`]. `Closed` is terminal.
///
/// [`Node`]: struct.Node.html
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeState {
    Unopened,
    Connecting,
    Ready,
    Closed,
}

/// Load metrics last reported by a node.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeStats {
    pub players: u32,
    pub playing_players: u32,
    pub uptime: u64,
    pub memory: MemoryStats,
    pub cpu: CpuStats,
    pub frame_stats: Option<FrameStats>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct MemoryStats {
    pub free: u64,
    pub used: u64,
    pub allocated: u64,
    pub reservable: u64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CpuStats {
    pub cores: u32,
    pub system_load: f64,
    pub lavalink_load: f64,
}

/// Audio frame counts over the last minute.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct FrameStats {
    pub sent: i64,
    pub nulled: i64,
    pub deficit: i64,
}

impl NodeStats {
    /// The load penalty used to pick the best node. Lower is better.
    pub fn penalty(&self) -> f64 {
        let players = f64::from(self.playing_players);
        let cpu = 1.05f64.powf(100.0 * self.cpu.system_load) * 10.0 - 10.0;
        let (deficit, nulled) = match self.frame_stats {
            Some(ref frames) => (
                1.03f64.powf(500.0 * (frames.deficit as f64 / 3000.0)) * 600.0 - 600.0,
                (1.03f64.powf(500.0 * (frames.nulled as f64 / 3000.0)) * 300.0 - 300.0) * 2.0,
            ),
            None => (0.0, 0.0),
        };

        players + cpu + deficit + nulled
    }
}

/// An event raised by a [`Node`].
///
/// [`Node`]: struct.Node.html
#[derive(Clone, Debug)]
pub enum NodeEvent {
    /// The WebSocket handshake completed.
    Ready,
    /// Every parsed inbound frame, before it is dispatched.
    Message(Value),
    /// The connection closed. The node is unusable from here on.
    Close { code: u16, message: String },
    /// A non-fatal transport or parse error.
    Error(Arc<Error>),
}
