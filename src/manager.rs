use crate::model::VoiceStateUpdate;
use crate::nodes::{Node, NodeConfig, NodeManager};
use crate::player::{AudioPlayer, AudioPlayerManager, JoinOptions};
use crate::rest::RestClient;
use crate::track::{self, TrackResultSet};
use crate::{Error, EventHandler};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

fn default_num_shards() -> u64 {
    1
}

/// Identity of the bot, sent to nodes on connect and to the gateway on
/// voice state changes.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ManagerConfig {
    pub user_id: String,
    /// The shard voice state updates are sent through.
    #[serde(default)]
    pub shard_id: u64,
    #[serde(default = "default_num_shards")]
    pub num_shards: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            shard_id: 0,
            num_shards: default_num_shards(),
        }
    }
}

/// Coordinates voice connections and audio players across a set of nodes.
///
/// The manager owns the nodes and keeps at most one [`AudioPlayer`] per
/// guild. Everything runs on a single thread: nodes are driven by tasks on the
/// current [`LocalSet`], so the manager must be created and used from within
/// one.
///
/// [`AudioPlayer`]: player/struct.AudioPlayer.html
/// [`LocalSet`]: https://docs.rs/tokio/*/tokio/task/struct.LocalSet.html
pub struct AudioManager {
    config: ManagerConfig,
    handler: Rc<dyn EventHandler>,
    nodes: NodeManager,
    players: Rc<RefCell<AudioPlayerManager>>,
    rest: RestClient,
}

impl AudioManager {
    /// Creates a manager and starts connecting to each of the nodes.
    pub fn new<I>(config: ManagerConfig, handler: Rc<dyn EventHandler>, nodes: I) -> Self
        where I: IntoIterator<Item = NodeConfig> {
        let players = Rc::new(RefCell::new(AudioPlayerManager::new()));
        let node_manager = NodeManager::new(config.clone(), Rc::downgrade(&players));
        node_manager.launch_all(nodes);

        Self {
            nodes: node_manager,
            rest: RestClient::new(),
            config,
            handler,
            players,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn nodes(&self) -> &NodeManager {
        &self.nodes
    }

    /// Makes the bot join a voice channel, returning the guild's player.
    ///
    /// The voice state update is sent to the gateway on every call. If the
    /// guild already has a player it is returned as-is; otherwise a new one is
    /// bound to the node named by `options.host`, or to the best ready node
    /// when no host is given.
    pub fn join(&self, options: JoinOptions) -> Result<AudioPlayer, Error> {
        self.forward(&VoiceStateUpdate::new(
            self.config.shard_id,
            &options.guild,
            Some(options.channel.as_str()),
            options.deaf,
            options.mute,
        ));

        let node = self.resolve_node(options.host.as_deref())?;
        let player = self.players.borrow_mut().get_or_create(options, &node);

        Ok(player)
    }

    /// Makes the bot leave the guild's voice channel and removes its player.
    ///
    /// Returns whether the guild had a player. The node is told to destroy
    /// its player for the guild as well.
    pub fn leave(&self, guild_id: &str) -> bool {
        self.forward(&VoiceStateUpdate::new(self.config.shard_id, guild_id, None, false, false));

        let removed = self.players.borrow_mut().remove(guild_id);

        match removed {
            Some(player) => {
                if let Err(why) = player.destroy() {
                    warn!("Failed to destroy player for guild {}: {:?}", guild_id, why);
                }

                true
            },
            None => false,
        }
    }

    /// Retrieves the guild's player, if it exists.
    pub fn player(&self, guild_id: &str) -> Option<AudioPlayer> {
        let player = self.players.borrow().get(guild_id);

        player
    }

    pub fn player_count(&self) -> usize {
        self.players.borrow().len()
    }

    /// Searches the node for tracks.
    ///
    /// Returns [`Error::NodeNotFound`] if no node has the host. Every other
    /// failure, including no matches, is logged and resolves to `Ok(None)`.
    ///
    /// [`Error::NodeNotFound`]: enum.Error.html#variant.NodeNotFound
    pub async fn get_tracks(&self, query: &str, host: &str) -> Result<Option<TrackResultSet>, Error> {
        let node = self.node(host)?;

        match self.rest.load_tracks(node.config(), query).await {
            Ok(response) => Ok(track::normalize(response)),
            Err(why) => {
                warn!("Failed to load tracks for {:?} from {}: {:?}", query, host, why);

                Ok(None)
            },
        }
    }

    /// Adds a node and starts connecting to it. See [`NodeManager::add`].
    ///
    /// [`NodeManager::add`]: nodes/struct.NodeManager.html#method.add
    pub fn add_node(&self, config: NodeConfig) -> Node {
        self.nodes.add(config)
    }

    pub fn remove_node(&self, host: &str) -> bool {
        self.nodes.remove(host)
    }

    /// Handles a raw gateway dispatch.
    ///
    /// `VOICE_SERVER_UPDATE` dispatches for guilds with a player are relayed
    /// to the player's node; returns whether that happened. Everything else
    /// is ignored.
    pub fn handle_gateway_event(&self, raw: &Value) -> Result<bool, Error> {
        if raw.get("t").and_then(Value::as_str) != Some("VOICE_SERVER_UPDATE") {
            return Ok(false);
        }

        let event = match raw.get("d") {
            Some(event) => event,
            None => return Ok(false),
        };

        let guild_id = match event.get("guild_id").and_then(Value::as_str) {
            Some(guild_id) => guild_id,
            None => return Ok(false),
        };

        match self.player(guild_id) {
            Some(player) => {
                player.voice_server_update(&*self.handler, event.clone())?;

                Ok(true)
            },
            None => {
                debug!("Dropping voice server update for guild {} without a player", guild_id);

                Ok(false)
            },
        }
    }

    fn node(&self, host: &str) -> Result<Node, Error> {
        self.nodes.get(host).ok_or_else(|| Error::NodeNotFound(host.to_owned()))
    }

    fn resolve_node(&self, host: Option<&str>) -> Result<Node, Error> {
        match host {
            Some(host) => self.node(host),
            None => self
                .nodes
                .best_node()
                .ok_or_else(|| Error::NodeNotFound("any ready node".to_owned())),
        }
    }

    fn forward(&self, update: &VoiceStateUpdate) {
        match serde_json::to_string(update) {
            Ok(message) => {
                trace!("Forwarding to shard {}: {}", update.shard, message);

                self.handler.forward(update.shard, &message);
            },
            Err(why) => error!("Failed to serialize voice state update: {:?}", why),
        }
    }
}
