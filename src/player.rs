//! Module containing structs for playing audio for guilds.

use crate::listeners::Listeners;
use crate::model::{
    Destroy,
    EventPayload,
    OutgoingMessage,
    Pause,
    Play,
    Seek,
    Stop,
    VoiceUpdate,
    Volume,
};
use crate::nodes::{Node, WeakNode};
use crate::{Error, EventHandler};
use futures::channel::mpsc::UnboundedReceiver;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// The range of volumes accepted by a node.
pub const VOLUME_RANGE: std::ops::RangeInclusive<i32> = 0..=1000;

/// A request to join a guild's voice channel.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct JoinOptions {
    /// The guild that owns the voice channel.
    pub guild: String,
    /// The voice channel in the guild.
    pub channel: String,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub deaf: bool,
    /// The host of the node to play on. When absent, the least loaded ready
    /// node is used.
    #[serde(default)]
    pub host: Option<String>,
}

/// The last known playback state of a player.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlayerState {
    /// The volume setting, on a scale of 0 to 1000.
    pub volume: i32,
    /// The track that the player is playing.
    pub track: Option<String>,
    /// The node's timestamp of the last update, in milliseconds.
    pub time: Option<i64>,
    /// The estimated position of the player.
    pub position: i64,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            volume: 100,
            track: None,
            time: None,
            position: 0,
        }
    }
}

/// An event raised by a node for a player.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlayerEvent {
    End {
        track: Option<String>,
        reason: Option<String>,
    },
    Stuck {
        track: Option<String>,
        threshold_ms: Option<u64>,
    },
    Error {
        track: Option<String>,
        error: Option<String>,
    },
    /// An event type this crate does not know about.
    Unknown {
        event: String,
    },
}

impl From<EventPayload> for PlayerEvent {
    fn from(event: EventPayload) -> Self {
        match &event.kind[..] {
            "TrackEndEvent" => PlayerEvent::End {
                track: event.track,
                reason: event.reason,
            },
            "TrackStuckEvent" => PlayerEvent::Stuck {
                track: event.track,
                threshold_ms: event.threshold_ms,
            },
            "TrackExceptionEvent" => PlayerEvent::Error {
                track: event.track,
                error: event
                    .error
                    .or_else(|| event.exception.and_then(|exception| exception.message)),
            },
            _ => PlayerEvent::Unknown { event: event.kind },
        }
    }
}

/// A light wrapper around a hashmap keyed by guild IDs with audio players.
///
/// At most one player exists per guild.
#[derive(Debug, Default)]
pub(crate) struct AudioPlayerManager {
    players: HashMap<String, AudioPlayer>,
}

impl AudioPlayerManager {
    /// Creates a new default `AudioPlayerManager`.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves the audio player for the guild, if it exists.
    pub fn get(&self, guild_id: &str) -> Option<AudioPlayer> {
        self.players.get(guild_id).cloned()
    }

    /// Returns the guild's existing player, or creates one bound to `node`.
    pub fn get_or_create(&mut self, data: JoinOptions, node: &Node) -> AudioPlayer {
        self.players
            .entry(data.guild.clone())
            .or_insert_with(|| AudioPlayer::new(data, node))
            .clone()
    }

    pub fn remove(&mut self, guild_id: &str) -> Option<AudioPlayer> {
        self.players.remove(guild_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }
}

/// The audio player of a single guild, bound to one node for its lifetime.
///
/// This is a cheap handle; clones refer to the same player. Commands are sent
/// to the node right away and local state is updated without waiting for an
/// acknowledgement.
#[derive(Clone)]
pub struct AudioPlayer {
    inner: Rc<PlayerInner>,
}

struct PlayerInner {
    data: JoinOptions,
    host: String,
    node: WeakNode,
    state: RefCell<PlayerState>,
    playing: Cell<bool>,
    looping: Cell<bool>,
    queue: RefCell<Vec<String>>,
    listeners: Listeners<PlayerEvent>,
}

impl AudioPlayer {
    pub(crate) fn new(data: JoinOptions, node: &Node) -> Self {
        Self {
            inner: Rc::new(PlayerInner {
                host: node.host().to_owned(),
                node: node.downgrade(),
                state: RefCell::new(PlayerState::default()),
                playing: Cell::new(false),
                looping: Cell::new(false),
                queue: RefCell::new(Vec::new()),
                listeners: Listeners::default(),
                data,
            }),
        }
    }

    /// The ID of the guild that the player represents.
    pub fn guild_id(&self) -> &str {
        &self.inner.data.guild
    }

    /// The join request that created the player.
    pub fn data(&self) -> &JoinOptions {
        &self.inner.data
    }

    /// The host of the node the player is bound to.
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// The node the player is bound to, if it is still alive.
    pub fn node(&self) -> Option<Node> {
        self.inner.node.upgrade()
    }

    pub fn state(&self) -> PlayerState {
        self.inner.state.borrow().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playing.get()
    }

    /// Whether looping was requested. The player itself does not act on it.
    pub fn is_looping(&self) -> bool {
        self.inner.looping.get()
    }

    /// Track handles queued by the application. The player never reads them.
    pub fn queue(&self) -> Ref<Vec<String>> {
        self.inner.queue.borrow()
    }

    pub fn queue_mut(&self) -> RefMut<Vec<String>> {
        self.inner.queue.borrow_mut()
    }

    /// Subscribes to the player's events.
    pub fn events(&self) -> UnboundedReceiver<PlayerEvent> {
        self.inner.listeners.subscribe()
    }

    /// Whether both handles refer to the same player.
    pub fn ptr_eq(&self, other: &AudioPlayer) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Sends a message to Lavalink telling it to play a track.
    pub fn play(&self, track: &str) -> Result<(), Error> {
        self.play_with(track, None, None)
    }

    /// Sends a message to Lavalink telling it to play a track with optional
    /// start and end times, in milliseconds.
    pub fn play_with(
        &self,
        track: &str,
        start_time: Option<u64>,
        end_time: Option<u64>,
    ) -> Result<(), Error> {
        self.send(OutgoingMessage::Play(Play {
            guild_id: self.guild_id().to_owned(),
            track: track.to_owned(),
            start_time,
            end_time,
        }))?;

        self.inner.playing.set(true);

        let mut state = self.inner.state.borrow_mut();
        state.track = Some(track.to_owned());
        state.time = Some(now_millis());

        Ok(())
    }

    /// Sends a message to Lavalink telling it to stop the player.
    pub fn stop(&self) -> Result<(), Error> {
        self.send(OutgoingMessage::Stop(Stop {
            guild_id: self.guild_id().to_owned(),
        }))
    }

    /// Sends a message to Lavalink telling it to pause the player.
    pub fn pause(&self) -> Result<(), Error> {
        self.set_paused(true)
    }

    /// Sends a message to Lavalink telling it to unpause the player.
    pub fn resume(&self) -> Result<(), Error> {
        self.set_paused(false)
    }

    fn set_paused(&self, pause: bool) -> Result<(), Error> {
        self.send(OutgoingMessage::Pause(Pause {
            guild_id: self.guild_id().to_owned(),
            pause,
        }))?;

        self.inner.playing.set(!pause);

        Ok(())
    }

    /// Sends a message to Lavalink telling it to mutate the volume setting.
    ///
    /// Returns [`Error::InvalidArgument`] without sending anything if the
    /// volume is outside of [`VOLUME_RANGE`].
    ///
    /// [`Error::InvalidArgument`]: ../enum.Error.html#variant.InvalidArgument
    /// [`VOLUME_RANGE`]: constant.VOLUME_RANGE.html
    pub fn set_volume(&self, volume: i32) -> Result<(), Error> {
        if !VOLUME_RANGE.contains(&volume) {
            return Err(Error::InvalidArgument(format!(
                "volume must be between {} and {}, got {}",
                VOLUME_RANGE.start(),
                VOLUME_RANGE.end(),
                volume,
            )));
        }

        self.send(OutgoingMessage::Volume(Volume {
            guild_id: self.guild_id().to_owned(),
            volume,
        }))?;

        self.inner.state.borrow_mut().volume = volume;

        Ok(())
    }

    pub fn set_looping(&self, looping: bool) {
        self.inner.looping.set(looping);
    }

    /// Sends a message to Lavalink telling it to seek the player to a certain
    /// position, in milliseconds.
    pub fn seek(&self, position: i64) -> Result<(), Error> {
        self.send(OutgoingMessage::Seek(Seek {
            guild_id: self.guild_id().to_owned(),
            position,
        }))
    }

    /// Sends a message to Lavalink telling it to drop the guild's player.
    pub(crate) fn destroy(&self) -> Result<(), Error> {
        self.send(OutgoingMessage::Destroy(Destroy {
            guild_id: self.guild_id().to_owned(),
        }))
    }

    /// Relays a voice server update to the node, along with the bot's voice
    /// session ID for the guild.
    pub(crate) fn voice_server_update(&self, handler: &dyn EventHandler, event: Value) -> Result<(), Error> {
        let session_id = handler
            .current_member(self.guild_id())
            .as_ref()
            .and_then(session_id)
            .ok_or_else(|| Error::MissingSessionId(self.guild_id().to_owned()))?;

        self.send(OutgoingMessage::VoiceUpdate(VoiceUpdate {
            guild_id: self.guild_id().to_owned(),
            session_id,
            event,
        }))
    }

    pub(crate) fn update_state(&self, time: i64, position: i64) {
        let mut state = self.inner.state.borrow_mut();
        state.time = Some(time);
        state.position = position;
    }

    pub(crate) fn handle_event(&self, event: EventPayload) {
        self.inner.listeners.emit(PlayerEvent::from(event));
    }

    #[inline]
    fn send(&self, message: OutgoingMessage) -> Result<(), Error> {
        let node = self
            .inner
            .node
            .upgrade()
            .ok_or_else(|| Error::NodeNotFound(self.inner.host.clone()))?;

        node.send(&message)
    }
}

impl fmt::Debug for AudioPlayer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AudioPlayer")
            .field("data", &self.inner.data)
            .field("state", &self.inner.state.borrow())
            .field("playing", &self.inner.playing.get())
            .field("looping", &self.inner.looping.get())
            .finish()
    }
}

// Gateway clients expose the bot's voice session under one of two shapes.
#[derive(Deserialize)]
struct CurrentMember {
    #[serde(default)]
    voice: Option<MemberVoice>,
    #[serde(default, rename = "voiceState")]
    voice_state: Option<MemberVoiceState>,
}

#[derive(Deserialize)]
struct MemberVoice {
    #[serde(default, rename = "sessionId")]
    session_id: Option<String>,
}

#[derive(Deserialize)]
struct MemberVoiceState {
    #[serde(default)]
    session_id: Option<String>,
}

fn session_id(member: &Value) -> Option<String> {
    let member = CurrentMember::deserialize(member).ok()?;

    member
        .voice
        .and_then(|voice| voice.session_id)
        .or_else(|| member.voice_state.and_then(|state| state.session_id))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
