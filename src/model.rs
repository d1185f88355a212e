//! Frames exchanged with Lavalink nodes, and the gateway voice-state payload.
//!
//! Outgoing frames are serialized through [`OutgoingMessage`], which carries
//! the `op` discriminator. Incoming frames are deserialized through
//! [`IncomingMessage`]; any op this crate does not understand deserializes to
//! [`IncomingMessage::Unknown`] rather than failing.
//!
//! [`IncomingMessage`]: enum.IncomingMessage.html
//! [`IncomingMessage::Unknown`]: enum.IncomingMessage.html#variant.Unknown
//! [`OutgoingMessage`]: enum.OutgoingMessage.html

use crate::nodes::NodeStats;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A frame sent from the client to a node, tagged by `op`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum OutgoingMessage {
    Destroy(Destroy),
    Pause(Pause),
    Play(Play),
    Seek(Seek),
    Stop(Stop),
    VoiceUpdate(VoiceUpdate),
    Volume(Volume),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Destroy {
    pub guild_id: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pause {
    pub guild_id: String,
    pub pause: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Play {
    pub guild_id: String,
    pub track: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seek {
    pub guild_id: String,
    pub position: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub guild_id: String,
}

/// Relays the gateway's voice server credentials to the node.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceUpdate {
    pub guild_id: String,
    pub session_id: String,
    pub event: Value,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub guild_id: String,
    pub volume: i32,
}

/// A frame received from a node, tagged by `op`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum IncomingMessage {
    Event(EventPayload),
    PlayerUpdate(PlayerUpdate),
    Stats(NodeStats),
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    pub guild_id: String,
    pub state: PlayerUpdateState,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct PlayerUpdateState {
    pub time: i64,
    #[serde(default)]
    pub position: i64,
}

/// A player event. Which of the optional fields are present depends on
/// `kind`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub guild_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub threshold_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub exception: Option<EventException>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventException {
    #[serde(default)]
    pub message: Option<String>,
}

/// Gateway opcode 4: requests that the bot join or leave a voice channel.
#[derive(Clone, Debug, Serialize)]
pub struct VoiceStateUpdate {
    pub op: u8,
    pub shard: u64,
    pub d: VoiceState,
}

#[derive(Clone, Debug, Serialize)]
pub struct VoiceState {
    pub guild_id: String,
    pub channel_id: Option<String>,
    pub self_deaf: bool,
    pub self_mute: bool,
}

impl VoiceStateUpdate {
    pub fn new(shard: u64, guild_id: &str, channel_id: Option<&str>, deaf: bool, mute: bool) -> Self {
        Self {
            op: 4,
            shard,
            d: VoiceState {
                guild_id: guild_id.to_owned(),
                channel_id: channel_id.map(ToOwned::to_owned),
                self_deaf: deaf,
                self_mute: mute,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outgoing_frames_carry_op() {
        let play = OutgoingMessage::Play(Play {
            guild_id: "1".to_owned(),
            track: "QAAA".to_owned(),
            start_time: None,
            end_time: Some(5000),
        });
        let update = OutgoingMessage::VoiceUpdate(VoiceUpdate {
            guild_id: "1".to_owned(),
            session_id: "abc".to_owned(),
            event: json!({"token": "t", "endpoint": "e"}),
        });

        assert_eq!(
            serde_json::to_value(&play).unwrap(),
            json!({"op": "play", "guildId": "1", "track": "QAAA", "endTime": 5000}),
        );
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({
                "op": "voiceUpdate",
                "guildId": "1",
                "sessionId": "abc",
                "event": {"token": "t", "endpoint": "e"}
            }),
        );
    }

    #[test]
    fn unknown_ops_do_not_fail() {
        let msg: IncomingMessage = serde_json::from_value(json!({"op": "sendWS", "shardId": 0})).unwrap();

        assert!(matches!(msg, IncomingMessage::Unknown));
    }

    #[test]
    fn voice_state_update_leaves_with_null_channel() {
        let leave = VoiceStateUpdate::new(2, "1", None, false, false);

        assert_eq!(
            serde_json::to_value(&leave).unwrap(),
            json!({
                "op": 4,
                "shard": 2,
                "d": {"guild_id": "1", "channel_id": null, "self_deaf": false, "self_mute": false}
            }),
        );
    }
}
