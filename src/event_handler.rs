use serde_json::Value;

/// The host's gateway connection, as seen by the audio manager.
///
/// The manager never talks to the chat gateway directly. Voice-channel
/// join/leave requests are handed to [`forward`], and the bot's own voice
/// state is read back through [`current_member`] when a voice server update
/// needs to be relayed to a node.
///
/// [`forward`]: #tymethod.forward
/// [`current_member`]: #tymethod.current_member
pub trait EventHandler {
    /// Tymethod called for forwarding a WebSocket message to the gateway
    /// shard with the given ID.
    fn forward(&self, shard_id: u64, message: &str);

    /// Tymethod called for retrieving the bot's own member object for a
    /// guild, as the raw JSON cached by the gateway client.
    ///
    /// The voice session ID is read from either `voice.sessionId` or
    /// `voiceState.session_id`, depending on which the client provides.
    fn current_member(&self, guild_id: &str) -> Option<Value>;
}
