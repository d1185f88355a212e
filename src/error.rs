use http::header::InvalidHeaderValue;
use http::uri::InvalidUri;
use http::StatusCode;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WebSocketError;

#[derive(Debug, Error)]
pub enum Error {
    /// No live node is registered under the given host.
    #[error("no node with host: {0} found")]
    NodeNotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The node's transport is not open, or has already closed.
    #[error("node {0} is not connected")]
    NotConnected(String),
    /// The gateway collaborator had no voice session for the guild.
    #[error("no voice session id available for guild {0}")]
    MissingSessionId(String),
    #[error("search request failed with status {0}")]
    SearchStatus(StatusCode),
    #[error(transparent)]
    WebSocket(#[from] WebSocketError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] http::Error),
    #[error(transparent)]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
    #[error(transparent)]
    InvalidUri(#[from] InvalidUri),
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    #[error(transparent)]
    HyperClient(#[from] hyper_util::client::legacy::Error),
}
