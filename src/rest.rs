//! The node's REST API, used for loading tracks.

use bytes::Bytes;
use crate::nodes::NodeConfig;
use crate::track::LoadResponse;
use crate::Error;
use http::header::AUTHORIZATION;
use http::{Request, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

pub(crate) struct RestClient {
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl RestClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    /// Requests `/loadtracks` from the node with the given identifier, which
    /// may be a URL or a search query such as `ytsearch:...`.
    ///
    /// A `null` body resolves to `None`.
    pub async fn load_tracks(
        &self,
        node: &NodeConfig,
        identifier: &str,
    ) -> Result<Option<LoadResponse>, Error> {
        let uri = load_tracks_uri(node, identifier)?;
        debug!("Loading tracks from {}", uri);

        let request = Request::get(uri)
            .header(AUTHORIZATION, node.password.as_str())
            .body(Empty::new())?;

        let response = self.client.request(request).await?;

        if !response.status().is_success() {
            return Err(Error::SearchStatus(response.status()));
        }

        let body = response.into_body().collect().await?.to_bytes();

        serde_json::from_slice(&body).map_err(From::from)
    }
}

fn load_tracks_uri(node: &NodeConfig, identifier: &str) -> Result<Uri, Error> {
    let uri = format!(
        "http://{}:{}/loadtracks?identifier={}",
        node.host,
        node.rest_port,
        utf8_percent_encode(identifier, NON_ALPHANUMERIC),
    );

    uri.parse().map_err(From::from)
}
