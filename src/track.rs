//! Normalization of a node's `/loadtracks` response into [`TrackResultSet`]s.
//!
//! Nodes answer in one of two shapes. Older nodes reply with a bare array of
//! tracks; newer nodes wrap the tracks in an object discriminated by
//! `loadType`. Both are parsed by [`LoadResponse`] and collapsed into a single
//! intermediate [`LoadedTracks`] before any [`Track`] is built.
//!
//! [`LoadResponse`]: enum.LoadResponse.html
//! [`LoadedTracks`]: struct.LoadedTracks.html
//! [`Track`]: struct.Track.html
//! [`TrackResultSet`]: struct.TrackResultSet.html

use serde::{Deserialize, Serialize};

/// A track as returned by the node.
#[derive(Clone, Debug, Deserialize)]
pub struct RawTrack {
    pub track: String,
    pub info: RawTrackInfo,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    pub length: u64,
    pub is_stream: bool,
    pub title: String,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlaylistInfo {
    #[serde(default)]
    pub name: Option<String>,
}

/// Either wire shape of a `/loadtracks` response body.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum LoadResponse {
    Legacy(Vec<RawTrack>),
    Versioned(VersionedLoad),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "loadType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionedLoad {
    TrackLoaded {
        #[serde(default)]
        tracks: Vec<RawTrack>,
    },
    #[serde(rename_all = "camelCase")]
    PlaylistLoaded {
        #[serde(default)]
        playlist_info: PlaylistInfo,
        #[serde(default)]
        tracks: Vec<RawTrack>,
    },
    SearchResult {
        #[serde(default)]
        tracks: Vec<RawTrack>,
    },
    NoMatches,
    #[serde(alias = "LOAD_FAILED")]
    LoadError,
}

/// The canonical shape both wire formats are reduced to.
#[derive(Clone, Debug, Default)]
pub struct LoadedTracks {
    pub name: Option<String>,
    pub tracks: Vec<RawTrack>,
}

impl LoadResponse {
    /// Reduces the response to its canonical shape, or `None` when nothing
    /// was loaded.
    pub fn into_loaded(self) -> Option<LoadedTracks> {
        match self {
            LoadResponse::Legacy(tracks) => {
                if tracks.is_empty() {
                    return None;
                }

                Some(LoadedTracks { name: None, tracks })
            },
            LoadResponse::Versioned(load) => match load {
                VersionedLoad::TrackLoaded { tracks }
                | VersionedLoad::SearchResult { tracks } => Some(LoadedTracks { name: None, tracks }),
                VersionedLoad::PlaylistLoaded { playlist_info, tracks } => Some(LoadedTracks {
                    name: playlist_info.name,
                    tracks,
                }),
                VersionedLoad::NoMatches | VersionedLoad::LoadError => None,
            },
        }
    }

    pub fn into_result(self) -> Option<TrackResultSet> {
        self.into_loaded().map(TrackResultSet::from)
    }
}

/// A normalized track.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// The base64 handle used to play the track.
    pub track: String,
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// The duration as a clock string, e.g. `"03:25"`.
    pub length: String,
    pub length_ms: u64,
    pub is_stream: bool,
    pub title: String,
    pub uri: Option<String>,
}

impl From<RawTrack> for Track {
    fn from(raw: RawTrack) -> Self {
        let RawTrack { track, info } = raw;

        Self {
            length: format_duration(info.length),
            length_ms: info.length,
            identifier: info.identifier,
            is_seekable: info.is_seekable,
            author: info.author,
            is_stream: info.is_stream,
            title: info.title,
            uri: info.uri,
            track,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TrackResultSet {
    /// The playlist name, set only when the node loaded a playlist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub tracks: Vec<Track>,
}

impl From<LoadedTracks> for TrackResultSet {
    fn from(loaded: LoadedTracks) -> Self {
        Self {
            name: loaded.name,
            tracks: loaded.tracks.into_iter().map(Track::from).collect(),
        }
    }
}

/// Normalizes a raw response body. A `None` body (JSON `null`) is a miss.
pub fn normalize(response: Option<LoadResponse>) -> Option<TrackResultSet> {
    response.and_then(LoadResponse::into_result)
}

/// Formats milliseconds as `HH:MM:SS`, dropping the hours when zero and the
/// minutes when both they and the hours are zero.
pub fn format_duration(ms: u64) -> String {
    let total = ms / 1000;
    let seconds = total % 60;
    let minutes = (total / 60) % 60;
    let hours = total / 3600;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{:02}:{:02}", minutes, seconds)
    } else {
        format!("{:02}", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn raw(identifier: &str, length: u64) -> Value {
        json!({
            "track": format!("QAAA{}", identifier),
            "info": {
                "identifier": identifier,
                "isSeekable": true,
                "author": "Rick Astley",
                "length": length,
                "isStream": false,
                "position": 0,
                "title": "Never Gonna Give You Up",
                "uri": format!("https://www.youtube.com/watch?v={}", identifier)
            }
        })
    }

    fn parse(body: Value) -> Option<TrackResultSet> {
        normalize(serde_json::from_value(body).unwrap())
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(0), "00");
        assert_eq!(format_duration(5_000), "05");
        assert_eq!(format_duration(45_000), "45");
        assert_eq!(format_duration(59_999), "59");
        assert_eq!(format_duration(60_000), "01:00");
        assert_eq!(format_duration(65_000), "01:05");
        assert_eq!(format_duration(90_000), "01:30");
        assert_eq!(format_duration(3_599_999), "59:59");
        assert_eq!(format_duration(3_600_000), "01:00:00");
        assert_eq!(format_duration(3_665_000), "01:01:05");
    }

    #[test]
    fn legacy_empty_and_null_are_misses() {
        assert_eq!(parse(json!([])), None);
        assert_eq!(parse(Value::Null), None);
    }

    #[test]
    fn legacy_array_is_normalized() {
        let result = parse(json!([raw("dQw4w9WgXcQ", 212_000)])).unwrap();

        assert_eq!(result.name, None);
        assert_eq!(result.tracks.len(), 1);
        assert_eq!(result.tracks[0].track, "QAAAdQw4w9WgXcQ");
        assert_eq!(result.tracks[0].length, "03:32");
        assert_eq!(result.tracks[0].length_ms, 212_000);
    }

    #[test]
    fn versioned_misses_and_failures_are_null() {
        assert_eq!(parse(json!({"loadType": "NO_MATCHES", "tracks": []})), None);
        assert_eq!(parse(json!({"loadType": "LOAD_ERROR"})), None);
        assert_eq!(
            parse(json!({"loadType": "LOAD_FAILED", "exception": {"message": "blocked"}, "tracks": []})),
            None,
        );
    }

    #[test]
    fn versioned_track_and_search_results() {
        let loaded = parse(json!({"loadType": "TRACK_LOADED", "tracks": [raw("a", 5_000)]})).unwrap();
        let searched = parse(json!({
            "loadType": "SEARCH_RESULT",
            "playlistInfo": {},
            "tracks": [raw("a", 5_000), raw("b", 65_000)]
        }))
        .unwrap();

        assert_eq!(loaded.name, None);
        assert_eq!(loaded.tracks.len(), 1);
        assert_eq!(loaded.tracks[0].length, "05");
        assert_eq!(searched.tracks.len(), 2);
        assert_eq!(searched.tracks[1].identifier, "b");
    }

    #[test]
    fn versioned_playlist_keeps_name_and_order() {
        let t1 = raw("first", 1_000);
        let t2 = raw("second", 2_000);
        let result = parse(json!({
            "loadType": "PLAYLIST_LOADED",
            "playlistInfo": {"name": "X", "selectedTrack": -1},
            "tracks": [t1.clone(), t2.clone()]
        }))
        .unwrap();

        let expected: Vec<Track> = vec![t1, t2]
            .into_iter()
            .map(|t| Track::from(serde_json::from_value::<RawTrack>(t).unwrap()))
            .collect();

        assert_eq!(result.name.as_deref(), Some("X"));
        assert_eq!(result.tracks, expected);
    }
}
