//! Display projection of catalog tracks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fields of a track the chat page renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub name: String,
    /// Artist names joined with ", ".
    pub artist: String,
    pub album: String,
    pub image_url: String,
    pub preview_url: String,
    pub spotify_url: String,
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

impl TrackSummary {
    /// Project a raw track object. Missing nested fields become "", a missing
    /// name becomes "Unknown".
    pub fn from_json(track: &Value) -> Self {
        let name = track
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();

        let artist = track
            .get("artists")
            .and_then(Value::as_array)
            .map(|artists| {
                artists
                    .iter()
                    .map(|a| str_at(a, "/name"))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        Self {
            name,
            artist,
            album: str_at(track, "/album/name").to_string(),
            image_url: str_at(track, "/album/images/0/url").to_string(),
            preview_url: str_at(track, "/preview_url").to_string(),
            spotify_url: str_at(track, "/external_urls/spotify").to_string(),
        }
    }
}

/// Project the `tracks.items` of a search body, in catalog order.
pub fn tracks_from_search(body: &Value) -> Vec<TrackSummary> {
    body.pointer("/tracks/items")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(TrackSummary::from_json).collect())
        .unwrap_or_default()
}
