//! Search-query construction from a classified mood and the user's taste.

use serde_json::Value;

/// Moods passed through to the search query. Compared case-insensitively.
pub const KNOWN_MOODS: [&str; 12] = [
    "happy",
    "sad",
    "energetic",
    "relaxed",
    "calm",
    "excited",
    "peaceful",
    "angry",
    "romantic",
    "melancholy",
    "upbeat",
    "chill",
];

/// Substituted for any mood outside [`KNOWN_MOODS`].
pub const DEFAULT_MOOD: &str = "chill";

/// `mood` unchanged if recognized, else [`DEFAULT_MOOD`].
///
/// A recognized mood keeps its casing, so "Romantic" stays "Romantic".
pub fn normalize_mood(mood: &str) -> &str {
    let lower = mood.to_lowercase();
    if KNOWN_MOODS.contains(&lower.as_str()) {
        mood
    } else {
        DEFAULT_MOOD
    }
}

/// Build a search query: the mood token, then `artist:<name>` for the second
/// of the user's top three artists when there is one.
///
/// `_top_tracks` is accepted for symmetry with the data fetched and is not
/// used.
pub fn build(mood: &str, top_artists: &[Value], _top_tracks: &[Value]) -> String {
    let names: Vec<&str> = top_artists
        .iter()
        .take(3)
        .map(|artist| artist.get("name").and_then(Value::as_str).unwrap_or(""))
        .collect();

    let mut parts = vec![normalize_mood(mood).to_string()];
    if let Some(name) = names.get(1) {
        parts.push(format!("artist:{}", name));
    }
    parts.join(" ")
}

/// Append `genre:<first>` when any genre was requested.
pub fn with_genre(query: &str, genres: &[String]) -> String {
    match genres.first() {
        Some(genre) => format!("{} genre:{}", query, genre),
        None => query.to_string(),
    }
}
