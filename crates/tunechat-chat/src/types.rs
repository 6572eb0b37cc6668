use serde::{Deserialize, Serialize};

use tunechat_catalog::TrackSummary;

/// The classifier's structured reading of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentResult {
    pub wants_recommendations: bool,
    /// Expected to be happy/sad/calm/energetic/neutral, not validated.
    pub mood: String,
    pub genres: Vec<String>,
    pub artists: Vec<String>,
    /// Natural-language reply to the latest message.
    pub response: String,
}

impl IntentResult {
    pub const FALLBACK_RESPONSE: &'static str =
        "I'm not sure what you're asking. Can you clarify?";

    /// Used whenever the model's output cannot be read.
    pub fn fallback() -> Self {
        Self {
            wants_recommendations: false,
            mood: "neutral".to_string(),
            genres: Vec::new(),
            artists: Vec::new(),
            response: Self::FALLBACK_RESPONSE.to_string(),
        }
    }
}

/// Outcome of classifying a turn. Malformed output is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyOutcome {
    Parsed(IntentResult),
    Fallback { intent: IntentResult, reason: String },
}

impl ClassifyOutcome {
    pub fn intent(&self) -> &IntentResult {
        match self {
            ClassifyOutcome::Parsed(intent) => intent,
            ClassifyOutcome::Fallback { intent, .. } => intent,
        }
    }

    pub fn into_intent(self) -> IntentResult {
        match self {
            ClassifyOutcome::Parsed(intent) => intent,
            ClassifyOutcome::Fallback { intent, .. } => intent,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ClassifyOutcome::Fallback { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicRecommendations {
    pub tracks: Vec<TrackSummary>,
    pub mood: String,
    pub genres: Vec<String>,
}

/// Body returned for every chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    /// Whether the page should type the reply out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_recommendations: Option<MusicRecommendations>,
}

impl ChatReply {
    pub fn plain(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            animate: None,
            music_recommendations: None,
        }
    }

    pub fn animated(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            animate: Some(true),
            music_recommendations: None,
        }
    }

    pub fn with_recommendations(mut self, recommendations: MusicRecommendations) -> Self {
        self.music_recommendations = Some(recommendations);
        self
    }
}
