//! Mood and intent classification of a conversation turn.
//!
//! The model is asked for a strict JSON object; whatever comes back is read
//! leniently and anything unreadable becomes [`ClassifyOutcome::Fallback`].

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use tunechat_core::Message;
use tunechat_llm::{ChatModel, LlmError};

use crate::error::ChatError;
use crate::types::{ClassifyOutcome, IntentResult};

/// Genres the model may report.
pub const GENRE_VOCABULARY: [&str; 8] = [
    "pop",
    "rock",
    "bollywood",
    "lo-fi",
    "jazz",
    "classical",
    "hip-hop",
    "electronic",
];

static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("Invalid fenced-JSON regex")
});

static BRACE_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(\{.*\})").expect("Invalid brace-span regex"));

const PROMPT_HEAD: &str = r#"**Role**: You are a music recommendation expert specializing in mood analysis and contextual understanding.
**Task**: Analyze conversation history and latest message to determine if the user wants music recommendations.

**Instructions**:
1. Recommendation Trigger:
- Set `wants_recommendations` to True ONLY if:
    a) User explicitly requests music (e.g., "recommend songs", "make me a playlist")
    b) User implies musical need through context (e.g., "I need study music", "What should I listen to?")

2. Mood Detection:
- Analyze ENTIRE conversation history to determine emotional state
- Use these mood mappings (expand as needed):
    {
        "happy": ["joyful", "excited", "celebratory"],
        "sad": ["melancholic", "heartbroken", "gloomy"],
        "calm": ["relaxed", "peaceful", "meditative"],
        "energetic": ["pumped", "hyped", "adrenaline"]
    }

3. Entity Extraction:
- `genres`: ONLY include if explicitly mentioned in LATEST message (e.g., "rock", "lo-fi")
- `artists`: ONLY include if named in LATEST message (e.g., "Taylor Swift", "BTS")

**Examples**:

1. User message: "Can you suggest some upbeat pop songs?"
{
    "wants_recommendations": true,
    "mood": "happy",
    "genres": ["pop"],
    "artists": [],
    "response": "I'll find some upbeat pop tracks! Any specific artists or sub-genres you prefer?"
}

2. User message: "I just finished a workout"
Conversation history: "User mentioned feeling tired after work earlier"
{
    "wants_recommendations": false,
    "mood": "neutral",
    "genres": [],
    "artists": [],
    "response": "Great job on the workout! Would you like some energetic music to keep the momentum going?"
}

3. User message: "Play something like Radiohead"
{
    "wants_recommendations": true,
    "mood": "calm",
    "genres": [],
    "artists": ["Radiohead"],
    "response": "Creating a playlist with Radiohead's style. Shall I focus on their newer or older sound?"
}

**Output Format**: STRICTLY use this JSON structure:
{
    "wants_recommendations": boolean,
    "mood": string (from: happy/sad/calm/energetic/neutral),
    "genres": array[string] (ONLY explicit in latest message),
    "artists": array[string] (ONLY explicit in latest message),
    "response": string (natural language reply ALWAYS addressing latest message)
}
"#;

/// Build the classification prompt from the last `context_turns` history
/// entries and the latest message.
pub fn build_prompt(history: &[Message], latest: &str, context_turns: usize) -> String {
    let start = history.len().saturating_sub(context_turns);
    let history_text = history[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");

    let genres = GENRE_VOCABULARY
        .iter()
        .map(|g| format!("\"{}\"", g))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{PROMPT_HEAD}- `genres`: ONLY include if explicitly mentioned in LATEST message and must be one of the following: [{genres}]\n\
         **Current Analysis**:\n\
         Conversation History:\n\
         {history_text}\n\
         \n\
         Latest Message:\n\
         {latest}\n\
         \n\
         **Generate JSON Response**:\n"
    )
}

/// Locate the JSON candidate in a model reply: a ```` ```json ```` block, else
/// the span from the first `{` to the last `}`, else the whole text.
pub fn extract_json(text: &str) -> &str {
    if let Some(inner) = FENCED_JSON_RE.captures(text).and_then(|c| c.get(1)) {
        return inner.as_str();
    }
    if let Some(span) = BRACE_SPAN_RE.captures(text).and_then(|c| c.get(1)) {
        return span.as_str();
    }
    text
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Read an intent from parsed JSON. Only a non-object is rejected; every
/// field is coerced.
fn intent_from_value(value: &Value) -> Result<IntentResult, ChatError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ChatError::MalformedIntentJson("top-level value is not an object".into()))?;

    Ok(IntentResult {
        wants_recommendations: obj
            .get("wants_recommendations")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        mood: obj
            .get("mood")
            .and_then(Value::as_str)
            .unwrap_or("neutral")
            .to_string(),
        genres: string_list(obj.get("genres")),
        artists: string_list(obj.get("artists")),
        response: obj
            .get("response")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    })
}

/// Parse a model reply into an intent, falling back on unreadable output.
pub fn parse_intent(text: &str) -> ClassifyOutcome {
    let candidate = extract_json(text);
    let parsed = serde_json::from_str::<Value>(candidate)
        .map_err(|e| ChatError::MalformedIntentJson(e.to_string()))
        .and_then(|value| intent_from_value(&value));

    match parsed {
        Ok(intent) => {
            info!(
                wants_recommendations = intent.wants_recommendations,
                mood = %intent.mood,
                genres = ?intent.genres,
                artists = ?intent.artists,
                "Intent classified"
            );
            ClassifyOutcome::Parsed(intent)
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse JSON from classifier response");
            ClassifyOutcome::Fallback {
                intent: IntentResult::fallback(),
                reason: e.to_string(),
            }
        }
    }
}

/// Asks the model what the latest message wants.
pub struct IntentClassifier {
    model: Arc<dyn ChatModel>,
    context_turns: usize,
}

impl IntentClassifier {
    pub fn new(model: Arc<dyn ChatModel>, context_turns: usize) -> Self {
        Self {
            model,
            context_turns,
        }
    }

    /// Classify `latest` in the context of `history`.
    ///
    /// Only a failed model call is an error. Unreadable output, including a
    /// reply with no content at all, is a [`ClassifyOutcome::Fallback`].
    pub async fn classify(
        &self,
        history: &[Message],
        latest: &str,
    ) -> Result<ClassifyOutcome, ChatError> {
        let prompt = build_prompt(history, latest, self.context_turns);
        match self.model.chat(&prompt, &[]).await {
            Ok(reply) => Ok(parse_intent(&reply.content)),
            Err(LlmError::InvalidResponse(reason)) => {
                warn!(reason = %reason, "Unreadable classifier reply");
                Ok(ClassifyOutcome::Fallback {
                    intent: IntentResult::fallback(),
                    reason,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
