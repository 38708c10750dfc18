use serde::{Deserialize, Serialize};
use stepwise_model::{ModelMessage, ModelRequest, ResponseFormat};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
    #[serde(default)]
    pub thought: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub status: Option<String>,
}

impl GenerateContentChunk {
    /// Returns the visible text of the first candidate.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }

    #[inline]
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }

    #[inline]
    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref()?.block_reason.as_deref()
    }
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Part {
    text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(req: &ModelRequest) -> GenerateContentRequest {
    let generation_config = match req.response_format {
        ResponseFormat::Json => Some(GenerationConfig {
            response_mime_type: "application/json",
        }),
        ResponseFormat::Text => None,
    };
    GenerateContentRequest {
        contents: req.messages.iter().map(create_content).collect(),
        generation_config,
    }
}

#[inline]
fn create_content(msg: &ModelMessage) -> Content {
    let role = match msg {
        ModelMessage::User(_) => "user",
        ModelMessage::Model(_) => "model",
    };
    Content {
        role,
        parts: vec![Part {
            text: msg.text().to_owned(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::User("You work in steps.".to_owned()),
                ModelMessage::User("Input: hi\nOutput:".to_owned()),
                ModelMessage::Model("{\"step\":\"start\"}".to_owned()),
            ],
            response_format: ResponseFormat::Json,
        };
        let expected = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": "You work in steps." }] },
                { "role": "user", "parts": [{ "text": "Input: hi\nOutput:" }] },
                { "role": "model", "parts": [{ "text": "{\"step\":\"start\"}" }] }
            ],
            "generationConfig": { "responseMimeType": "application/json" }
        });
        assert_eq!(
            serde_json::to_value(create_request(&request)).unwrap(),
            expected
        );

        let text_request = ModelRequest {
            response_format: ResponseFormat::Text,
            ..request
        };
        let value = serde_json::to_value(create_request(&text_request)).unwrap();
        assert!(value.get("generationConfig").is_none());
    }

    #[test]
    fn test_parse_chunk() {
        let chunk: GenerateContentChunk = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "thinking...", "thought": true },
                        { "text": "{\"step\": " },
                        { "text": "\"plan\"}" }
                    ]
                },
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": { "promptTokenCount": 3 }
        }))
        .unwrap();
        assert_eq!(chunk.text().as_deref(), Some("{\"step\": \"plan\"}"));
        assert_eq!(chunk.finish_reason(), Some("STOP"));
        assert_eq!(chunk.block_reason(), None);

        let blocked: GenerateContentChunk = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        assert_eq!(blocked.text(), None);
        assert_eq!(blocked.block_reason(), Some("SAFETY"));
    }
}
