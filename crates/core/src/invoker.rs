//! Rewrite invocation: prompt building, the model request body, and
//! validation of what the model sends back.

use serde::{Deserialize, Serialize};

use crate::{InvocationError, ModelRuntime};

/// Request schema version the Anthropic models on Bedrock expect.
pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
/// Longest rewrite accepted, in characters.
pub const MAX_REWRITE_CHARS: usize = 300;
const MAX_TOKENS: u32 = 100;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// JSON body sent to the inference API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteRequest {
    pub anthropic_version: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// A typed block in the model response. Non-text blocks carry no `text`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

pub fn build_prompt(fact: &str) -> String {
    format!(
        "Take this cloud computing fact and make it fun and engaging in \
         1-2 sentences maximum. Keep it short and witty: {fact}"
    )
}

/// Pull a usable rewrite out of a parsed response.
///
/// The first `text` block with non-empty text is the candidate. It is
/// trimmed, then rejected if it is blank or longer than `max_chars`.
pub fn extract_rewrite(
    response: &ModelResponse,
    max_chars: usize,
) -> Result<String, InvocationError> {
    let candidate = response
        .content
        .iter()
        .filter(|b| b.kind == "text")
        .find_map(|b| b.text.as_deref().filter(|t| !t.is_empty()))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(InvocationError::NoText)?;

    let len = candidate.chars().count();
    if len > max_chars {
        return Err(InvocationError::TooLong {
            len,
            max: max_chars,
        });
    }
    Ok(candidate.to_string())
}

/// Serialize a request body. Failures are kept apart from response parsing.
fn encode_request<T: Serialize>(request: &T) -> Result<Vec<u8>, InvocationError> {
    serde_json::to_vec(request).map_err(InvocationError::EncodeRequest)
}

/// Sends one single-turn rewrite request per fact.
pub struct Rewriter<R> {
    runtime: R,
    max_tokens: u32,
    temperature: f32,
    max_chars: usize,
}

impl<R: ModelRuntime> Rewriter<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            max_chars: MAX_REWRITE_CHARS,
        }
    }

    pub fn request_for(&self, fact: &str) -> RewriteRequest {
        RewriteRequest {
            anthropic_version: ANTHROPIC_VERSION.to_string(),
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(fact),
            }],
            temperature: self.temperature,
        }
    }

    /// Ask `model_id` to rewrite `fact`. Never retries; the transport does.
    pub async fn rewrite(&self, model_id: &str, fact: &str) -> Result<String, InvocationError> {
        let body = encode_request(&self.request_for(fact))?;
        let raw = self.runtime.invoke_model(model_id, body).await?;
        let response: ModelResponse = serde_json::from_slice(&raw)?;
        extract_rewrite(&response, self.max_chars)
    }
}
