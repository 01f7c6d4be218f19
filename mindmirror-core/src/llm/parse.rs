//! Reply envelope handling.
//!
//! The service wraps generated text as
//! `candidates[0].content.parts[0].text`. A `promptFeedback.blockReason`
//! anywhere in the envelope means the content was withheld.

use crate::error::{Error, Result};
use crate::format::log_preview;
use serde_json::Value;

/// Shape the caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// A JSON document
    Structured,
    /// Plain text, returned unchanged
    Freeform,
}

/// Parsed reply, matching the requested [`ResponseFormat`].
#[derive(Debug, Clone, PartialEq)]
pub enum LlmReply {
    Structured(Value),
    Freeform(String),
}

impl LlmReply {
    pub fn into_structured(self) -> Option<Value> {
        match self {
            LlmReply::Structured(value) => Some(value),
            LlmReply::Freeform(_) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            LlmReply::Freeform(text) => Some(text),
            LlmReply::Structured(_) => None,
        }
    }
}

/// Decode a successful response body into the requested shape.
pub fn parse_reply(body: &str, format: ResponseFormat) -> Result<LlmReply> {
    let envelope: Value = serde_json::from_str(body)?;
    let text = reply_text(&envelope)?;

    match format {
        ResponseFormat::Freeform => Ok(LlmReply::Freeform(text.to_string())),
        ResponseFormat::Structured => parse_structured(text).map(LlmReply::Structured),
    }
}

/// Locate the generated text, rejecting moderated replies.
pub fn reply_text(envelope: &Value) -> Result<&str> {
    if let Some(reason) = envelope
        .pointer("/promptFeedback/blockReason")
        .filter(|v| !v.is_null())
    {
        let reason = reason.as_str().map(str::to_string).unwrap_or_else(|| reason.to_string());
        return Err(Error::Llm(format!("reply blocked: {reason}")));
    }

    envelope
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::Llm(format!(
                "reply missing candidates[0].content.parts[0].text: {}",
                log_preview(&envelope.to_string(), 200)
            ))
        })
}

/// Decode `text` as JSON directly, else from its first fenced code block.
pub fn parse_structured(text: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value) => Ok(value),
        Err(direct_err) => {
            tracing::debug!(error = %direct_err, "Reply is not raw JSON, looking for fenced block");
            let block = first_fenced_block(text).ok_or_else(|| {
                Error::Llm(format!(
                    "reply is neither JSON nor a fenced JSON block: {}",
                    log_preview(text, 200)
                ))
            })?;
            serde_json::from_str(block).map_err(|e| {
                Error::Llm(format!(
                    "fenced block is not valid JSON ({e}): {}",
                    log_preview(block, 200)
                ))
            })
        }
    }
}

/// Contents of the first ```` ``` ```` block, minus an optional language tag.
fn first_fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    let tag_len = after
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    let body = &after[tag_len..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}
