//! Request backend boundary.
//!
//! The pipeline only ever sees [`RequestOutcome`]: a requester must never
//! error past this boundary, so every transport or provider failure comes
//! back as `skip = true` with empty text and zero counts. The retry timer
//! and attempt ceiling live in the external scheduler, not here.

use crate::config::{ApiFormat, Platform};
use crate::prompt::WireMessage;
use anyhow::Result;
use log::warn;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Everything a round trip yields. `reasoning` carries chain-of-thought text
/// for providers that expose it; it is only used for reporting.
#[derive(Debug, Clone, Default)]
pub struct RequestOutcome {
    pub skip: bool,
    pub reasoning: String,
    pub result: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl RequestOutcome {
    pub fn skipped() -> Self {
        Self {
            skip: true,
            ..Self::default()
        }
    }
}

pub trait Requester: Send {
    fn request(&self, messages: &[WireMessage]) -> RequestOutcome;
}

#[derive(Debug, Error)]
enum RequestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned status {0}: {1}")]
    Status(u16, String),
    #[error("malformed provider reply: {0}")]
    Shape(&'static str),
}

/// Blocking HTTP requester speaking the OpenAI-compatible chat-completion
/// shape and the Google generateContent shape.
pub struct HttpRequester {
    client: reqwest::blocking::Client,
    platform: Platform,
}

impl HttpRequester {
    pub fn new(platform: Platform, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client, platform })
    }

    fn request_inner(&self, messages: &[WireMessage]) -> Result<RequestOutcome, RequestError> {
        match self.platform.api_format {
            ApiFormat::Google => self.request_google(messages),
            ApiFormat::OpenAi | ApiFormat::SakuraLlm => self.request_chat(messages),
        }
    }

    fn request_chat(&self, messages: &[WireMessage]) -> Result<RequestOutcome, RequestError> {
        let url = format!(
            "{}/chat/completions",
            self.platform.api_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.platform.model,
            "messages": messages,
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.platform.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        let payload: serde_json::Value = if status.is_success() {
            response.json()?
        } else {
            let text = response.text().unwrap_or_default();
            return Err(RequestError::Status(status.as_u16(), truncate(&text, 300)));
        };

        let message = payload
            .pointer("/choices/0/message")
            .ok_or(RequestError::Shape("missing choices[0].message"))?;
        let result = message
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or(RequestError::Shape("missing message content"))?
            .to_string();
        let reasoning = message
            .get("reasoning_content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(RequestOutcome {
            skip: false,
            reasoning,
            result,
            prompt_tokens: read_u64(&payload, "/usage/prompt_tokens"),
            completion_tokens: read_u64(&payload, "/usage/completion_tokens"),
        })
    }

    fn request_google(&self, messages: &[WireMessage]) -> Result<RequestOutcome, RequestError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.platform.api_url.trim_end_matches('/'),
            self.platform.model,
            self.platform.api_key,
        );

        let contents: Vec<serde_json::Value> = messages
            .iter()
            .map(|message| match message {
                WireMessage::Parts { role, parts } => {
                    // generateContent only accepts user/model turns.
                    let role = if role == "model" { "model" } else { "user" };
                    json!({ "role": role, "parts": [{ "text": parts }] })
                }
                WireMessage::Chat { content, .. } => {
                    json!({ "role": "user", "parts": [{ "text": content }] })
                }
            })
            .collect();

        let response = self
            .client
            .post(url)
            .json(&json!({ "contents": contents }))
            .send()?;

        let status = response.status();
        let payload: serde_json::Value = if status.is_success() {
            response.json()?
        } else {
            let text = response.text().unwrap_or_default();
            return Err(RequestError::Status(status.as_u16(), truncate(&text, 300)));
        };

        let parts = payload
            .pointer("/candidates/0/content/parts")
            .and_then(|v| v.as_array())
            .ok_or(RequestError::Shape("missing candidates[0].content.parts"))?;
        let result = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
            .collect::<String>();

        Ok(RequestOutcome {
            skip: false,
            reasoning: String::new(),
            result,
            prompt_tokens: read_u64(&payload, "/usageMetadata/promptTokenCount"),
            completion_tokens: read_u64(&payload, "/usageMetadata/candidatesTokenCount"),
        })
    }
}

impl Requester for HttpRequester {
    fn request(&self, messages: &[WireMessage]) -> RequestOutcome {
        match self.request_inner(messages) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    "request to {} failed, batch will be retried: {error}",
                    self.platform.name
                );
                RequestOutcome::skipped()
            }
        }
    }
}

fn read_u64(payload: &serde_json::Value, pointer: &str) -> u64 {
    payload.pointer(pointer).and_then(|v| v.as_u64()).unwrap_or(0)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}
