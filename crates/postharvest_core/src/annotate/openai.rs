//! Chat-completion backed [`Annotator`].

use super::{AnnotateError, AnnotateResult, Annotator};
use crate::config::AnnotationConfig;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a senior data engineering and lakehouse architecture specialist. \
Write CONCISE, technical summaries. \
Rules: direct language, no marketing, no emojis, no generic introductions. \
Focus on the problem addressed, the key concepts and the practical impact. \
Be brief and objective; prefer quality over quantity.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiAnnotator {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_chars: usize,
}

impl OpenAiAnnotator {
    pub fn new(settings: &AnnotationConfig) -> AnnotateResult<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(AnnotateError::MissingApiKey);
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        info!(
            "event=annotator_init module=annotate status=ok model={}",
            settings.model
        );
        Ok(Self {
            http,
            api_key: settings.api_key.trim().to_string(),
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_chars: settings.max_chars,
        })
    }

    fn headers(&self) -> AnnotateResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| AnnotateError::MissingApiKey)?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

impl Annotator for OpenAiAnnotator {
    fn annotate(&self, permalink: &str) -> AnnotateResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(permalink, self.max_chars),
                },
            ],
        };

        debug!(
            "event=completion_request module=annotate status=start model={} permalink={}",
            self.model, permalink
        );
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .headers(self.headers()?)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(
                "event=completion_request module=annotate status=error http_status={} permalink={}",
                status.as_u16(),
                permalink
            );
            return Err(AnnotateError::Api {
                status: status.as_u16(),
                body: crate::logging::single_line(&body, 200),
            });
        }

        let parsed: ChatResponse = response.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AnnotateError::EmptyResponse)
    }
}

fn user_prompt(permalink: &str, max_chars: usize) -> String {
    format!(
        "Read the post: {permalink}\n\n\
         Write a CONCISE summary of at most {max_chars} characters (this limit is MANDATORY).\n\n\
         Structure:\n\
         1. Context (1-2 sentences): which problem does the post address?\n\
         2. Key points (3-5 short bullets): the main concepts and good practices\n\
         3. Impact (1-2 sentences): practical implications for data projects\n\n\
         Rules: be direct, no introductions, no marketing, no emojis. \
         Favour information density; every sentence must add value."
    )
}
