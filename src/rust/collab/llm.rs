// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Language-model collaborator
//!
//! Proposes subdomain splits for bound questions. Answers are only trusted
//! once two consecutive attempts agree exactly.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::{BoundQuestion, Expr};
use crate::parser::parse_conjunction;

/// Text-in/text-out model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Single-shot completion
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Completion delivered as text increments
    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>>;
}

/// Bounded polling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusPolicy {
    pub max_attempts: usize,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        ConsensusPolicy { max_attempts: 15 }
    }
}

/// Ask repeatedly until two consecutive trimmed answers are identical
///
/// Returns `None` when `max_attempts` answers pass without agreement.
pub async fn poll_consensus<M: LanguageModel + ?Sized>(
    model: &M,
    prompt: &str,
    policy: &ConsensusPolicy,
) -> Result<Option<String>> {
    let mut previous: Option<String> = None;
    for attempt in 1..=policy.max_attempts {
        let chunks: Vec<String> = model
            .stream(prompt)
            .await
            .with_context(|| format!("Language model request {} failed", attempt))?
            .collect::<Vec<Result<String>>>()
            .await
            .into_iter()
            .collect::<Result<_>>()?;
        let answer = chunks.concat().trim().to_string();
        debug!("Consensus attempt {}: {:?}", attempt, answer);

        if previous.as_deref() == Some(answer.as_str()) {
            info!("Consensus reached after {} attempts", attempt);
            return Ok(Some(answer));
        }
        previous = Some(answer);
    }
    warn!("No consensus after {} attempts", policy.max_attempts);
    Ok(None)
}

/// Items of the first top-level `[...]` list in `text`
///
/// Brackets inside items (`Log[y]`) and parentheses are respected.
pub fn parse_bracketed_list(text: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let Some(open) = chars.iter().enumerate().position(|(i, (_, c))| {
        *c == '[' && (i == 0 || !(chars[i - 1].1.is_alphanumeric() || chars[i - 1].1 == '_'))
    }) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = chars[open].0 + 1;
    for &(pos, c) in &chars[open + 1..] {
        match c {
            '[' | '(' | '{' => depth += 1,
            ']' if depth == 0 => {
                items.push(text[start..pos].trim().to_string());
                break;
            }
            ']' | ')' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(text[start..pos].trim().to_string());
                start = pos + 1;
            }
            _ => {}
        }
    }
    items.retain(|item| !item.is_empty());
    items
}

/// Prompt asking for a minimal split of the question's domain
pub fn subdomain_prompt(question: &BoundQuestion) -> String {
    let domain: Vec<String> = question.domain.iter().map(Expr::to_wolfram).collect();
    format!(
        "<rules>
  - Be precise, avoid conflicting instructions
  - Use natural subdomains so the inequality proof is trivial on each
  - Minimize the number of subdomains
  - Output only the subdomains, no extra words or symbols
  - Use only <=, >=, <, >, &&, Log[], Exp[] in the output
</rules>

<task>
  Given domain: {}
  Inequality: {} <= C*({}) for some constant C > 0
  Find minimal subdomains that make the inequality trivial
</task>

<output_format>
  [subdomain1, subdomain2, ...] where each subdomain joins its conditions with &&
</output_format>
",
        domain.join(", "),
        question.lhs.to_wolfram(),
        question.rhs.to_wolfram()
    )
}

/// Subdomains the model agrees on, each as a list of conditions
pub async fn suggest_subdomains<M: LanguageModel + ?Sized>(
    model: &M,
    question: &BoundQuestion,
    policy: &ConsensusPolicy,
) -> Result<Option<Vec<Vec<Expr>>>> {
    let Some(answer) = poll_consensus(model, &subdomain_prompt(question), policy).await? else {
        return Ok(None);
    };
    let items = parse_bracketed_list(&answer);
    if items.is_empty() {
        bail!("Language model answer has no subdomain list: {:?}", answer);
    }
    let subdomains = items
        .iter()
        .map(|item| parse_conjunction(item).with_context(|| format!("Unparseable subdomain {:?}", item)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(subdomains))
}

/// Gemini REST client settings
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_ms: u64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        GeminiConfig {
            api_key: api_key.into(),
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.2,
            max_output_tokens: 1024,
            timeout_ms: 60_000,
        }
    }

    /// Key from `GOOGLE_API_KEY`, then `GEMINI_API_KEY`
    pub fn from_env() -> Result<Self> {
        std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map(Self::new)
            .map_err(|_| anyhow!("Missing API key. Set GOOGLE_API_KEY or GEMINI_API_KEY"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default()
    }
}

/// Google Gemini over its REST API
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(GeminiClient { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn request<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }

    async fn post(&self, method: &str, query: &[(&str, &str)], prompt: &str) -> Result<reqwest::Response> {
        let url = format!("{}/models/{}:{}", self.config.base_url, self.config.model, method);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .query(query)
            .json(&self.request(prompt))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.config.base_url))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini returned {}: {}", status, body.trim());
        }
        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response: GenerateResponse = self
            .post("generateContent", &[], prompt)
            .await?
            .json()
            .await
            .context("Malformed Gemini response")?;
        Ok(response.text())
    }

    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        let response = self.post("streamGenerateContent", &[("alt", "sse")], prompt).await?;
        let body = response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())).boxed();
        Ok(sse_text_stream(body))
    }
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

/// Text increments from a server-sent-events body
fn sse_text_stream(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> BoxStream<'static, Result<String>> {
    let state = SseState {
        body,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.pending.pop_front() {
                return Some((Ok(text), st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    st.buffer.extend_from_slice(&bytes);
                    drain_events(&mut st.buffer, &mut st.pending);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(anyhow!(e).context("Gemini stream interrupted")), st));
                }
                None => {
                    st.finished = true;
                    st.buffer.push(b'\n');
                    drain_events(&mut st.buffer, &mut st.pending);
                }
            }
        }
    })
    .boxed()
}

/// Move every complete `data:` line out of `buffer`
fn drain_events(buffer: &mut Vec<u8>, pending: &mut VecDeque<String>) {
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        let Some(data) = line.trim().strip_prefix("data:") else {
            continue;
        };
        match serde_json::from_str::<GenerateResponse>(data.trim()) {
            Ok(event) => {
                let text = event.text();
                if !text.is_empty() {
                    pending.push_back(text);
                }
            }
            Err(e) => debug!("Skipping unparseable stream event: {}", e),
        }
    }
}
