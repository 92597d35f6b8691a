// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent backed by an OpenAI-compatible chat-completions API.
//!
//! Each thread keeps its user and assistant turns in memory. A reply may take
//! several requests while the model calls tools; the last allowed round is
//! sent without tools so the model has to answer in text.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::tools::Toolset;
use super::{AgentService, EMPTY_REPLY, NOT_INITIALIZED_REPLY};
use crate::identity::ThreadKey;

const SYSTEM_PROMPT: &str = "You are DriveAssistant, an assistant that helps people manage \
their Google Drive files over WhatsApp. You have tools to list files, list a folder, search \
by name, type or content, read file metadata, and read file contents. Search first when the \
user refers to a file by name, then read it to answer questions about its contents. Keep \
replies short and suited to a chat message.";

const TEMPERATURE: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Without a key the agent answers every message with the not-initialized reply.
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub max_tool_rounds: u32,
    /// Threads remembered at once. Older threads are forgotten first.
    pub max_threads: usize,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl AssistantMessage {
    fn to_value(&self) -> Value {
        let mut message = json!({ "role": "assistant", "content": self.content });
        if !self.tool_calls.is_empty() {
            let calls: Vec<Value> = self
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": { "name": c.function.name, "arguments": c.function.arguments },
                    })
                })
                .collect();
            message["tool_calls"] = Value::Array(calls);
        }
        message
    }

    fn text(&self) -> Option<String> {
        self.content.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(str::to_owned)
    }
}

/// Per-thread turns, bounded by thread count in least-recently-used order.
#[derive(Default)]
struct History {
    threads: HashMap<String, Vec<Value>>,
    order: VecDeque<String>,
}

impl History {
    fn get(&self, thread: &str) -> Option<&Vec<Value>> {
        self.threads.get(thread)
    }

    /// Append turns to `thread`, mark it most recent, and evict past `cap`.
    fn record(&mut self, thread: &str, turns: impl IntoIterator<Item = Value>, cap: usize) {
        self.order.retain(|t| t != thread);
        self.order.push_back(thread.to_owned());
        self.threads.entry(thread.to_owned()).or_default().extend(turns);
        while self.order.len() > cap.max(1) {
            if let Some(oldest) = self.order.pop_front() {
                tracing::debug!(thread = %oldest, "forgetting conversation thread");
                self.threads.remove(&oldest);
            }
        }
    }

    fn clear(&mut self) {
        self.threads.clear();
        self.order.clear();
    }
}

pub struct OpenAiAgent {
    config: OpenAiConfig,
    http: reqwest::Client,
    tools: Arc<dyn Toolset>,
    history: Mutex<History>,
    started: AtomicBool,
}

impl OpenAiAgent {
    pub fn new(config: OpenAiConfig, tools: Arc<dyn Toolset>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            config,
            http,
            tools,
            history: Mutex::new(History::default()),
            started: AtomicBool::new(false),
        })
    }

    /// Number of turns remembered for a thread.
    pub async fn history_len(&self, thread: &ThreadKey) -> usize {
        self.history.lock().await.get(thread.as_str()).map_or(0, Vec::len)
    }

    /// Number of threads currently remembered.
    pub async fn thread_count(&self) -> usize {
        self.history.lock().await.threads.len()
    }

    async fn complete(
        &self,
        api_key: &str,
        messages: &[Value],
        tools: Option<&[Value]>,
    ) -> anyhow::Result<AssistantMessage> {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": TEMPERATURE,
        });
        if let Some(tools) = tools {
            body["tools"] = Value::from(tools.to_vec());
        }

        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        let resp = self.http.post(url).bearer_auth(api_key).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("chat completion failed ({status}): {text}");
        }
        let completion: ChatCompletion = resp.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow::anyhow!("chat completion returned no choices"))
    }

    /// Run the tool loop over `messages`, appending every exchanged message.
    /// Returns the final assistant text, if any.
    async fn run(&self, api_key: &str, messages: &mut Vec<Value>) -> anyhow::Result<Option<String>> {
        let definitions = self.tools.definitions();
        let max_rounds = self.config.max_tool_rounds;

        for round in 0..=max_rounds {
            let offer = (round < max_rounds && !definitions.is_empty()).then_some(definitions.as_slice());
            let reply = self.complete(api_key, messages, offer).await?;
            messages.push(reply.to_value());

            if reply.tool_calls.is_empty() {
                return Ok(reply.text());
            }
            for call in &reply.tool_calls {
                tracing::debug!(tool = %call.function.name, round, "running tool");
                let output = self.tools.call(&call.function.name, &call.function.arguments).await;
                messages.push(json!({ "role": "tool", "tool_call_id": call.id, "content": output }));
            }
        }

        tracing::warn!(max_rounds, "tool rounds exhausted without a text reply");
        Ok(None)
    }
}

#[async_trait]
impl AgentService for OpenAiAgent {
    async fn start(&self) -> anyhow::Result<()> {
        if self.config.api_key.is_none() {
            tracing::warn!("no model API key configured; agent will not answer");
        }
        self.started.store(true, Ordering::Release);
        tracing::info!(
            model = %self.config.model,
            tools = self.tools.definitions().len(),
            "agent started"
        );
        Ok(())
    }

    async fn stop(&self) {
        self.started.store(false, Ordering::Release);
        self.history.lock().await.clear();
        tracing::info!("agent stopped");
    }

    async fn process(&self, message: &str, thread: &ThreadKey) -> String {
        let api_key = match self.config.api_key {
            Some(ref key) if self.started.load(Ordering::Acquire) => key.clone(),
            _ => return NOT_INITIALIZED_REPLY.to_owned(),
        };

        let past = self.history.lock().await.get(thread.as_str()).cloned().unwrap_or_default();
        let mut messages = Vec::with_capacity(past.len() + 2);
        messages.push(json!({ "role": "system", "content": SYSTEM_PROMPT }));
        messages.extend(past);
        messages.push(json!({ "role": "user", "content": message }));

        match self.run(&api_key, &mut messages).await {
            Ok(Some(text)) => {
                self.history.lock().await.record(
                    thread.as_str(),
                    [
                        json!({ "role": "user", "content": message }),
                        json!({ "role": "assistant", "content": text }),
                    ],
                    self.config.max_threads,
                );
                text
            }
            Ok(None) => EMPTY_REPLY.to_owned(),
            Err(e) => {
                tracing::error!(thread = %thread, err = %e, "agent failed");
                format!("Error: {e}")
            }
        }
    }
}

#[cfg(test)]
#[path = "openai_tests.rs"]
mod tests;
