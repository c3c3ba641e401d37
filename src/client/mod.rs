// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Terminal chat client for a running `serve` instance
//!
//! Keeps an in-memory history of turns for the session. A question whose
//! request fails stays in the history as a user turn with no reply.

use crate::api::query::{QueryRequest, QueryResponse};
use crate::api::ErrorResponse;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://127.0.0.1:8000`
    pub base_url: String,
    pub top_k: usize,
    pub show_context: bool,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            top_k: 5,
            show_context: false,
            // Beam search over long contexts can take a while on CPU
            timeout: Duration::from_secs(300),
        }
    }
}

pub struct ChatSession {
    http: reqwest::Client,
    config: ClientConfig,
    history: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            config,
            history: Vec::new(),
        })
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn query_url(&self) -> String {
        format!("{}/query/", self.config.base_url.trim_end_matches('/'))
    }

    /// Sends one question and records the turns
    ///
    /// The user turn is always recorded. The assistant turn is recorded only
    /// when the server answered successfully.
    pub async fn ask(&mut self, question: &str) -> Result<QueryResponse> {
        self.history.push(ChatTurn::user(question));

        let request = QueryRequest::new(question).with_top_k(self.config.top_k);
        let response = self
            .http
            .post(self.query_url())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.config.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.detail)
                .unwrap_or(body);
            anyhow::bail!("Server returned {}: {}", status, detail);
        }

        let answer: QueryResponse = response
            .json()
            .await
            .context("Failed to parse server response")?;
        debug!("Received answer with {} chars of context", answer.context.len());

        self.history.push(ChatTurn::assistant(answer.response.clone()));
        Ok(answer)
    }

    /// Reads questions line by line until EOF or `exit`/`quit`
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        output
            .write_all(b"Ask a healthcare question (type 'exit' to quit).\n> ")
            .await?;
        output.flush().await?;

        while let Some(line) = lines.next_line().await? {
            let question = line.trim();
            if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
                break;
            }
            if !question.is_empty() {
                let rendered = match self.ask(question).await {
                    Ok(answer) => render_answer(&answer, self.config.show_context),
                    Err(e) => format!("Error: {:#}\n", e),
                };
                output.write_all(rendered.as_bytes()).await?;
            }
            output.write_all(b"> ").await?;
            output.flush().await?;
        }
        Ok(())
    }
}

/// Formats an answer for the terminal
pub fn render_answer(answer: &QueryResponse, show_context: bool) -> String {
    let mut out = format!("Assistant: {}\n", answer.response);
    if show_context {
        out.push_str("--- context ---\n");
        out.push_str(&answer.context);
        out.push_str("\n---------------\n");
    }
    out
}
