// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Args;
use std::time::Duration;
use tokio::io::BufReader;

use crate::client::{ChatSession, ClientConfig};

/// Arguments for ask command
#[derive(Args, Debug)]
pub struct AskArgs {
    /// Server root URL
    #[arg(long, env = "MEDRAG_URL", default_value = "http://127.0.0.1:8000")]
    pub url: String,

    /// Records retrieved per question
    #[arg(long, default_value_t = 5)]
    pub top_k: usize,

    /// Print the context each answer was based on
    #[arg(long)]
    pub show_context: bool,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,
}

pub async fn ask(args: AskArgs) -> Result<()> {
    let mut session = ChatSession::new(ClientConfig {
        base_url: args.url,
        top_k: args.top_k,
        show_context: args.show_context,
        timeout: Duration::from_secs(args.timeout_secs),
    })?;
    session
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}
