use std::path::PathBuf;

use clap::Parser;

/// Switchboard LLM gateway
#[derive(Debug, Parser)]
#[command(name = "switchboard", about = "Send one chat completion through the switchboard gateway")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchboard.toml", env = "SWITCHBOARD_CONFIG")]
    pub config: PathBuf,

    /// Model alias or `provider/model` identifier
    #[arg(short, long, env = "SWITCHBOARD_MODEL")]
    pub model: String,

    /// System prompt sent ahead of the user message
    #[arg(short, long)]
    pub system: Option<String>,

    /// Print deltas as they arrive instead of waiting for the full reply
    #[arg(long)]
    pub stream: bool,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Use a specific configured key instead of the provider's first one
    #[arg(long)]
    pub key_id: Option<String>,

    /// User message
    pub prompt: String,
}
