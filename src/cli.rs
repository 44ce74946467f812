//! Command-line interface definitions for the relay.
//!
//! Non-secret settings live in the optional YAML config; credentials are
//! read from flags or, more usually, from environment variables.

use clap::Parser;

/// Command-line arguments for the relay.
///
/// # Examples
///
/// ```sh
/// # Run forever with defaults, secrets from the environment
/// OPENAI_API_KEY=... WP_USERNAME=... WP_USERPASS=... haber_relay
///
/// # One cycle with a custom config
/// haber_relay --config relay.yaml --once
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the path of the published-items state file
    #[arg(long, env = "SEEN_PATH")]
    pub seen_path: Option<String>,

    /// Run a single poll cycle and exit
    #[arg(long)]
    pub once: bool,

    /// API key for the chat-completion service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// WordPress username
    #[arg(long, env = "WP_USERNAME")]
    pub wp_username: Option<String>,

    /// WordPress account password (XML-RPC)
    #[arg(long, env = "WP_USERPASS", hide_env_values = true)]
    pub wp_password: Option<String>,

    /// WordPress application password (REST fallback)
    #[arg(long, env = "WP_APPPASS", hide_env_values = true)]
    pub wp_app_password: Option<String>,
}
