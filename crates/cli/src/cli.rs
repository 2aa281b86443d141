use clap::Parser;

/// Interactive chat against a team's LLM provider, with tool calling.
///
/// Runs the full reply pipeline locally: the API key is encrypted into an
/// in-memory credential store and decrypted per reply, exactly as a server
/// deployment would.
#[derive(Parser, Debug)]
#[command(name = "acacia-chat", about = "Streaming chat with tool calling")]
pub struct CliArgs {
    /// LLM provider to use: openai or anthropic
    #[arg(long, env = "ACACIA_PROVIDER", default_value = "openai")]
    pub provider: String,

    /// Model name (provider default if not set)
    #[arg(long, env = "ACACIA_MODEL")]
    pub model: Option<String>,

    /// Vendor API key for the selected provider
    #[arg(long, env = "ACACIA_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Team id the credential belongs to
    #[arg(long, default_value = "1")]
    pub team_id: i64,

    /// User id of the caller
    #[arg(long, default_value = "1")]
    pub user_id: i64,

    /// Also expose the demo issue-tracker tools
    #[arg(long)]
    pub issue_tools: bool,

    /// Override the maximum tool-calling rounds per reply
    #[arg(long)]
    pub max_rounds: Option<usize>,
}

impl CliArgs {
    pub fn model(&self) -> &str {
        match (&self.model, self.provider.as_str()) {
            (Some(model), _) => model,
            (None, "anthropic") => "claude-sonnet-4-20250514",
            (None, _) => "gpt-4o-mini",
        }
    }
}
