use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub llm: LlmConfig,
    pub orchestration: OrchestrationConfig,
    pub encryption: EncryptionConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ACACIA_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("ACACIA_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            llm: LlmConfig::from_env_profiled(p),
            orchestration: OrchestrationConfig::from_env_profiled(p),
            encryption: EncryptionConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  openai:        base_url={}", self.llm.openai_base_url);
        tracing::info!(
            "  anthropic:     base_url={}, max_tokens={}",
            self.llm.anthropic_base_url,
            self.llm.anthropic_max_tokens
        );
        tracing::info!(
            "  orchestration: max_rounds={}, round_timeout={}s, buffer={}",
            self.orchestration.max_rounds,
            self.orchestration.round_timeout_secs,
            self.orchestration.stream_buffer
        );
        tracing::info!(
            "  encryption:    key={}",
            if self.encryption.is_configured() { "(set)" } else { "(none)" }
        );
    }
}

// ── LLM vendors ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    /// Anthropic requires an explicit output budget on every request.
    pub anthropic_max_tokens: u32,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            openai_base_url: profiled_env_or(p, "OPENAI_BASE_URL", "https://api.openai.com"),
            anthropic_base_url: profiled_env_or(
                p,
                "ANTHROPIC_BASE_URL",
                "https://api.anthropic.com",
            ),
            anthropic_max_tokens: profiled_env_u32(p, "ANTHROPIC_MAX_TOKENS", 4096),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::from_env_profiled("")
    }
}

// ── Tool-calling loop ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Maximum vendor rounds per reply (tool round-trips + the final answer).
    pub max_rounds: usize,
    /// Per-round vendor deadline in seconds; 0 disables it.
    pub round_timeout_secs: u64,
    /// Capacity of the bounded chunk queue between producer and consumer.
    pub stream_buffer: usize,
}

impl OrchestrationConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_rounds: profiled_env_usize(p, "LLM_MAX_TOOL_ROUNDS", 8).max(1),
            round_timeout_secs: profiled_env_u64(p, "LLM_ROUND_TIMEOUT_SECS", 120),
            stream_buffer: profiled_env_usize(p, "LLM_STREAM_BUFFER", 32).max(1),
        }
    }

    pub fn round_timeout(&self) -> Option<Duration> {
        (self.round_timeout_secs > 0).then(|| Duration::from_secs(self.round_timeout_secs))
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            round_timeout_secs: 120,
            stream_buffer: 32,
        }
    }
}

// ── Credential encryption ─────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// AES-256 key as 64 hex characters.
    pub key_hex: Option<String>,
}

impl EncryptionConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            key_hex: profiled_env_opt(p, "ENCRYPTION_KEY"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key_hex.is_some()
    }

    /// Decode the configured key into raw bytes.
    pub fn key_bytes(&self) -> Result<[u8; 32], ConfigError> {
        let hex_key = self
            .key_hex
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("ENCRYPTION_KEY".into()))?;
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| ConfigError::Invalid(format!("ENCRYPTION_KEY is not hex: {e}")))?;
        let len = bytes.len();
        bytes.try_into().map_err(|_| {
            ConfigError::Invalid(format!(
                "ENCRYPTION_KEY must be 64 hex characters (32 bytes), got {len} bytes"
            ))
        })
    }
}

// Never print the key itself.
impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("key_hex", &self.key_hex.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestration_defaults() {
        let cfg = OrchestrationConfig::default();
        assert_eq!(cfg.max_rounds, 8);
        assert_eq!(cfg.round_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let cfg = OrchestrationConfig {
            round_timeout_secs: 0,
            ..OrchestrationConfig::default()
        };
        assert_eq!(cfg.round_timeout(), None);
    }

    #[test]
    fn test_key_bytes_roundtrip() {
        let cfg = EncryptionConfig {
            key_hex: Some("11".repeat(32)),
        };
        assert_eq!(cfg.key_bytes().unwrap(), [0x11u8; 32]);
    }

    #[test]
    fn test_key_bytes_rejects_short_key() {
        let cfg = EncryptionConfig {
            key_hex: Some("abcd".to_string()),
        };
        assert!(matches!(cfg.key_bytes(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_key_bytes_missing() {
        let cfg = EncryptionConfig { key_hex: None };
        assert!(matches!(cfg.key_bytes(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let cfg = EncryptionConfig {
            key_hex: Some("ff".repeat(32)),
        };
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("ffff"));
        assert!(printed.contains("redacted"));
    }
}
