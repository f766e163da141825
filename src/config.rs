use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Settings every subcommand needs. Nothing here can fail to parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub speech: SpeechSettings,
    pub modes_dir: Option<PathBuf>,
    pub prompt_timezone: String,
    pub action_log_dir: String,
}

/// Model provider settings used by the question suggester.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Voice API settings used by the speech synthesizer.
#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub voice_id: String,
    pub model_id: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_vars(env_var)
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        Self {
            speech: SpeechSettings {
                api_key: var("ELEVENLABS_API_KEY"),
                base_url: or("ELEVENLABS_BASE_URL", "https://api.elevenlabs.io"),
                voice_id: or("VOICE_ID", "JBFqnCBsd6RMkjVDRZzb"),
                model_id: or("TTS_MODEL", "eleven_turbo_v2_5"),
            },
            modes_dir: var("MODES_DIR").map(PathBuf::from),
            prompt_timezone: or("PROMPT_TIMEZONE", "UTC"),
            action_log_dir: or("ACTION_LOG_DIR", "logs"),
        }
    }
}

impl LlmSettings {
    /// Read only when the suggester is built.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(env_var)
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let timeout_secs: u64 = var("LLM_TIMEOUT_SECS")
            .unwrap_or_else(|| "15".into())
            .parse()
            .context("LLM_TIMEOUT_SECS must be a number")?;

        Ok(Self {
            api_key: var("OPENAI_API_KEY"),
            base_url: var("LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".into()),
            model: var("SUGGEST_MODEL").unwrap_or_else(|| "gpt-4o-mini".into()),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// Empty values count as unset.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
