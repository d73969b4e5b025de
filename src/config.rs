use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Models the completion endpoint accepts.
pub const SUPPORTED_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4",
    "gpt-3.5-turbo",
];

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 256;
pub const DEFAULT_MAX_REQUEST_CHARS: usize = 16_000;
pub const MIN_INSTRUCTION_CHARS: usize = 12;

const DEFAULT_INSTRUCTION: &str = "You are an assistant that writes concise git commit messages. \
Respond with only the commit message: an imperative subject line under 72 characters, \
optionally followed by a short body explaining what changed and why.";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// API key for the completion endpoint (or OPENAI_API_KEY)
    pub api_key: Option<String>,

    /// Default model (optional)
    pub model: Option<String>,

    /// System-prompt text sent with every request
    pub instruction: Option<String>,

    /// Character cap on the assembled request
    pub max_request_chars: Option<usize>,

    /// Output token cap
    pub max_tokens: Option<u32>,

    /// License key (or COMMITGEN_LICENSE_KEY); without one a free trial applies
    pub license_key: Option<String>,
}

impl Config {
    /// Load config if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to read config: {}", path.display()))
            }
        };

        let s = String::from_utf8(bytes).context("config is not valid UTF-8")?;
        let cfg: Config = toml::from_str(&s)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
        Ok(Some(cfg))
    }
}

pub fn license_key(cfg: Option<&Config>) -> Option<String> {
    std::env::var("COMMITGEN_LICENSE_KEY")
        .ok()
        .or_else(|| cfg.and_then(|c| c.license_key.clone()))
        .filter(|k| !k.trim().is_empty())
}

/// Fully validated settings for one invocation. Validation happens here,
/// before any request is built.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub instruction: String,
    pub max_request_chars: usize,
    pub max_tokens: u32,
    pub license_key: Option<String>,
}

impl Settings {
    pub fn resolve(
        cfg: Option<&Config>,
        model_override: Option<&str>,
        max_tokens_override: Option<u32>,
    ) -> anyhow::Result<Self> {
        let env_key = std::env::var("OPENAI_API_KEY").ok();
        resolve_inner(cfg, model_override, max_tokens_override, env_key, license_key(cfg))
    }
}

fn resolve_inner(
    cfg: Option<&Config>,
    model_override: Option<&str>,
    max_tokens_override: Option<u32>,
    env_api_key: Option<String>,
    license_key: Option<String>,
) -> anyhow::Result<Settings> {
    let api_key = env_api_key
        .or_else(|| cfg.and_then(|c| c.api_key.clone()))
        .unwrap_or_default();
    if api_key.trim().is_empty() {
        bail!("no API key configured; set OPENAI_API_KEY or api_key in config.toml");
    }

    let model = model_override
        .map(|m| m.to_string())
        .or_else(|| cfg.and_then(|c| c.model.clone()))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    if !SUPPORTED_MODELS.contains(&model.as_str()) {
        bail!(
            "unsupported model \"{model}\"; supported models: {}",
            SUPPORTED_MODELS.join(", ")
        );
    }

    let instruction = cfg
        .and_then(|c| c.instruction.clone())
        .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string());
    if instruction.trim().chars().count() < MIN_INSTRUCTION_CHARS {
        bail!("instruction is too short (minimum {MIN_INSTRUCTION_CHARS} characters)");
    }

    let max_request_chars = cfg
        .and_then(|c| c.max_request_chars)
        .unwrap_or(DEFAULT_MAX_REQUEST_CHARS);

    let max_tokens = max_tokens_override
        .or_else(|| cfg.and_then(|c| c.max_tokens))
        .unwrap_or(DEFAULT_MAX_TOKENS);

    Ok(Settings {
        api_key,
        model,
        instruction,
        max_request_chars,
        max_tokens,
        license_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: &str) -> Config {
        Config {
            api_key: Some(api_key.to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_apply_when_config_is_minimal() {
        let cfg = config("sk-test");
        let s = resolve_inner(Some(&cfg), None, None, None, None).unwrap();
        assert_eq!(s.model, DEFAULT_MODEL);
        assert_eq!(s.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(s.max_request_chars, DEFAULT_MAX_REQUEST_CHARS);
        assert!(s.instruction.len() >= MIN_INSTRUCTION_CHARS);
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = resolve_inner(None, None, None, None, None).unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let cfg = config("   ");
        assert!(resolve_inner(Some(&cfg), None, None, None, None).is_err());
    }

    #[test]
    fn env_key_wins_over_config() {
        let cfg = config("from-config");
        let s = resolve_inner(Some(&cfg), None, None, Some("from-env".into()), None).unwrap();
        assert_eq!(s.api_key, "from-env");
    }

    #[test]
    fn unknown_model_is_rejected() {
        let cfg = config("sk-test");
        let err = resolve_inner(Some(&cfg), Some("gpt-imaginary"), None, None, None).unwrap_err();
        assert!(err.to_string().contains("unsupported model"));
    }

    #[test]
    fn short_instruction_is_rejected() {
        let cfg = Config {
            api_key: Some("sk-test".into()),
            instruction: Some("short".into()),
            ..Config::default()
        };
        assert!(resolve_inner(Some(&cfg), None, None, None, None).is_err());
    }

    #[test]
    fn overrides_win_over_config_values() {
        let cfg = Config {
            api_key: Some("sk-test".into()),
            model: Some("gpt-4".into()),
            max_tokens: Some(512),
            ..Config::default()
        };
        let s = resolve_inner(Some(&cfg), Some("gpt-4o"), Some(128), None, None).unwrap();
        assert_eq!(s.model, "gpt-4o");
        assert_eq!(s.max_tokens, 128);
    }
}
