use crate::services::{
    gemini::{DEFAULT_GEMINI_API_URL, DEFAULT_GEMINI_MODEL},
    telegram::DEFAULT_TELEGRAM_API_URL,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt};

/// Values shipped in the sample `.env` that mean "not set".
const PLACEHOLDERS: [&str; 2] = ["YOUR_BOT_TOKEN", "YOUR_CHAT_ID"];

/// Telegram credentials; present only when both token and chat are set.
#[derive(Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: String,
    pub chat_id: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_url", &self.api_url)
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// `None` degrades uploads and streaming to "not configured".
    pub telegram: Option<TelegramConfig>,
    /// `None` degrades AI generation to "not configured".
    pub gemini: Option<GeminiConfig>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Chat-backed file vault with AI summaries and quizzes")]
pub struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values from `lookup` (the environment in
    /// production).
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let setting = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && !PLACEHOLDERS.contains(&v.as_str()))
        };

        // --- Environment fallback ---
        let env_host = setting("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match setting("PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PORT value `{}`", value))?,
            None => 3000,
        };
        let env_db =
            setting("DATABASE_URL").unwrap_or_else(|| "sqlite://./data/chat_vault.db".into());

        let telegram = match (setting("BOT_TOKEN"), setting("CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                api_url: setting("TELEGRAM_API_URL")
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.into()),
                bot_token,
                chat_id,
            }),
            _ => None,
        };

        let gemini = setting("GEMINI_API_KEY").map(|api_key| GeminiConfig {
            api_url: setting("GEMINI_API_URL").unwrap_or_else(|| DEFAULT_GEMINI_API_URL.into()),
            api_key,
            model: setting("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
        });

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            telegram,
            gemini,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)], args: Args) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::resolve(args, |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_leave_capabilities_unconfigured() {
        let cfg = resolve(&[], Args::default()).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert!(cfg.telegram.is_none());
        assert!(cfg.gemini.is_none());
    }

    #[test]
    fn placeholders_count_as_missing() {
        let cfg = resolve(
            &[("BOT_TOKEN", "YOUR_BOT_TOKEN"), ("CHAT_ID", "-100123")],
            Args::default(),
        )
        .unwrap();
        assert!(cfg.telegram.is_none());
    }

    #[test]
    fn args_override_environment() {
        let args = Args {
            port: Some(8080),
            ..Args::default()
        };
        let cfg = resolve(
            &[
                ("PORT", "9000"),
                ("BOT_TOKEN", "123:abc"),
                ("CHAT_ID", "-100123"),
                ("GEMINI_API_KEY", "sekrit"),
            ],
            args,
        )
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.telegram.unwrap().api_url, DEFAULT_TELEGRAM_API_URL);
        let gemini = cfg.gemini.unwrap();
        assert_eq!(gemini.model, DEFAULT_GEMINI_MODEL);
        assert!(!format!("{:?}", gemini).contains("sekrit"));
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(resolve(&[("PORT", "eighty")], Args::default()).is_err());
    }
}
