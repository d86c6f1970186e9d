//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables. Credentials and
//! chat settings use flat names (`LINE_CHANNEL_SECRET`, `ALLOWED_CHAT_IDS`);
//! tunables live in sections separated by `__` (`SESSION__WINDOW`).

use crate::error::ServerError;
use muaddib_ai::openai::{
    DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL, DEFAULT_VISION_MODEL,
};
use muaddib_ai::{PersonaSettings, RoleCode};
use muaddib_relay::PolicyConfig;
use muaddib_relay::policy::{DEFAULT_MENTION, DEFAULT_RANDOM_RATE};
use rootcause::Report;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// LINE channel access token.
    pub line_channel_access_token: String,
    /// LINE channel secret used to verify webhook signatures.
    pub line_channel_secret: String,
    /// API key for the completion backend.
    pub openai_api_key: String,
    /// Base URL of the OpenAI-compatible backend.
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    /// Comma-separated user, group and room ids the bot may talk to.
    #[serde(default)]
    pub allowed_chat_ids: String,
    /// Name substituted into the role B persona.
    #[serde(default = "default_queen_name")]
    pub queen_name: String,
    /// Display names assigned to the fixed personas.
    #[serde(default)]
    pub role_code_a: Option<String>,
    #[serde(default)]
    pub role_code_b: Option<String>,
    #[serde(default)]
    pub role_code_c: Option<String>,
    #[serde(default)]
    pub role_code_d: Option<String>,

    #[serde(default)]
    pub bot: BotSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub images: ImageSettings,
    #[serde(default)]
    pub models: ModelSettings,
    #[serde(default)]
    pub server: ListenSettings,
}

/// Response policy settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BotSettings {
    #[serde(default = "default_mention")]
    pub mention: String,
    /// Probability of answering a group message that does not mention the bot.
    #[serde(default = "default_random_rate")]
    pub random_rate: f64,
    #[serde(default = "default_true")]
    pub always_respond_individual: bool,
}

/// Conversation memory settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Turns kept per conversation.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Idle minutes before a conversation starts over; zero disables expiry.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    /// Interval between expired-session sweeps, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

/// Received image storage.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSettings {
    #[serde(default = "default_images_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: u64,
}

/// Model names on the completion backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_chat_model")]
    pub chat: String,
    #[serde(default = "default_image_model")]
    pub image: String,
    #[serde(default = "default_vision_model")]
    pub vision: String,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenSettings {
    #[serde(default = "default_addr")]
    pub addr: String,
}

fn default_openai_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_queen_name() -> String {
    "某人".to_string()
}

fn default_mention() -> String {
    DEFAULT_MENTION.to_string()
}

fn default_random_rate() -> f64 {
    DEFAULT_RANDOM_RATE
}

fn default_true() -> bool {
    true
}

fn default_window() -> usize {
    muaddib_conversation::session::DEFAULT_WINDOW
}

fn default_ttl_minutes() -> i64 {
    muaddib_conversation::session::DEFAULT_TTL_MINUTES
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("static/images")
}

fn default_max_age_seconds() -> u64 {
    muaddib_integration::DEFAULT_MAX_AGE.as_secs()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

fn default_vision_model() -> String {
    DEFAULT_VISION_MODEL.to_string()
}

fn default_addr() -> String {
    "0.0.0.0:5000".to_string()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            mention: default_mention(),
            random_rate: default_random_rate(),
            always_respond_individual: default_true(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            window: default_window(),
            ttl_minutes: default_ttl_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            dir: default_images_dir(),
            max_age_seconds: default_max_age_seconds(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            chat: default_chat_model(),
            image: default_image_model(),
            vision: default_vision_model(),
        }
    }
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, Report<ServerError>> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(environment: config::Environment) -> Result<Self, Report<ServerError>> {
        let config: Self = config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ServerError::InvalidConfig {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Report<ServerError>> {
        let required = [
            ("LINE_CHANNEL_ACCESS_TOKEN", &self.line_channel_access_token),
            ("LINE_CHANNEL_SECRET", &self.line_channel_secret),
            ("OPENAI_API_KEY", &self.openai_api_key),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ServerError::InvalidConfig {
                    reason: format!("{name} is empty"),
                }
                .into());
            }
        }
        if self.session.window == 0 {
            return Err(ServerError::InvalidConfig {
                reason: "SESSION__WINDOW must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Returns the allow-list.
    #[must_use]
    pub fn allowed_ids(&self) -> HashSet<String> {
        self.allowed_chat_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Returns the response policy settings.
    #[must_use]
    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig {
            allowed_ids: self.allowed_ids(),
            mention: self.bot.mention.clone(),
            random_rate: self.bot.random_rate,
            always_respond_individual: self.bot.always_respond_individual,
        }
    }

    /// Returns the persona assignments.
    #[must_use]
    pub fn personas(&self) -> PersonaSettings {
        let names = [
            (RoleCode::A, &self.role_code_a),
            (RoleCode::B, &self.role_code_b),
            (RoleCode::C, &self.role_code_c),
            (RoleCode::D, &self.role_code_d),
        ];
        let role_names: HashMap<RoleCode, String> = names
            .into_iter()
            .filter_map(|(code, name)| Some((code, name.clone()?)))
            .collect();
        PersonaSettings {
            queen_name: self.queen_name.clone(),
            role_names,
        }
    }

    /// Returns the conversation memory limits.
    #[must_use]
    pub fn sessions(&self) -> muaddib_conversation::SessionConfig {
        let ttl = (self.session.ttl_minutes > 0)
            .then(|| chrono::Duration::minutes(self.session.ttl_minutes));
        muaddib_conversation::SessionConfig {
            window: self.session.window,
            ttl,
        }
    }

    /// Returns the maximum age of stored images.
    #[must_use]
    pub fn image_max_age(&self) -> Duration {
        Duration::from_secs(self.images.max_age_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, Report<ServerError>> {
        let source = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_source(config::Environment::default().source(Some(source)))
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("LINE_CHANNEL_ACCESS_TOKEN", "token"),
        ("LINE_CHANNEL_SECRET", "secret"),
        ("OPENAI_API_KEY", "key"),
    ];

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let config = load(&REQUIRED).expect("config");

        assert_eq!(config.openai_base_url, "https://api.x.ai/v1");
        assert_eq!(config.queen_name, "某人");
        assert_eq!(config.bot.mention, "@穆阿迪布");
        assert!((config.bot.random_rate - 0.30).abs() < f64::EPSILON);
        assert!(config.bot.always_respond_individual);
        assert_eq!(config.session.window, 10);
        assert_eq!(config.session.ttl_minutes, 30);
        assert_eq!(config.session.cleanup_interval_seconds, 300);
        assert_eq!(config.images.dir, PathBuf::from("static/images"));
        assert_eq!(config.images.max_age_seconds, 36_000);
        assert_eq!(config.models.chat, "grok-2-latest");
        assert_eq!(config.models.image, "grok-2-image");
        assert_eq!(config.models.vision, "grok-2-vision-latest");
        assert_eq!(config.server.addr, "0.0.0.0:5000");
        assert!(config.allowed_ids().is_empty());
    }

    #[test]
    fn missing_credentials_are_fatal() {
        assert!(load(&REQUIRED[..2]).is_err());
        assert!(load(&[]).is_err());
    }

    #[test]
    fn blank_credentials_are_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars[1] = ("LINE_CHANNEL_SECRET", "  ");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn sections_and_lists_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("ALLOWED_CHAT_IDS", "U1, G2 ,,R3"),
            ("ROLE_CODE_A", "Alice"),
            ("BOT__RANDOM_RATE", "0.05"),
            ("BOT__ALWAYS_RESPOND_INDIVIDUAL", "false"),
            ("SESSION__WINDOW", "4"),
            ("SESSION__TTL_MINUTES", "0"),
            ("SERVER__ADDR", "127.0.0.1:8080"),
        ]);
        let config = load(&vars).expect("config");

        let policy = config.policy();
        assert_eq!(
            policy.allowed_ids,
            HashSet::from(["U1".to_string(), "G2".to_string(), "R3".to_string()])
        );
        assert!((policy.random_rate - 0.05).abs() < f64::EPSILON);
        assert!(!policy.always_respond_individual);
        assert_eq!(
            config.personas().role_names.get(&RoleCode::A).map(String::as_str),
            Some("Alice")
        );
        let sessions = config.sessions();
        assert_eq!(sessions.window, 4);
        assert!(sessions.ttl.is_none());
        assert_eq!(config.server.addr, "127.0.0.1:8080");
    }
}
