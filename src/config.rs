use crate::gate::InboundAuth;
use thiserror::Error;

const DEFAULT_MARKER: &str = "grafana";
const DEFAULT_TENANT: &str = "FA Finance";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Where the target Slack channel identifier comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSource {
    Id(String),
    /// Looked up through `conversations.list` at startup.
    Name { name: String, bot_token: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub bot_username: Option<String>,
    pub chat_id: String,
    pub api_base: String,
}

/// Process configuration, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub channel: ChannelSource,
    pub auth: InboundAuth,
    pub marker: String,
    pub tenant: String,
    /// `None` only in dry-run mode when credentials are absent.
    pub telegram: Option<TelegramConfig>,
    pub dry_run: bool,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Empty
    /// values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let channel = match (var("SLACK_CHANNEL_ID"), var("SLACK_CHANNEL_NAME")) {
            (Some(id), _) => ChannelSource::Id(id),
            (None, Some(name)) => ChannelSource::Name {
                name,
                bot_token: var("SLACK_BOT_TOKEN").ok_or(ConfigError::Missing("SLACK_BOT_TOKEN"))?,
            },
            (None, None) => return Err(ConfigError::Missing("SLACK_CHANNEL_ID")),
        };

        let dry_run = match var("DRY_RUN") {
            Some(value) => value
                .parse::<bool>()
                .map_err(|_| ConfigError::Invalid {
                    name: "DRY_RUN",
                    value,
                })?,
            None => false,
        };

        let port = match var("PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let telegram = match (var("TELEGRAM_BOT_TOKEN"), var("ALERTS_CHAT_TELEGRAM_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                bot_token,
                bot_username: var("TELEGRAM_BOT_USERNAME"),
                chat_id,
                api_base: var("TELEGRAM_API_BASE")
                    .unwrap_or_else(|| crate::telegram::DEFAULT_API_BASE.to_string()),
            }),
            _ if dry_run => None,
            (None, _) => return Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN")),
            (Some(_), None) => return Err(ConfigError::Missing("ALERTS_CHAT_TELEGRAM_ID")),
        };

        Ok(Self {
            channel,
            auth: InboundAuth {
                token: var("SLACK_OUTGOING_WEBHOOK_TOKEN"),
                signing_secret: var("SLACK_SIGNING_SECRET"),
            },
            marker: var("ALERT_SOURCE_MARKER").unwrap_or_else(|| DEFAULT_MARKER.to_string()),
            tenant: var("ALERT_TENANT").unwrap_or_else(|| DEFAULT_TENANT.to_string()),
            telegram,
            dry_run,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("SLACK_CHANNEL_ID", "C089Z452UAD"),
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("ALERTS_CHAT_TELEGRAM_ID", "-1001"),
    ];

    #[test]
    fn minimal_config_uses_defaults() {
        let config = load(MINIMAL).unwrap();
        assert_eq!(config.channel, ChannelSource::Id("C089Z452UAD".to_string()));
        assert_eq!(config.marker, "grafana");
        assert_eq!(config.tenant, "FA Finance");
        assert_eq!(config.port, 3000);
        assert!(!config.dry_run);
        assert!(config.auth.token.is_none());
        assert!(config.auth.signing_secret.is_none());

        let telegram = config.telegram.unwrap();
        assert_eq!(telegram.chat_id, "-1001");
        assert_eq!(telegram.api_base, "https://api.telegram.org");
        assert!(telegram.bot_username.is_none());
    }

    #[test]
    fn token_check_enabled_only_when_set() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("SLACK_OUTGOING_WEBHOOK_TOKEN", ""));
        assert!(load(&vars).unwrap().auth.token.is_none());

        vars.push(("SLACK_OUTGOING_WEBHOOK_TOKEN", "tok"));
        // Later entries win in the HashMap
        assert_eq!(load(&vars).unwrap().auth.token.as_deref(), Some("tok"));
    }

    #[test]
    fn channel_can_be_resolved_by_name() {
        let vars = [
            ("SLACK_CHANNEL_NAME", "grafana-alerts"),
            ("SLACK_BOT_TOKEN", "xoxb-1"),
            ("DRY_RUN", "true"),
        ];
        let config = load(&vars).unwrap();
        assert_eq!(
            config.channel,
            ChannelSource::Name {
                name: "grafana-alerts".to_string(),
                bot_token: "xoxb-1".to_string()
            }
        );

        assert_eq!(
            load(&[("SLACK_CHANNEL_NAME", "grafana-alerts"), ("DRY_RUN", "true")]).unwrap_err(),
            ConfigError::Missing("SLACK_BOT_TOKEN")
        );
    }

    #[test]
    fn missing_channel_is_an_error() {
        assert_eq!(
            load(&[("DRY_RUN", "true")]).unwrap_err(),
            ConfigError::Missing("SLACK_CHANNEL_ID")
        );
    }

    #[test]
    fn telegram_settings_required_unless_dry_run() {
        let vars = [("SLACK_CHANNEL_ID", "C1")];
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing("TELEGRAM_BOT_TOKEN")
        );
        assert_eq!(
            load(&[("SLACK_CHANNEL_ID", "C1"), ("TELEGRAM_BOT_TOKEN", "t")]).unwrap_err(),
            ConfigError::Missing("ALERTS_CHAT_TELEGRAM_ID")
        );

        let config = load(&[("SLACK_CHANNEL_ID", "C1"), ("DRY_RUN", "true")]).unwrap();
        assert!(config.dry_run);
        assert!(config.telegram.is_none());
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("PORT", "http"));
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid {
                name: "PORT",
                value: "http".to_string()
            }
        );
    }
}
