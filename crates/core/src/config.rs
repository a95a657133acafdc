use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::member::{RoleId, SubscriptionTier};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub discord: DiscordConfig,
    pub review: ReviewConfig,
    pub tickets: TicketConfig,
    pub subscription: SubscriptionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    pub guild_id: i64,
    pub help_forum_id: i64,
    pub announcements_channel_id: i64,
    pub bot_messages_channel_id: i64,
    pub helper_role_id: i64,
    pub owner_id: i64,
}

#[derive(Clone, Debug)]
pub struct ReviewConfig {
    pub default_duration_days: u32,
    pub max_duration_days: u32,
}

#[derive(Clone, Debug)]
pub struct TicketConfig {
    pub default_bounty: i64,
}

#[derive(Clone, Debug, Default)]
pub struct SubscriptionConfig {
    pub tiers: Vec<SubscriptionTier>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub discord_bot_token: Option<String>,
    pub help_forum_id: Option<i64>,
    pub announcements_channel_id: Option<i64>,
    pub owner_id: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://helpbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            discord: DiscordConfig {
                bot_token: String::new().into(),
                guild_id: 0,
                help_forum_id: 0,
                announcements_channel_id: 0,
                bot_messages_channel_id: 0,
                helper_role_id: 0,
                owner_id: 0,
            },
            review: ReviewConfig { default_duration_days: 7, max_duration_days: 30 },
            tickets: TicketConfig { default_bounty: 5 },
            subscription: SubscriptionConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("helpbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(discord) = patch.discord {
            if let Some(bot_token) = discord.bot_token {
                self.discord.bot_token = bot_token.into();
            }
            if let Some(guild_id) = discord.guild_id {
                self.discord.guild_id = guild_id;
            }
            if let Some(help_forum_id) = discord.help_forum_id {
                self.discord.help_forum_id = help_forum_id;
            }
            if let Some(channel_id) = discord.announcements_channel_id {
                self.discord.announcements_channel_id = channel_id;
            }
            if let Some(channel_id) = discord.bot_messages_channel_id {
                self.discord.bot_messages_channel_id = channel_id;
            }
            if let Some(helper_role_id) = discord.helper_role_id {
                self.discord.helper_role_id = helper_role_id;
            }
            if let Some(owner_id) = discord.owner_id {
                self.discord.owner_id = owner_id;
            }
        }

        if let Some(review) = patch.review {
            if let Some(days) = review.default_duration_days {
                self.review.default_duration_days = days;
            }
            if let Some(days) = review.max_duration_days {
                self.review.max_duration_days = days;
            }
        }

        if let Some(tickets) = patch.tickets {
            if let Some(default_bounty) = tickets.default_bounty {
                self.tickets.default_bounty = default_bounty;
            }
        }

        if let Some(subscription) = patch.subscription {
            if let Some(tiers) = subscription.tiers {
                self.subscription.tiers = tiers
                    .into_iter()
                    .map(|tier| SubscriptionTier { role_id: RoleId(tier.role_id), level: tier.level })
                    .collect();
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HELPBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("HELPBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("HELPBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("HELPBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("HELPBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HELPBOT_DISCORD_BOT_TOKEN") {
            self.discord.bot_token = value.into();
        }
        if let Some(value) = read_env("HELPBOT_DISCORD_GUILD_ID") {
            self.discord.guild_id = parse_i64("HELPBOT_DISCORD_GUILD_ID", &value)?;
        }
        if let Some(value) = read_env("HELPBOT_DISCORD_HELP_FORUM_ID") {
            self.discord.help_forum_id = parse_i64("HELPBOT_DISCORD_HELP_FORUM_ID", &value)?;
        }
        if let Some(value) = read_env("HELPBOT_DISCORD_ANNOUNCEMENTS_CHANNEL_ID") {
            self.discord.announcements_channel_id =
                parse_i64("HELPBOT_DISCORD_ANNOUNCEMENTS_CHANNEL_ID", &value)?;
        }
        if let Some(value) = read_env("HELPBOT_DISCORD_BOT_MESSAGES_CHANNEL_ID") {
            self.discord.bot_messages_channel_id =
                parse_i64("HELPBOT_DISCORD_BOT_MESSAGES_CHANNEL_ID", &value)?;
        }
        if let Some(value) = read_env("HELPBOT_DISCORD_HELPER_ROLE_ID") {
            self.discord.helper_role_id = parse_i64("HELPBOT_DISCORD_HELPER_ROLE_ID", &value)?;
        }
        if let Some(value) = read_env("HELPBOT_DISCORD_OWNER_ID") {
            self.discord.owner_id = parse_i64("HELPBOT_DISCORD_OWNER_ID", &value)?;
        }

        if let Some(value) = read_env("HELPBOT_REVIEW_DEFAULT_DURATION_DAYS") {
            self.review.default_duration_days =
                parse_u32("HELPBOT_REVIEW_DEFAULT_DURATION_DAYS", &value)?;
        }
        if let Some(value) = read_env("HELPBOT_REVIEW_MAX_DURATION_DAYS") {
            self.review.max_duration_days = parse_u32("HELPBOT_REVIEW_MAX_DURATION_DAYS", &value)?;
        }
        if let Some(value) = read_env("HELPBOT_TICKETS_DEFAULT_BOUNTY") {
            self.tickets.default_bounty = parse_i64("HELPBOT_TICKETS_DEFAULT_BOUNTY", &value)?;
        }

        if let Some(value) = read_env("HELPBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HELPBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("HELPBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("HELPBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("HELPBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("HELPBOT_LOGGING_LEVEL").or_else(|| read_env("HELPBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HELPBOT_LOGGING_FORMAT").or_else(|| read_env("HELPBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.discord_bot_token {
            self.discord.bot_token = bot_token.into();
        }
        if let Some(help_forum_id) = overrides.help_forum_id {
            self.discord.help_forum_id = help_forum_id;
        }
        if let Some(channel_id) = overrides.announcements_channel_id {
            self.discord.announcements_channel_id = channel_id;
        }
        if let Some(owner_id) = overrides.owner_id {
            self.discord.owner_id = owner_id;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_discord(&self.discord)?;
        validate_review(&self.review)?;
        validate_tickets(&self.tickets)?;
        validate_subscription(&self.subscription)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("helpbot.toml"), PathBuf::from("config/helpbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    let bot_token = discord.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.bot_token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Reset Token".to_string(),
        ));
    }
    if bot_token.split('.').count() != 3 {
        return Err(ConfigError::Validation(
            "discord.bot_token must be a bot token made of three dot-separated segments"
                .to_string(),
        ));
    }

    if discord.help_forum_id <= 0 {
        return Err(ConfigError::Validation(
            "discord.help_forum_id must be set to the id of the help forum channel".to_string(),
        ));
    }

    if discord.announcements_channel_id <= 0 {
        return Err(ConfigError::Validation(
            "discord.announcements_channel_id must be set to the channel hosting review signups"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_review(review: &ReviewConfig) -> Result<(), ConfigError> {
    if review.max_duration_days == 0 || review.max_duration_days > 60 {
        return Err(ConfigError::Validation(
            "review.max_duration_days must be in range 1..=60".to_string(),
        ));
    }

    if review.default_duration_days == 0 || review.default_duration_days > review.max_duration_days
    {
        return Err(ConfigError::Validation(
            "review.default_duration_days must be in range 1..=review.max_duration_days"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_tickets(tickets: &TicketConfig) -> Result<(), ConfigError> {
    if tickets.default_bounty < 0 {
        return Err(ConfigError::Validation(
            "tickets.default_bounty must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn validate_subscription(subscription: &SubscriptionConfig) -> Result<(), ConfigError> {
    if let Some(tier) = subscription.tiers.iter().find(|tier| tier.level == 0) {
        return Err(ConfigError::Validation(format!(
            "subscription tier for role {} must have a level of at least 1",
            tier.role_id.0
        )));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| invalid_override(key, value))
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    discord: Option<DiscordPatch>,
    review: Option<ReviewPatch>,
    tickets: Option<TicketPatch>,
    subscription: Option<SubscriptionPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    bot_token: Option<String>,
    guild_id: Option<i64>,
    help_forum_id: Option<i64>,
    announcements_channel_id: Option<i64>,
    bot_messages_channel_id: Option<i64>,
    helper_role_id: Option<i64>,
    owner_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewPatch {
    default_duration_days: Option<u32>,
    max_duration_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TicketPatch {
    default_bounty: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SubscriptionPatch {
    tiers: Option<Vec<TierPatch>>,
}

#[derive(Debug, Deserialize)]
struct TierPatch {
    role_id: i64,
    level: u32,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
