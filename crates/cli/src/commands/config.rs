use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use helpbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let bot_token = redact_token(config.discord.bot_token.expose_secret());
    let tiers = config
        .subscription
        .tiers
        .iter()
        .map(|tier| format!("{}=>{}", tier.role_id.0, tier.level))
        .collect::<Vec<_>>();

    let fields: Vec<(&str, String)> = vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("discord.bot_token", bot_token),
        ("discord.guild_id", config.discord.guild_id.to_string()),
        ("discord.help_forum_id", config.discord.help_forum_id.to_string()),
        ("discord.announcements_channel_id", config.discord.announcements_channel_id.to_string()),
        ("discord.bot_messages_channel_id", config.discord.bot_messages_channel_id.to_string()),
        ("discord.helper_role_id", config.discord.helper_role_id.to_string()),
        ("discord.owner_id", config.discord.owner_id.to_string()),
        ("review.default_duration_days", config.review.default_duration_days.to_string()),
        ("review.max_duration_days", config.review.max_duration_days.to_string()),
        ("tickets.default_bounty", config.tickets.default_bounty.to_string()),
        ("subscription.tiers", format!("[{}]", tiers.join(", "))),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.health_check_port", config.server.health_check_port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value) in fields {
        let source = field_source(
            key,
            env_key(key).as_deref(),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

/// `discord.help_forum_id` reads `HELPBOT_DISCORD_HELP_FORUM_ID`. Lists have
/// no environment form.
fn env_key(key_path: &str) -> Option<String> {
    if key_path == "subscription.tiers" {
        return None;
    }
    Some(format!("HELPBOT_{}", key_path.replace('.', "_").to_ascii_uppercase()))
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("helpbot.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/helpbot.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('.') {
        return format!("{prefix}.***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, env_key, redact_token};

    #[test]
    fn bot_token_keeps_only_its_first_segment() {
        assert_eq!(redact_token("MTIzNDU2.Gx1y2z.abcdefghijklmnop"), "MTIzNDU2.***");
        assert_eq!(redact_token("   "), "<empty>");
        assert_eq!(redact_token("opaque"), "<redacted>");
    }

    #[test]
    fn env_keys_follow_the_section_prefix() {
        assert_eq!(
            env_key("server.health_check_port").as_deref(),
            Some("HELPBOT_SERVER_HEALTH_CHECK_PORT")
        );
        assert_eq!(env_key("subscription.tiers"), None);
    }

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: toml::Value = "[discord]\nhelp_forum_id = 1001\n".parse().expect("toml");
        assert!(contains_path(&doc, "discord.help_forum_id"));
        assert!(!contains_path(&doc, "discord.owner_id"));
    }
}
