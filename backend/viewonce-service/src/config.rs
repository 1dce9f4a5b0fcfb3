use dotenvy::dotenv;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::AppError;
use crate::services::access_request::RequestSettings;
use crate::services::command::CommandMatcher;

/// Upper bound for `WORKER_LIMIT`.
pub const MAX_WORKER_LIMIT: usize = 1024;

/// Where approved media is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryTarget {
    /// Back into the chat the request was made in
    #[default]
    Chat,
    /// Into the requester's direct chat
    Requester,
}

impl FromStr for DeliveryTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(DeliveryTarget::Chat),
            "requester" => Ok(DeliveryTarget::Requester),
            other => Err(format!("unknown delivery target {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub log_json: bool,
    pub bridge: BridgeConfig,
    pub worker_limit: usize,
    pub unwrap_max_depth: usize,
    pub command_prefixes: Vec<String>,
    pub request_command: String,
    pub delivery_target: DeliveryTarget,
    pub accept_token: String,
    pub deny_token: String,
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{key} missing")))
}

fn parse_or<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} invalid: {e}"))),
        Err(_) => Ok(default),
    }
}

fn token_or(key: &str, default: &str) -> Result<String, AppError> {
    let token = env::var(key).unwrap_or_else(|_| default.to_string());
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(AppError::Config(format!("{key} must not be empty")));
    }
    Ok(token)
}

impl Config {
    fn parse_prefixes(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let port = parse_or("PORT", 3000u16)?;
        let log_json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let bridge = BridgeConfig {
            url: required("BRIDGE_URL")?.trim_end_matches('/').to_string(),
            token: env::var("BRIDGE_TOKEN").ok().filter(|t| !t.is_empty()),
            timeout_secs: parse_or("BRIDGE_TIMEOUT_SECS", 30u64)?,
        };

        let worker_limit = parse_or("WORKER_LIMIT", 10usize)?;
        if !(1..=MAX_WORKER_LIMIT).contains(&worker_limit) {
            return Err(AppError::Config(format!(
                "WORKER_LIMIT must be between 1 and {MAX_WORKER_LIMIT}"
            )));
        }

        let unwrap_max_depth = parse_or("UNWRAP_MAX_DEPTH", message_store::DEFAULT_UNWRAP_DEPTH)?;
        if unwrap_max_depth == 0 {
            return Err(AppError::Config("UNWRAP_MAX_DEPTH must be at least 1".into()));
        }

        let command_prefixes =
            Self::parse_prefixes(&env::var("COMMAND_PREFIXES").unwrap_or_else(|_| ".,!,/".into()));
        if command_prefixes.is_empty() {
            return Err(AppError::Config("COMMAND_PREFIXES must not be empty".into()));
        }

        let request_command = token_or("REQUEST_COMMAND", "vo")?;
        let delivery_target = parse_or("DELIVERY_TARGET", DeliveryTarget::default())?;
        let accept_token = token_or("ACCEPT_TOKEN", "✅")?;
        let deny_token = token_or("DENY_TOKEN", "❌")?;

        if accept_token == deny_token {
            return Err(AppError::Config(
                "ACCEPT_TOKEN and DENY_TOKEN must differ".into(),
            ));
        }

        Ok(Self {
            database_url,
            port,
            log_json,
            bridge,
            worker_limit,
            unwrap_max_depth,
            command_prefixes,
            request_command,
            delivery_target,
            accept_token,
            deny_token,
        })
    }

    pub fn request_settings(&self) -> RequestSettings {
        RequestSettings {
            accept_token: self.accept_token.clone(),
            deny_token: self.deny_token.clone(),
            unwrap_depth: self.unwrap_max_depth,
            delivery_target: self.delivery_target,
        }
    }

    pub fn command_matcher(&self) -> CommandMatcher {
        CommandMatcher::new(self.command_prefixes.clone(), self.request_command.clone())
    }
}
