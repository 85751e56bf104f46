use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::reply::ReplyBranding;
use crate::relay::DEFAULT_HITS_PER_PAGE;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub search: SearchConfig,
    pub backfill: BackfillConfig,
    pub relay: RelayConfig,
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
pub struct SlackConfig {
    pub verification_token: SecretString,
    pub api_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub application_id: String,
    pub api_key: SecretString,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl SearchConfig {
    /// Explicit base URL, or the application's own Algolia host.
    pub fn endpoint(&self) -> String {
        match &self.base_url {
            Some(base_url) => base_url.trim_end_matches('/').to_owned(),
            None => format!("https://{}.algolia.net", self.application_id),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BackfillConfig {
    pub page_budget: u32,
    pub mode: BackfillMode,
    pub max_passes: u32,
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub hits_per_page: usize,
    pub color: String,
    pub footer: String,
    pub footer_icon: String,
}

impl RelayConfig {
    pub fn branding(&self) -> ReplyBranding {
        ReplyBranding {
            color: self.color.clone(),
            footer: self.footer.clone(),
            footer_icon: self.footer_icon.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillMode {
    /// Run the pass inside the webhook request.
    Inline,
    /// Acknowledge first, run passes on a spawned task.
    Background,
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
    pub slack_verification_token: Option<String>,
    pub search_application_id: Option<String>,
    pub search_api_key: Option<String>,
    pub backfill_mode: Option<BackfillMode>,
    pub server_port: Option<u16>,
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
        let branding = ReplyBranding::default();
        Self {
            database: DatabaseConfig {
                url: "sqlite://sift.db".to_owned(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                verification_token: String::new().into(),
                api_base_url: "https://slack.com/api".to_owned(),
                timeout_secs: 10,
            },
            search: SearchConfig {
                application_id: String::new(),
                api_key: String::new().into(),
                base_url: None,
                timeout_secs: 10,
            },
            backfill: BackfillConfig { page_budget: 5, mode: BackfillMode::Inline, max_passes: 1 },
            relay: RelayConfig {
                hits_per_page: DEFAULT_HITS_PER_PAGE,
                color: branding.color,
                footer: branding.footer,
                footer_icon: branding.footer_icon,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_owned(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for BackfillMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "background" => Ok(Self::Background),
            other => Err(ConfigError::Validation(format!(
                "unsupported backfill mode `{other}` (expected inline|background)"
            ))),
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("sift.toml"));
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

        if let Some(slack) = patch.slack {
            if let Some(verification_token) = slack.verification_token {
                self.slack.verification_token = secret_value(verification_token); // ubs:ignore
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(timeout_secs) = slack.timeout_secs {
                self.slack.timeout_secs = timeout_secs;
            }
        }

        if let Some(search) = patch.search {
            if let Some(application_id) = search.application_id {
                self.search.application_id = application_id;
            }
            if let Some(search_api_key_value) = search.api_key {
                self.search.api_key = secret_value(search_api_key_value); // ubs:ignore
            }
            if let Some(base_url) = search.base_url {
                self.search.base_url = Some(base_url);
            }
            if let Some(timeout_secs) = search.timeout_secs {
                self.search.timeout_secs = timeout_secs;
            }
        }

        if let Some(backfill) = patch.backfill {
            if let Some(page_budget) = backfill.page_budget {
                self.backfill.page_budget = page_budget;
            }
            if let Some(mode) = backfill.mode {
                self.backfill.mode = mode;
            }
            if let Some(max_passes) = backfill.max_passes {
                self.backfill.max_passes = max_passes;
            }
        }

        if let Some(relay) = patch.relay {
            if let Some(hits_per_page) = relay.hits_per_page {
                self.relay.hits_per_page = hits_per_page;
            }
            if let Some(color) = relay.color {
                self.relay.color = color;
            }
            if let Some(footer) = relay.footer {
                self.relay.footer = footer;
            }
            if let Some(footer_icon) = relay.footer_icon {
                self.relay.footer_icon = footer_icon;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("SIFT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SIFT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("SIFT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SIFT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SIFT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SIFT_SLACK_VERIFICATION_TOKEN") {
            self.slack.verification_token = secret_value(value); // ubs:ignore
        }
        if let Some(value) = read_env("SIFT_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("SIFT_SLACK_TIMEOUT_SECS") {
            self.slack.timeout_secs = parse_u64("SIFT_SLACK_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SIFT_SEARCH_APPLICATION_ID") {
            self.search.application_id = value;
        }
        if let Some(value) = read_env("SIFT_SEARCH_API_KEY") {
            self.search.api_key = secret_value(value); // ubs:ignore
        }
        if let Some(value) = read_env("SIFT_SEARCH_BASE_URL") {
            self.search.base_url = Some(value);
        }
        if let Some(value) = read_env("SIFT_SEARCH_TIMEOUT_SECS") {
            self.search.timeout_secs = parse_u64("SIFT_SEARCH_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SIFT_BACKFILL_PAGE_BUDGET") {
            self.backfill.page_budget = parse_u32("SIFT_BACKFILL_PAGE_BUDGET", &value)?;
        }
        if let Some(value) = read_env("SIFT_BACKFILL_MODE") {
            self.backfill.mode = value.parse()?;
        }
        if let Some(value) = read_env("SIFT_BACKFILL_MAX_PASSES") {
            self.backfill.max_passes = parse_u32("SIFT_BACKFILL_MAX_PASSES", &value)?;
        }

        if let Some(value) = read_env("SIFT_RELAY_HITS_PER_PAGE") {
            self.relay.hits_per_page = parse_usize("SIFT_RELAY_HITS_PER_PAGE", &value)?;
        }

        if let Some(value) = read_env("SIFT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SIFT_SERVER_PORT") {
            self.server.port = parse_u16("SIFT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SIFT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SIFT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("SIFT_LOGGING_LEVEL").or_else(|| read_env("SIFT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("SIFT_LOGGING_FORMAT").or_else(|| read_env("SIFT_LOG_FORMAT"));
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
        if let Some(verification_token) = overrides.slack_verification_token {
            self.slack.verification_token = secret_value(verification_token); // ubs:ignore
        }
        if let Some(application_id) = overrides.search_application_id {
            self.search.application_id = application_id;
        }
        if let Some(search_api_key) = overrides.search_api_key {
            self.search.api_key = secret_value(search_api_key); // ubs:ignore
        }
        if let Some(mode) = overrides.backfill_mode {
            self.backfill.mode = mode;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_search(&self.search)?;
        validate_backfill(&self.backfill)?;
        validate_relay(&self.relay)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("sift.toml"), PathBuf::from("config/sift.toml")]
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
                .to_owned(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_owned(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_owned(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.verification_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.verification_token is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App Credentials".to_owned()
        ));
    }

    validate_http_url("slack.api_base_url", &slack.api_base_url)?;

    if slack.timeout_secs == 0 || slack.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "slack.timeout_secs must be in range 1..=120".to_owned(),
        ));
    }

    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    if search.application_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "search.application_id is required. Get it from the Algolia dashboard > Settings > API Keys".to_owned(),
        ));
    }

    if search.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "search.api_key is required and needs addObject, settings and search ACLs".to_owned(),
        ));
    }

    if let Some(base_url) = &search.base_url {
        validate_http_url("search.base_url", base_url)?;
    }

    if search.timeout_secs == 0 || search.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "search.timeout_secs must be in range 1..=120".to_owned(),
        ));
    }

    Ok(())
}

fn validate_backfill(backfill: &BackfillConfig) -> Result<(), ConfigError> {
    if backfill.page_budget == 0 || backfill.page_budget > 100 {
        return Err(ConfigError::Validation(
            "backfill.page_budget must be in range 1..=100".to_owned(),
        ));
    }

    if backfill.max_passes == 0 {
        return Err(ConfigError::Validation(
            "backfill.max_passes must be greater than zero".to_owned(),
        ));
    }

    if backfill.mode == BackfillMode::Inline && backfill.max_passes > 1 {
        return Err(ConfigError::Validation(
            "backfill.max_passes above 1 requires backfill.mode = \"background\"".to_owned(),
        ));
    }

    Ok(())
}

fn validate_relay(relay: &RelayConfig) -> Result<(), ConfigError> {
    if !(1..=DEFAULT_HITS_PER_PAGE).contains(&relay.hits_per_page) {
        return Err(ConfigError::Validation(format!(
            "relay.hits_per_page must be in range 1..={DEFAULT_HITS_PER_PAGE}"
        )));
    }

    if !relay.color.starts_with('#') {
        return Err(ConfigError::Validation(
            "relay.color must be a hex color such as `#005500`".to_owned(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_owned()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_owned(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    search: Option<SearchPatch>,
    backfill: Option<BackfillPatch>,
    relay: Option<RelayPatch>,
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
struct SlackPatch {
    verification_token: Option<String>,
    api_base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    application_id: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BackfillPatch {
    page_budget: Option<u32>,
    mode: Option<BackfillMode>,
    max_passes: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RelayPatch {
    hits_per_page: Option<usize>,
    color: Option<String>,
    footer: Option<String>,
    footer_icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
