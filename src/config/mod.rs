//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;
use uuid::Uuid;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "feedsync";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_API_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_POST_CHARS: usize = 512;
const DEFAULT_MAX_COMMENT_CHARS: usize = 256;
const DEFAULT_HISTORY_LIMIT: usize = 64;
const DEFAULT_PAGE_SIZE: u32 = 10;

/// Command-line arguments for the feedsync binary.
#[derive(Debug, Parser)]
#[command(name = "feedsync", version, about = "Social feed client with a consistent view cache")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FEEDSYNC_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the API base URL.
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// Override the bearer token sent with every request.
    #[arg(long = "api-token", value_name = "TOKEN", global = true)]
    pub api_token: Option<String>,

    /// Override the request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS", global = true)]
    pub api_timeout_seconds: Option<u64>,

    /// Act as this user; required by mutating commands.
    #[arg(long = "viewer-id", value_name = "UUID", global = true)]
    pub viewer_id: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print a post list.
    Feed(FeedArgs),
    /// Print one post.
    Post(PostArgs),
    /// Print the comment thread of a post.
    Comments(CommentsArgs),
    /// Create a post, comment, response or repost.
    Create(CreateArgs),
    /// Like or dislike a post; repeating a vote clears it.
    React(ReactArgs),
    /// Toggle a post in the viewer's favorites.
    Favorite(PostArgs),
    /// Change the text or comment flag of a post.
    Edit(EditArgs),
    /// Delete a post.
    Delete(PostArgs),
    /// Follow a user.
    Follow(UserArgs),
    /// Stop following a user.
    Unfollow(UserArgs),
    /// Print a user profile.
    Profile(UserArgs),
    /// Print the revision history of a post.
    History(PostArgs),
    /// Print the most used tags.
    Tags,
}

#[derive(Debug, Args, Clone)]
pub struct FeedArgs {
    /// Posts of one user.
    #[arg(long, value_name = "UUID", conflicts_with_all = ["tag", "search", "favorites"])]
    pub user: Option<Uuid>,

    /// Posts carrying a tag.
    #[arg(long, value_name = "TAG", conflicts_with_all = ["search", "favorites"])]
    pub tag: Option<String>,

    /// Full-text search.
    #[arg(long, value_name = "QUERY", conflicts_with = "favorites")]
    pub search: Option<String>,

    /// The viewer's favorites.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub favorites: bool,

    /// Number of pages to load.
    #[arg(long, default_value_t = 1)]
    pub pages: u32,
}

#[derive(Debug, Args, Clone)]
pub struct PostArgs {
    #[arg(value_name = "POST_ID")]
    pub id: Uuid,
}

#[derive(Debug, Args, Clone)]
pub struct UserArgs {
    #[arg(value_name = "USER_ID")]
    pub id: Uuid,
}

#[derive(Debug, Args, Clone)]
pub struct CommentsArgs {
    #[arg(value_name = "POST_ID")]
    pub id: Uuid,

    /// Number of comment pages to load.
    #[arg(long, default_value_t = 1)]
    pub pages: u32,

    /// Also load the first page of responses to this comment.
    #[arg(long = "responses-of", value_name = "COMMENT_ID")]
    pub responses_of: Option<Uuid>,
}

#[derive(Debug, Args, Clone)]
pub struct CreateArgs {
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Repost this post.
    #[arg(long = "repost-of", value_name = "POST_ID", conflicts_with = "comment_on")]
    pub repost_of: Option<Uuid>,

    /// Comment on this post.
    #[arg(long = "comment-on", value_name = "POST_ID")]
    pub comment_on: Option<Uuid>,

    /// Respond inside this comment's thread; requires --comment-on.
    #[arg(long = "respond-to", value_name = "COMMENT_ID", requires = "comment_on")]
    pub respond_to: Option<Uuid>,

    /// Disallow comments on the new post.
    #[arg(long = "no-comments", action = clap::ArgAction::SetTrue)]
    pub no_comments: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ReactArgs {
    #[arg(value_name = "POST_ID")]
    pub id: Uuid,

    /// Dislike instead of like.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub dislike: bool,

    /// Post the reacted comment or response belongs to.
    #[arg(long = "comment-to", value_name = "POST_ID")]
    pub comment_to: Option<Uuid>,

    /// Comment the reacted response belongs to.
    #[arg(long = "response-to", value_name = "COMMENT_ID", requires = "comment_to")]
    pub response_to: Option<Uuid>,
}

#[derive(Debug, Args, Clone)]
pub struct EditArgs {
    #[arg(value_name = "POST_ID")]
    pub id: Uuid,

    /// Replacement text.
    #[arg(long, value_name = "TEXT")]
    pub text: Option<String>,

    /// Allow or disallow comments.
    #[arg(long = "can-comment", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub can_comment: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
    pub viewer_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub max_post_chars: usize,
    pub max_comment_chars: usize,
    pub history_limit: usize,
    pub page_size: u32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FEEDSYNC").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    api: RawApiSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(token) = overrides.api_token.as_ref() {
            self.api.token = Some(token.clone());
        }
        if let Some(seconds) = overrides.api_timeout_seconds {
            self.api.timeout_seconds = Some(seconds);
        }
        if let Some(viewer) = overrides.viewer_id.as_ref() {
            self.api.viewer_id = Some(viewer.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            api,
            logging,
            cache,
        } = raw;

        let api = build_api_settings(api)?;
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self {
            api,
            logging,
            cache,
        })
    }
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let raw_url = api
        .base_url
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    let mut base_url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("api.base_url", format!("failed to parse: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "api.base_url",
            "scheme must be http or https",
        ));
    }
    // Relative joins keep the last path segment only with a trailing slash.
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }

    let token = api.token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let timeout_secs = api.timeout_seconds.unwrap_or(DEFAULT_API_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "api.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let viewer_id = match api.viewer_id {
        Some(value) if !value.trim().is_empty() => Some(
            Uuid::parse_str(value.trim())
                .map_err(|err| LoadError::invalid("api.viewer_id", err.to_string()))?,
        ),
        _ => None,
    };

    Ok(ApiSettings {
        base_url,
        token,
        timeout: Duration::from_secs(timeout_secs),
        viewer_id,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let max_post_chars = non_zero_usize(
        cache.max_post_chars.unwrap_or(DEFAULT_MAX_POST_CHARS),
        "cache.max_post_chars",
    )?;
    let max_comment_chars = non_zero_usize(
        cache.max_comment_chars.unwrap_or(DEFAULT_MAX_COMMENT_CHARS),
        "cache.max_comment_chars",
    )?;
    let history_limit = cache.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1);

    let page_size = cache.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size == 0 {
        return Err(LoadError::invalid(
            "cache.page_size",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        max_post_chars,
        max_comment_chars,
        history_limit,
        page_size,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    token: Option<String>,
    timeout_seconds: Option<u64>,
    viewer_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    max_post_chars: Option<usize>,
    max_comment_chars: Option<usize>,
    history_limit: Option<usize>,
    page_size: Option<u32>,
}

fn non_zero_usize(value: usize, key: &'static str) -> Result<usize, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
