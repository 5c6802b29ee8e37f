//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{num::NonZeroUsize, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::render::{FORBIDDEN_TAGS, RenderOptions};

pub use cli::{CliArgs, Command, LoggingOverrides, RenderArgs, RenderOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "post-render";
const ENV_PREFIX: &str = "POST_RENDER";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub render: RenderOptions,
    pub memo: MemoSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Default)]
pub struct MemoSettings {
    /// `None` disables memoization.
    pub capacity: Option<NonZeroUsize>,
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

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("render.allowed_tags"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_logging_overrides(&cli.logging);
    if let Command::Render(args) = &cli.command {
        raw.apply_render_overrides(&args.overrides);
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    render: RawRenderSettings,
    memo: RawMemoSettings,
}

impl RawSettings {
    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(enabled) = overrides.enable_syntax_highlight {
            self.render.enable_syntax_highlight = Some(enabled);
        }
        if let Some(enabled) = overrides.enable_tables {
            self.render.enable_tables = Some(enabled);
        }
        if let Some(enabled) = overrides.enable_task_lists {
            self.render.enable_task_lists = Some(enabled);
        }
        if let Some(max_length) = overrides.max_length {
            self.render.max_length = Some(max_length);
        }
        if let Some(tags) = overrides.allowed_tags.as_ref() {
            self.render.allowed_tags = Some(tags.clone());
        }
        if let Some(capacity) = overrides.memo_capacity {
            self.memo.capacity = Some(capacity);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            render,
            memo,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let render = build_render_options(render)?;
        let memo = build_memo_settings(memo)?;

        Ok(Self {
            logging,
            render,
            memo,
        })
    }
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

fn build_render_options(render: RawRenderSettings) -> Result<RenderOptions, LoadError> {
    let defaults = RenderOptions::default();

    let max_length = render
        .max_length
        .map(|value| positive_usize(value, "render.max_length"))
        .transpose()?
        .map(NonZeroUsize::get);

    let allowed_tags = match render.allowed_tags {
        Some(tags) => Some(build_allowed_tags(tags)?),
        None => None,
    };

    Ok(RenderOptions {
        enable_syntax_highlight: render
            .enable_syntax_highlight
            .unwrap_or(defaults.enable_syntax_highlight),
        allowed_tags,
        max_length,
        enable_tables: render.enable_tables.unwrap_or(defaults.enable_tables),
        enable_task_lists: render
            .enable_task_lists
            .unwrap_or(defaults.enable_task_lists),
        sanitize_overrides: None,
    })
}

fn build_allowed_tags(tags: Vec<String>) -> Result<Vec<String>, LoadError> {
    let mut normalized = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_ascii_lowercase();
        if tag.is_empty() {
            continue;
        }
        if FORBIDDEN_TAGS.contains(&tag.as_str()) {
            return Err(LoadError::invalid(
                "render.allowed_tags",
                format!("`{tag}` can never be allowed"),
            ));
        }
        if !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    Ok(normalized)
}

fn build_memo_settings(memo: RawMemoSettings) -> Result<MemoSettings, LoadError> {
    let capacity = memo
        .capacity
        .map(|value| positive_usize(value, "memo.capacity"))
        .transpose()?;
    Ok(MemoSettings { capacity })
}

fn positive_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    enable_syntax_highlight: Option<bool>,
    enable_tables: Option<bool>,
    enable_task_lists: Option<bool>,
    max_length: Option<u64>,
    allowed_tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMemoSettings {
    capacity: Option<u64>,
}
