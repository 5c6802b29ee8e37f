use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the post-render binary.
#[derive(Debug, Parser)]
#[command(
    name = "post-render",
    version,
    about = "Render markdown posts into sanitized HTML"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "POST_RENDER_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render markdown files (or `-` for stdin) and print the HTML.
    Render(RenderArgs),
    /// Print the stylesheet for highlighted code blocks.
    #[command(name = "theme-css")]
    ThemeCss,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Markdown inputs; `-` reads standard input.
    #[arg(
        value_name = "FILE",
        required = true,
        num_args = 1..,
        value_hint = ValueHint::FilePath
    )]
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub overrides: RenderOverrides,

    /// Print the fragment before sanitisation. Output is unsafe; diagnostics only.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub unsanitized: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
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

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Toggle syntax highlighting of fenced code.
    #[arg(
        long = "syntax-highlight",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub enable_syntax_highlight: Option<bool>,

    /// Toggle table rendering.
    #[arg(
        long = "tables",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub enable_tables: Option<bool>,

    /// Toggle task-list checkboxes.
    #[arg(
        long = "task-lists",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub enable_task_lists: Option<bool>,

    /// Truncate the source to this many characters before rendering.
    #[arg(long = "max-length", value_name = "CHARS")]
    pub max_length: Option<u64>,

    /// Comma-separated tag allow-list narrowing the sanitizer policy.
    #[arg(long = "allowed-tags", value_name = "TAGS", value_delimiter = ',')]
    pub allowed_tags: Option<Vec<String>>,

    /// Override the memo capacity.
    #[arg(long = "memo-capacity", value_name = "ENTRIES")]
    pub memo_capacity: Option<u64>,
}
