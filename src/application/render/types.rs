use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::service::SanitizePolicy;

/// Per-call rendering configuration. A fresh value is expected for every call;
/// nothing derived from it outlives the call that received it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Run fenced code through the syntax highlighter.
    pub enable_syntax_highlight: bool,
    /// Narrows the base tag allow-list. `None` keeps the full base list.
    pub allowed_tags: Option<Vec<String>>,
    /// Maximum number of characters of source text fed to the parser.
    pub max_length: Option<usize>,
    /// Render tables; when disabled, table constructs are dropped entirely.
    pub enable_tables: bool,
    /// Recognise `[x]` / `[ ]` markers at the start of list items.
    pub enable_task_lists: bool,
    /// Further narrowing of the sanitizer policy.
    pub sanitize_overrides: Option<SanitizeOverrides>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            enable_syntax_highlight: true,
            allowed_tags: None,
            max_length: None,
            enable_tables: true,
            enable_task_lists: true,
            sanitize_overrides: None,
        }
    }
}

impl RenderOptions {
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_syntax_highlight(mut self, enabled: bool) -> Self {
        self.enable_syntax_highlight = enabled;
        self
    }

    pub fn with_tables(mut self, enabled: bool) -> Self {
        self.enable_tables = enabled;
        self
    }

    pub fn with_task_lists(mut self, enabled: bool) -> Self {
        self.enable_task_lists = enabled;
        self
    }

    pub fn with_allowed_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_sanitize_overrides(mut self, overrides: SanitizeOverrides) -> Self {
        self.sanitize_overrides = Some(overrides);
        self
    }
}

/// Caller-supplied narrowing of the sanitizer policy. Every field can only
/// remove entries from the base policy; names outside the base policy are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOverrides {
    pub tags: Option<Vec<String>>,
    pub attributes: Option<Vec<String>>,
    pub url_schemes: Option<Vec<String>>,
}

/// Result of the highlighting adapter. `language_used` is `"text"` whenever the
/// body is plain escaped code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighted {
    pub html: String,
    pub language_used: String,
}

/// Structured errors surfaced by the rendering pipeline. None of these ever reach
/// rendered output; the top-level adapter converts them into the escape fallback.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown formatting failed: {message}")]
    Markdown { message: String },
    #[error("renderer for {token} failed: {message}")]
    Rendering { token: &'static str, message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
    #[error("sanitisation failed: {message}")]
    Sanitisation { message: String },
    #[error("render stage panicked: {message}")]
    Panicked { message: String },
}

impl RenderError {
    /// Pipeline stage the error originated from, used as a metrics label.
    pub fn stage(&self) -> &'static str {
        match self {
            RenderError::Markdown { .. } | RenderError::Rendering { .. } => "rendering",
            RenderError::Highlighting { .. } => "highlighting",
            RenderError::Sanitisation { .. } => "sanitizing",
            RenderError::Panicked { .. } => "panic",
        }
    }
}

/// Tokenize-and-render half of the pipeline: markdown in, unsanitized HTML out.
/// Implementations must derive all grammar and renderer configuration from the
/// `options` passed to each call.
pub trait MarkdownEngine: Send + Sync {
    fn render_fragment(&self, source: &str, options: &RenderOptions)
    -> Result<String, RenderError>;
}

/// The security gate every successful render passes through.
pub trait HtmlSanitizer: Send + Sync {
    fn sanitize(&self, html: &str, policy: &SanitizePolicy) -> Result<String, RenderError>;
}
