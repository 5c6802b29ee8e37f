//! Markdown rendering pipeline.
//!
//! The pipeline is pure: it accepts markdown plus per-call options and returns
//! sanitized HTML. Every stage is configured from the options of the call it
//! serves; the grammar table and the optional memo are the only shared state.

mod memo;
mod service;
mod types;

pub use memo::{METRIC_MEMO_HIT_TOTAL, METRIC_MEMO_MISS_TOTAL, MemoizedRenderer};
pub use service::{
    AmmoniaSanitizer, ComrakEngine, ContentRenderer, ELLIPSIS, ExtensionSet, FORBIDDEN_TAGS,
    Handler, ItemExtension, ItemToken, METRIC_FALLBACK_TOTAL, METRIC_RENDER_MS,
    METRIC_RENDER_TOTAL, Recognition, RenderContext, RendererOverrides, SanitizePolicy,
    TaskListExtension, TokenKind, content_renderer, escape_fallback, render, sanitize,
    syntax_theme_css, truncate,
};
pub use types::{
    Highlighted, HtmlSanitizer, MarkdownEngine, RenderError, RenderOptions, SanitizeOverrides,
};
