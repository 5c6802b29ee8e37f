mod config;
mod dispatch;
mod extensions;
mod fallback;
mod highlight;
mod sanitize;
mod truncate;

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};

use comrak::{Arena, parse_document};
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::application::render::types::{
    HtmlSanitizer, MarkdownEngine, RenderError, RenderOptions,
};

pub use config::{FORBIDDEN_TAGS, SanitizePolicy};
pub use dispatch::{Handler, RenderContext, RendererOverrides, TokenKind};
pub use extensions::{ExtensionSet, ItemExtension, ItemToken, Recognition, TaskListExtension};
pub use fallback::escape_fallback;
pub use highlight::syntax_theme_css;
pub use sanitize::{AmmoniaSanitizer, sanitize};
pub use truncate::{ELLIPSIS, truncate};

use config::parser_options;
use dispatch::render_tree;
use highlight::SyntaxEngine;

pub const METRIC_RENDER_TOTAL: &str = "post_render_render_total";
pub const METRIC_FALLBACK_TOTAL: &str = "post_render_fallback_total";
pub const METRIC_RENDER_MS: &str = "post_render_render_ms";

/// Comrak-backed tokenizer and renderer with Syntect highlighting.
pub struct ComrakEngine {
    overrides: RendererOverrides,
    extensions: Vec<Arc<dyn ItemExtension>>,
    syntax: &'static SyntaxEngine,
}

impl ComrakEngine {
    pub fn new() -> Self {
        Self {
            overrides: RendererOverrides::standard(),
            extensions: Vec::new(),
            syntax: SyntaxEngine::shared(),
        }
    }

    pub fn with_overrides(mut self, overrides: RendererOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Register an additional list-item extension, consulted after the built-ins.
    pub fn with_extension(mut self, extension: Arc<dyn ItemExtension>) -> Self {
        self.extensions.push(extension);
        self
    }
}

impl Default for ComrakEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownEngine for ComrakEngine {
    fn render_fragment(
        &self,
        source: &str,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        let comrak = parser_options();
        let extensions = ExtensionSet::from_options(options, &self.extensions);

        let arena = Arena::new();
        let root = parse_document(&arena, source, &comrak);

        let mut ctx = RenderContext {
            comrak: &comrak,
            syntax: self.syntax,
            highlight: options.enable_syntax_highlight,
            tables: options.enable_tables,
            item_token: None,
        };

        render_tree(root, &self.overrides, &extensions, &mut ctx)?;
        ctx.render_node(root)
    }
}

/// Markdown to sanitized HTML. Rendering never fails from the caller's point
/// of view: any error or panic in the pipeline yields the escaped source instead.
pub struct ContentRenderer {
    engine: Arc<dyn MarkdownEngine>,
    sanitizer: Arc<dyn HtmlSanitizer>,
}

impl ContentRenderer {
    pub fn new() -> Self {
        Self::with_parts(Arc::new(ComrakEngine::new()), Arc::new(AmmoniaSanitizer))
    }

    pub fn with_parts(engine: Arc<dyn MarkdownEngine>, sanitizer: Arc<dyn HtmlSanitizer>) -> Self {
        Self { engine, sanitizer }
    }

    pub fn render(&self, content: &str, options: &RenderOptions) -> String {
        let started_at = Instant::now();
        let source = truncate(content, options.max_length);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_render(&source, options)))
            .unwrap_or_else(|payload| {
                Err(RenderError::Panicked {
                    message: panic_message(payload.as_ref()),
                })
            });

        match outcome {
            Ok(html) => {
                counter!(METRIC_RENDER_TOTAL).increment(1);
                histogram!(METRIC_RENDER_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
                html
            }
            Err(err) => {
                warn!(
                    target = "application::render::service",
                    stage = err.stage(),
                    error = %err,
                    "Render failed; serving escaped source"
                );
                counter!(METRIC_FALLBACK_TOTAL, "stage" => err.stage()).increment(1);
                escape_fallback(&source)
            }
        }
    }

    /// Render markdown into HTML while skipping the sanitisation stage. This is
    /// intended for diagnostics when refining sanitizer rules; the output is unsafe.
    pub fn render_unsanitized(
        &self,
        content: &str,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        let source = truncate(content, options.max_length);
        self.engine.render_fragment(&source, options)
    }

    fn try_render(&self, source: &str, options: &RenderOptions) -> Result<String, RenderError> {
        let fragment = self.engine.render_fragment(source, options)?;
        let policy = SanitizePolicy::from_options(options);
        let html = self.sanitizer.sanitize(&fragment, &policy)?;
        debug!(
            target = "application::render::service",
            source_len = source.len(),
            html_len = html.len(),
            "Rendered fragment"
        );
        Ok(html)
    }
}

impl Default for ContentRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

static CONTENT_RENDERER: Lazy<Arc<ContentRenderer>> =
    Lazy::new(|| Arc::new(ContentRenderer::new()));

/// Access the shared renderer instance, initialised on first use.
pub fn content_renderer() -> Arc<ContentRenderer> {
    Arc::clone(&CONTENT_RENDERER)
}

/// Render `content` with the shared renderer.
pub fn render(content: &str, options: &RenderOptions) -> String {
    CONTENT_RENDERER.render(content, options)
}
