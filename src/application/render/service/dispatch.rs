use std::{collections::HashMap, fmt, mem};

use comrak::{
    format_html,
    nodes::{AstNode, NodeHtmlBlock, NodeValue},
    options::Options,
};
use url::Url;

use crate::application::render::types::RenderError;

use super::extensions::{ExtensionSet, ItemToken};
use super::fallback::{escape_attribute, escape_html};
use super::highlight::{self, SyntaxEngine};

/// Node kinds whose rendering can be overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Link,
    Image,
    CodeBlock,
    Table,
    ListItem,
}

impl TokenKind {
    pub fn of(value: &NodeValue) -> Option<Self> {
        match value {
            NodeValue::Link(_) => Some(Self::Link),
            NodeValue::Image(_) => Some(Self::Image),
            NodeValue::CodeBlock(_) => Some(Self::CodeBlock),
            NodeValue::Table(_) => Some(Self::Table),
            NodeValue::Item(_) => Some(Self::ListItem),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Image => "image",
            Self::CodeBlock => "code_block",
            Self::Table => "table",
            Self::ListItem => "list_item",
        }
    }
}

/// A handler replaces its node in place with raw HTML.
pub type Handler =
    for<'a, 'c> fn(&'a AstNode<'a>, &mut RenderContext<'c>) -> Result<(), RenderError>;

/// Per-kind overrides; kinds without an entry keep the library rendering.
#[derive(Clone, Default)]
pub struct RendererOverrides {
    handlers: HashMap<TokenKind, Handler>,
}

impl fmt::Debug for RendererOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.handlers.keys().map(|kind| kind.as_str()))
            .finish()
    }
}

impl RendererOverrides {
    pub fn standard() -> Self {
        Self::default()
            .with(TokenKind::Link, render_link)
            .with(TokenKind::Image, render_image)
            .with(TokenKind::CodeBlock, render_code_block)
            .with(TokenKind::Table, render_table)
            .with(TokenKind::ListItem, render_list_item)
    }

    pub fn with(mut self, kind: TokenKind, handler: Handler) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn without(mut self, kind: TokenKind) -> Self {
        self.handlers.remove(&kind);
        self
    }

    pub fn handler(&self, kind: TokenKind) -> Option<Handler> {
        self.handlers.get(&kind).copied()
    }
}

/// State shared by the handlers of a single render call.
pub struct RenderContext<'c> {
    pub(crate) comrak: &'c Options<'static>,
    pub(crate) syntax: &'c SyntaxEngine,
    pub(crate) highlight: bool,
    pub(crate) tables: bool,
    pub(crate) item_token: Option<ItemToken>,
}

impl<'c> RenderContext<'c> {
    /// HTML for the children of `node`, rendered with the library formatter.
    pub fn render_children<'a>(&self, node: &'a AstNode<'a>) -> Result<String, RenderError> {
        let mut html = String::new();
        for child in node.children() {
            self.render_node_into(child, &mut html)?;
        }
        Ok(html)
    }

    pub fn render_node<'a>(&self, node: &'a AstNode<'a>) -> Result<String, RenderError> {
        let mut html = String::new();
        self.render_node_into(node, &mut html)?;
        Ok(html)
    }

    fn render_node_into<'a>(
        &self,
        node: &'a AstNode<'a>,
        html: &mut String,
    ) -> Result<(), RenderError> {
        format_html(node, self.comrak, html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })
    }

    /// Token recognised for the list item currently being rendered.
    pub fn item_token(&self) -> Option<ItemToken> {
        self.item_token
    }
}

/// Walk the tree bottom-up, replacing every node that has a handler.
/// Item extensions run before an item's children are visited.
pub(crate) fn render_tree<'a>(
    node: &'a AstNode<'a>,
    overrides: &RendererOverrides,
    extensions: &ExtensionSet,
    ctx: &mut RenderContext<'_>,
) -> Result<(), RenderError> {
    let kind = TokenKind::of(&node.data.borrow().value);

    let item_token = match kind {
        Some(TokenKind::ListItem) => extensions.apply_to_item(node),
        _ => None,
    };

    let mut child = node.first_child();
    while let Some(current) = child {
        child = current.next_sibling();
        render_tree(current, overrides, extensions, ctx)?;
    }

    let Some(handler) = kind.and_then(|kind| overrides.handler(kind)) else {
        return Ok(());
    };

    let previous = mem::replace(&mut ctx.item_token, item_token);
    let outcome = handler(node, ctx);
    ctx.item_token = previous;
    outcome
}

fn replace_inline<'a>(node: &'a AstNode<'a>, html: String) {
    node.data.borrow_mut().value = NodeValue::HtmlInline(html);
    detach_children(node);
}

fn replace_block<'a>(node: &'a AstNode<'a>, html: String) {
    node.data.borrow_mut().value = NodeValue::HtmlBlock(NodeHtmlBlock {
        block_type: 0,
        literal: html,
    });
    detach_children(node);
}

fn detach_children<'a>(node: &'a AstNode<'a>) {
    while let Some(child) = node.first_child() {
        child.detach();
    }
}

fn is_external(url: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https"))
}

fn render_link<'a>(node: &'a AstNode<'a>, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
    let (url, title) = match &node.data.borrow().value {
        NodeValue::Link(link) => (link.url.clone(), link.title.clone()),
        _ => return Ok(()),
    };

    let label = ctx.render_children(node)?;

    let mut html = String::with_capacity(url.len() + label.len() + 64);
    html.push_str("<a href=\"");
    html.push_str(&escape_attribute(&url));
    html.push('"');
    if !title.is_empty() {
        html.push_str(" title=\"");
        html.push_str(&escape_attribute(&title));
        html.push('"');
    }
    if is_external(&url) {
        html.push_str(" target=\"_blank\" rel=\"noopener noreferrer\"");
    }
    html.push('>');
    html.push_str(&label);
    html.push_str("</a>");

    replace_inline(node, html);
    Ok(())
}

fn render_image<'a>(
    node: &'a AstNode<'a>,
    _ctx: &mut RenderContext<'_>,
) -> Result<(), RenderError> {
    let (src, title) = match &node.data.borrow().value {
        NodeValue::Image(link) => (link.url.clone(), link.title.clone()),
        _ => return Ok(()),
    };

    let alt_raw = collect_inline_text(node);
    let alt = alt_raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut html = String::with_capacity(src.len() + alt.len() + 64);
    html.push_str("<img src=\"");
    html.push_str(&escape_attribute(&src));
    html.push_str("\" alt=\"");
    html.push_str(&escape_attribute(&alt));
    html.push('"');
    if !title.is_empty() {
        html.push_str(" title=\"");
        html.push_str(&escape_attribute(&title));
        html.push('"');
    }
    html.push_str(" loading=\"lazy\" decoding=\"async\" />");

    replace_inline(node, html);
    Ok(())
}

fn render_code_block<'a>(
    node: &'a AstNode<'a>,
    ctx: &mut RenderContext<'_>,
) -> Result<(), RenderError> {
    let (info, literal) = match &node.data.borrow().value {
        NodeValue::CodeBlock(block) => (block.info.clone(), block.literal.clone()),
        _ => return Ok(()),
    };

    let declared = info.split_whitespace().next();
    let highlighted = if ctx.highlight {
        highlight::highlight(&literal, declared, ctx.syntax)
    } else {
        highlight::plain(&literal)
    };

    replace_block(
        node,
        build_code_block(&highlighted.html, &highlighted.language_used),
    );
    Ok(())
}

fn build_code_block(body: &str, language: &str) -> String {
    let label = escape_html(language);
    let attribute = escape_attribute(language);
    let slug = language_slug(language);

    let mut html = String::with_capacity(body.len() + 256);
    html.push_str("<div class=\"code-block\" data-language=\"");
    html.push_str(&attribute);
    html.push_str("\"><div class=\"code-block-header\"><span class=\"code-block-language\">");
    html.push_str(&label);
    html.push_str("</span></div><pre class=\"syntax-highlight syntax-lang-");
    html.push_str(&slug);
    html.push_str("\" data-language=\"");
    html.push_str(&attribute);
    html.push_str("\"><code class=\"language-");
    html.push_str(&slug);
    html.push_str(" syntax-code\">");
    html.push_str(body);
    if !body.ends_with('\n') {
        html.push('\n');
    }
    html.push_str("</code></pre></div>\n");
    html
}

fn language_slug(language: &str) -> String {
    let slug: String = language
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        highlight::PLAIN_LANGUAGE.to_string()
    } else {
        slug.to_string()
    }
}

fn render_table<'a>(node: &'a AstNode<'a>, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
    if !ctx.tables {
        replace_block(node, String::new());
        return Ok(());
    }

    let table = ctx.render_node(node)?;
    replace_block(node, format!("<div class=\"table-wrapper\">{table}</div>\n"));
    Ok(())
}

fn render_list_item<'a>(
    node: &'a AstNode<'a>,
    ctx: &mut RenderContext<'_>,
) -> Result<(), RenderError> {
    let Some(ItemToken::Task { checked }) = ctx.item_token() else {
        return Ok(());
    };

    let body = ctx.render_children(node)?;
    let body = body.trim_end_matches('\n');

    let mut checkbox = String::from(
        "<input type=\"checkbox\" class=\"task-list-item-checkbox\" disabled=\"\"",
    );
    if checked {
        checkbox.push_str(" checked=\"\"");
    }
    checkbox.push_str(" /> ");

    let mut html = String::with_capacity(body.len() + 128);
    html.push_str("<li class=\"task-list-item\">");
    // Loose items wrap their text in paragraphs; the box goes inside the first one.
    match body.strip_prefix("<p>") {
        Some(rest) => {
            html.push_str("<p>");
            html.push_str(&checkbox);
            html.push_str(rest);
        }
        None => {
            html.push_str(&checkbox);
            html.push_str(body);
        }
    }
    html.push_str("</li>\n");

    replace_block(node, html);
    Ok(())
}

fn collect_inline_text<'a>(node: &'a AstNode<'a>) -> String {
    fn walk<'a>(node: &'a AstNode<'a>, buffer: &mut String) {
        match &node.data.borrow().value {
            NodeValue::Text(text) => buffer.push_str(text),
            NodeValue::Code(code) => buffer.push_str(&code.literal),
            NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
            _ => {}
        }
        for child in node.children() {
            walk(child, buffer);
        }
    }

    let mut text = String::new();
    for child in node.children() {
        walk(child, &mut text);
    }
    text
}
