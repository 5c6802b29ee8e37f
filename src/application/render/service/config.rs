use std::collections::{HashMap, HashSet};

use comrak::options::Options;

use crate::application::render::types::{RenderOptions, SanitizeOverrides};

/// Tags that never survive sanitisation, whatever the caller asks for.
pub const FORBIDDEN_TAGS: [&str; 16] = [
    "script", "style", "iframe", "object", "embed", "form", "button", "select", "textarea",
    "option", "frame", "frameset", "link", "meta", "base", "template",
];

/// Forbidden tags whose text content is dropped together with the tag.
const CLEAN_CONTENT_TAGS: [&str; 7] = [
    "script", "style", "iframe", "object", "template", "textarea", "select",
];

const BASE_TAGS: [&str; 45] = [
    "a",
    "abbr",
    "b",
    "blockquote",
    "br",
    "code",
    "dd",
    "del",
    "div",
    "dl",
    "dt",
    "em",
    "figcaption",
    "figure",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "i",
    "img",
    "input",
    "ins",
    "kbd",
    "li",
    "mark",
    "ol",
    "p",
    "pre",
    "s",
    "section",
    "span",
    "strong",
    "sub",
    "sup",
    "table",
    "tbody",
    "td",
    "th",
    "thead",
    "tr",
    "u",
    "ul",
];

const GENERIC_ATTRIBUTES: [&str; 7] = [
    "class",
    "title",
    "lang",
    "dir",
    "aria-hidden",
    "aria-label",
    "role",
];

const TAG_ATTRIBUTES: [(&str, &[&str]); 10] = [
    ("a", &["href", "target", "rel"]),
    (
        "img",
        &["src", "alt", "width", "height", "loading", "decoding"],
    ),
    ("code", &["data-language"]),
    ("pre", &["data-language"]),
    ("div", &["data-language"]),
    ("ol", &["start"]),
    ("th", &["align", "colspan", "rowspan", "scope"]),
    ("td", &["align", "colspan", "rowspan"]),
    ("input", &["type", "checked", "disabled"]),
    ("span", &["data-language"]),
];

const URL_SCHEMES: [&str; 4] = ["http", "https", "mailto", "tel"];

/// Parser configuration for one call. Tables are always recognised so that a
/// disabled table can be dropped as a whole instead of leaking as pipe text;
/// task markers are recognised by our own extension, not the library's.
pub(crate) fn parser_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = false;
    ext.superscript = false;
    ext.footnotes = false;

    // Keep backslash escapes as their own nodes so an escaped `\[x]` is never
    // merged into a task marker.
    options.parse.escaped_char_spans = true;

    let render = &mut options.render;
    render.r#unsafe = true;
    render.github_pre_lang = true;
    render.sourcepos = false;

    options
}

/// Explicit allow-list enforced at the sanitisation boundary.
///
/// Built fresh from [`RenderOptions`] on every call. Construction starts from the
/// base allow-list and only ever removes entries, so neither `allowed_tags` nor
/// [`SanitizeOverrides`] can re-admit anything in [`FORBIDDEN_TAGS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizePolicy {
    tags: HashSet<&'static str>,
    generic_attributes: HashSet<&'static str>,
    tag_attributes: HashMap<&'static str, HashSet<&'static str>>,
    url_schemes: HashSet<&'static str>,
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        let tags = BASE_TAGS
            .iter()
            .copied()
            .filter(|tag| !FORBIDDEN_TAGS.contains(tag))
            .collect();
        let tag_attributes = TAG_ATTRIBUTES
            .iter()
            .map(|(tag, attributes)| (*tag, attributes.iter().copied().collect()))
            .collect();

        Self {
            tags,
            generic_attributes: GENERIC_ATTRIBUTES.iter().copied().collect(),
            tag_attributes,
            url_schemes: URL_SCHEMES.iter().copied().collect(),
        }
    }
}

impl SanitizePolicy {
    pub fn from_options(options: &RenderOptions) -> Self {
        let mut policy = Self::default();

        if let Some(allowed) = options.allowed_tags.as_deref() {
            policy.retain_tags(allowed);
        }

        if let Some(overrides) = options.sanitize_overrides.as_ref() {
            policy.narrow(overrides);
        }

        policy
    }

    fn narrow(&mut self, overrides: &SanitizeOverrides) {
        if let Some(tags) = overrides.tags.as_deref() {
            self.retain_tags(tags);
        }

        if let Some(attributes) = overrides.attributes.as_deref() {
            self.generic_attributes
                .retain(|attribute| contains_ignore_case(attributes, attribute));
            for allowed in self.tag_attributes.values_mut() {
                allowed.retain(|attribute| contains_ignore_case(attributes, attribute));
            }
        }

        if let Some(schemes) = overrides.url_schemes.as_deref() {
            self.url_schemes
                .retain(|scheme| contains_ignore_case(schemes, scheme));
        }
    }

    fn retain_tags(&mut self, allowed: &[String]) {
        self.tags.retain(|tag| contains_ignore_case(allowed, tag));
        self.tag_attributes
            .retain(|tag, _| contains_ignore_case(allowed, tag));
    }

    pub fn allows_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn allows_attribute(&self, tag: &str, attribute: &str) -> bool {
        self.tags.contains(tag)
            && (self.generic_attributes.contains(attribute)
                || self
                    .tag_attributes
                    .get(tag)
                    .is_some_and(|allowed| allowed.contains(attribute)))
    }

    pub fn allows_url_scheme(&self, scheme: &str) -> bool {
        self.url_schemes.contains(scheme)
    }

    pub(crate) fn tags(&self) -> &HashSet<&'static str> {
        &self.tags
    }

    pub(crate) fn generic_attributes(&self) -> &HashSet<&'static str> {
        &self.generic_attributes
    }

    pub(crate) fn tag_attributes(&self) -> &HashMap<&'static str, HashSet<&'static str>> {
        &self.tag_attributes
    }

    pub(crate) fn url_schemes(&self) -> &HashSet<&'static str> {
        &self.url_schemes
    }

    pub(crate) fn clean_content_tags(&self) -> HashSet<&'static str> {
        CLEAN_CONTENT_TAGS
            .iter()
            .copied()
            .filter(|tag| !self.tags.contains(tag))
            .collect()
    }
}

fn contains_ignore_case(haystack: &[String], needle: &str) -> bool {
    haystack
        .iter()
        .any(|candidate| candidate.trim().eq_ignore_ascii_case(needle))
}
