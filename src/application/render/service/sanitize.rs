use std::{borrow::Cow, cell::Cell};

use ammonia::Builder as AmmoniaBuilder;
use lol_html::{RewriteStrSettings, element, html_content::ContentType, rewrite_str, text};

use crate::application::render::types::{HtmlSanitizer, RenderError};

use super::config::SanitizePolicy;

const EXTERNAL_REL: [&str; 2] = ["noopener", "noreferrer"];

/// Allow-list sanitizer backed by Ammonia, followed by an enforcement pass that
/// pins down the few attributes Ammonia can only filter but not require.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmmoniaSanitizer;

impl HtmlSanitizer for AmmoniaSanitizer {
    fn sanitize(&self, html: &str, policy: &SanitizePolicy) -> Result<String, RenderError> {
        sanitize(html, policy)
    }
}

/// Strip everything outside `policy`, then enforce:
/// - `<input>` survives only as a disabled checkbox;
/// - `<img>` is lazily loaded when the policy allows `loading`;
/// - an anchor with a `target` always carries `rel="noopener noreferrer"`;
/// - a `<pre>` whose text starts with a line feed keeps it across passes.
pub fn sanitize(html: &str, policy: &SanitizePolicy) -> Result<String, RenderError> {
    let cleaned = build_sanitizer(policy).clean(html).to_string();
    enforce_attributes(&cleaned, policy)
}

fn build_sanitizer(policy: &SanitizePolicy) -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    builder
        .tags(policy.tags().clone())
        .clean_content_tags(policy.clean_content_tags())
        .generic_attributes(policy.generic_attributes().clone())
        .tag_attributes(policy.tag_attributes().clone())
        .url_schemes(policy.url_schemes().clone())
        .link_rel(None)
        .strip_comments(true);

    builder.attribute_filter(|element, attribute, value| {
        match (element, attribute) {
            ("input", "type") => value
                .trim()
                .eq_ignore_ascii_case("checkbox")
                .then_some(Cow::Borrowed("checkbox")),
            ("a", "target") => value
                .trim()
                .eq_ignore_ascii_case("_blank")
                .then_some(Cow::Borrowed("_blank")),
            _ => Some(Cow::Borrowed(value)),
        }
    });

    builder
}

fn enforce_attributes(html: &str, policy: &SanitizePolicy) -> Result<String, RenderError> {
    let lazy_images = policy.allows_attribute("img", "loading");
    // The parser drops the line feed right after `<pre>` and the serializer
    // does not write it back.
    let at_pre_start = Cell::new(false);

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("input", |el| {
                    let is_checkbox = el
                        .get_attribute("type")
                        .is_some_and(|kind| kind.eq_ignore_ascii_case("checkbox"));
                    if is_checkbox {
                        el.set_attribute("disabled", "")?;
                    } else {
                        el.remove();
                    }
                    Ok(())
                }),
                element!("img", |el| {
                    if lazy_images && el.get_attribute("loading").is_none() {
                        el.set_attribute("loading", "lazy")?;
                    }
                    Ok(())
                }),
                element!("a[target]", |el| {
                    let rel = merge_rel(el.get_attribute("rel"), &EXTERNAL_REL);
                    el.set_attribute("rel", &rel)?;
                    Ok(())
                }),
                element!("pre", |_el| {
                    at_pre_start.set(true);
                    Ok(())
                }),
                element!("pre *", |_el| {
                    at_pre_start.set(false);
                    Ok(())
                }),
                text!("pre", |chunk| {
                    if at_pre_start.get() && !chunk.as_str().is_empty() {
                        if chunk.as_str().starts_with('\n') {
                            chunk.before("\n", ContentType::Text);
                        }
                        at_pre_start.set(false);
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Sanitisation {
        message: err.to_string(),
    })
}

fn merge_rel(existing: Option<String>, required: &[&str]) -> String {
    let mut values: Vec<String> = existing
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect();

    for value in required {
        if !values.iter().any(|present| present == value) {
            values.push((*value).to_string());
        }
    }

    values.join(" ")
}
