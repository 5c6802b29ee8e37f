use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::Lazy;
use syntect::{
    dumps::from_uncompressed_data,
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};
use tracing::{debug, warn};

use crate::application::render::types::{Highlighted, RenderError};

pub(crate) const PLAIN_LANGUAGE: &str = "text";

static SYNTAX_ENGINE: Lazy<SyntaxEngine> = Lazy::new(SyntaxEngine::load);

/// Stylesheet matching the `syntax-` classes emitted by the highlighter.
pub fn syntax_theme_css() -> &'static str {
    include_str!(env!("SYNTAX_THEME_CSS_FILE"))
}

/// Immutable grammar table shared by every render call.
pub(crate) struct SyntaxEngine {
    syntax_set: Option<SyntaxSet>,
    class_style: ClassStyle,
}

impl SyntaxEngine {
    pub(crate) fn shared() -> &'static SyntaxEngine {
        &SYNTAX_ENGINE
    }

    fn load() -> Self {
        let syntax_bytes = include_bytes!(env!("SYNTAX_PACK_FILE"));
        let syntax_set = match from_uncompressed_data::<SyntaxSet>(syntax_bytes) {
            Ok(set) => Some(set),
            Err(err) => {
                warn!(
                    target = "application::render::highlight",
                    error = %err,
                    "Syntax pack could not be loaded; code blocks will render unhighlighted"
                );
                None
            }
        };

        Self {
            syntax_set,
            class_style: ClassStyle::SpacedPrefixed { prefix: "syntax-" },
        }
    }

    #[cfg(test)]
    pub(crate) fn unavailable() -> Self {
        Self {
            syntax_set: None,
            class_style: ClassStyle::SpacedPrefixed { prefix: "syntax-" },
        }
    }
}

/// Highlight `code` with its declared grammar, falling back to detection and
/// finally to escaped plain text. Never fails.
pub(crate) fn highlight(code: &str, declared: Option<&str>, engine: &SyntaxEngine) -> Highlighted {
    let Some(syntax_set) = engine.syntax_set.as_ref() else {
        return plain(code);
    };

    if let Some(language) = declared.map(str::trim).filter(|lang| !lang.is_empty()) {
        match find_syntax(syntax_set, language) {
            Some(syntax) => match classed_html(code, syntax, syntax_set, &engine.class_style) {
                Ok(html) => {
                    return Highlighted {
                        html,
                        language_used: language.to_ascii_lowercase(),
                    };
                }
                Err(err) => debug!(
                    target = "application::render::highlight",
                    error = %err,
                    "Declared grammar failed; attempting detection"
                ),
            },
            None => debug!(
                target = "application::render::highlight",
                language,
                "Unknown language; attempting detection"
            ),
        }
    }

    detect(code, syntax_set, &engine.class_style).unwrap_or_else(|| plain(code))
}

/// Escaped, unhighlighted code, terminated by a line feed like highlighted output.
pub(crate) fn plain(code: &str) -> Highlighted {
    let mut html = ammonia::clean_text(code.strip_suffix('\n').unwrap_or(code));
    html.push('\n');
    Highlighted {
        html,
        language_used: PLAIN_LANGUAGE.to_string(),
    }
}

fn detect(code: &str, syntax_set: &SyntaxSet, class_style: &ClassStyle) -> Option<Highlighted> {
    let syntax = syntax_set.find_syntax_by_first_line(code)?;
    if syntax.name == syntax_set.find_syntax_plain_text().name {
        return None;
    }

    let html = classed_html(code, syntax, syntax_set, class_style)
        .map_err(|err| {
            debug!(
                target = "application::render::highlight",
                error = %err,
                "Detected grammar failed; rendering plain text"
            );
        })
        .ok()?;

    let language_used = syntax
        .file_extensions
        .first()
        .cloned()
        .unwrap_or_else(|| syntax.name.to_ascii_lowercase());

    Some(Highlighted {
        html,
        language_used,
    })
}

fn classed_html(
    code: &str,
    syntax: &SyntaxReference,
    syntax_set: &SyntaxSet,
    class_style: &ClassStyle,
) -> Result<String, RenderError> {
    let generate = || {
        let mut code_with_newline = code.to_string();
        if !code_with_newline.ends_with('\n') {
            code_with_newline.push('\n');
        }

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, *class_style);

        for line in LinesWithEndings::from(code_with_newline.as_str()) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|err| RenderError::Highlighting {
                    language: syntax.name.clone(),
                    message: err.to_string(),
                })?;
        }

        Ok(generator.finalize())
    };

    panic::catch_unwind(AssertUnwindSafe(generate)).unwrap_or_else(|_| {
        Err(RenderError::Highlighting {
            language: syntax.name.clone(),
            message: "highlighter panicked".to_string(),
        })
    })
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(token))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_language_is_highlighted() {
        let result = highlight("fn main() {}\n", Some("rust"), SyntaxEngine::shared());
        assert_eq!(result.language_used, "rust");
        assert!(result.html.contains("syntax-"));
    }

    #[test]
    fn declared_language_matches_case_insensitively() {
        let result = highlight("fn main() {}\n", Some("Rust"), SyntaxEngine::shared());
        assert_eq!(result.language_used, "rust");
    }

    #[test]
    fn unknown_language_falls_back_to_escaped_text() {
        let result = highlight("<b>x</b> && y", Some("xyzzy123"), SyntaxEngine::shared());
        assert_eq!(result.language_used, PLAIN_LANGUAGE);
        assert_eq!(result.html, "&lt;b&gt;x&lt;&#47;b&gt;&#32;&amp;&amp;&#32;y\n");
    }

    #[test]
    fn shebang_is_detected_without_a_declared_language() {
        let result = highlight(
            "#!/usr/bin/env python3\nprint('hi')\n",
            None,
            SyntaxEngine::shared(),
        );
        assert_eq!(result.language_used, "py");
        assert!(result.html.contains("syntax-"));
    }

    #[test]
    fn missing_grammar_table_degrades_to_plain_text() {
        let engine = SyntaxEngine::unavailable();
        let result = highlight("let x = 1 < 2;", Some("rust"), &engine);
        assert_eq!(
            result,
            Highlighted {
                html: "let&#32;x&#32;&#61;&#32;1&#32;&lt;&#32;2;\n".to_string(),
                language_used: PLAIN_LANGUAGE.to_string(),
            }
        );
    }

    #[test]
    fn highlighted_output_escapes_markup() {
        let result = highlight("<script>alert(1)</script>", Some("html"), SyntaxEngine::shared());
        assert!(!result.html.contains("<script>"));
        assert!(result.html.contains("&lt;"));
    }
}
