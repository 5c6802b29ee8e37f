use std::sync::Arc;

use post_render::application::render::{
    AmmoniaSanitizer, ContentRenderer, FORBIDDEN_TAGS, HtmlSanitizer, MarkdownEngine,
    RenderError, RenderOptions, SanitizeOverrides, SanitizePolicy, content_renderer, render,
    sanitize,
};

fn load_markdown() -> &'static str {
    include_str!("fixtures/gfm_features.md")
}

struct FailingEngine;

impl MarkdownEngine for FailingEngine {
    fn render_fragment(&self, _: &str, _: &RenderOptions) -> Result<String, RenderError> {
        Err(RenderError::Markdown {
            message: "forced failure".to_string(),
        })
    }
}

struct FailingSanitizer;

impl HtmlSanitizer for FailingSanitizer {
    fn sanitize(&self, _: &str, _: &SanitizePolicy) -> Result<String, RenderError> {
        Err(RenderError::Sanitisation {
            message: "forced failure".to_string(),
        })
    }
}

const ADVERSARIAL: [&str; 12] = [
    "<script>alert(1)</script>",
    "[click](javascript:alert(1))",
    "![x](javascript:alert(1))",
    "<img src=x onerror=alert(1)>",
    "<iframe src=\"https://evil.example\"></iframe>",
    "<a href=\"JAVASCRIPT:alert(1)\">x</a>",
    "<a href=\"java&#x09;script:alert(1)\">x</a>",
    "<svg onload=alert(1)><circle r=\"4\"/></svg>",
    "<form action=\"/x\"><input type=\"text\" name=\"q\"><button>go</button></form>",
    "<style>body{display:none}</style><link rel=\"stylesheet\" href=\"x.css\">",
    "<object data=\"x\"></object><embed src=\"x\"><meta http-equiv=\"refresh\" content=\"0\">",
    "<template><p>hidden</p></template><select><option>1</option></select><textarea>t</textarea>",
];

#[test]
fn adversarial_inputs_never_leak_active_content() {
    let options = RenderOptions::default();
    for input in ADVERSARIAL {
        let html = render(input, &options).to_ascii_lowercase();

        for tag in FORBIDDEN_TAGS {
            assert!(
                !html.contains(&format!("<{tag}")),
                "{tag} leaked for {input:?}: {html}"
            );
        }
        assert!(!html.contains("javascript:"), "javascript: leaked for {input:?}: {html}");
        for handler in ["onclick", "onerror", "onload"] {
            assert!(!html.contains(handler), "{handler} leaked for {input:?}: {html}");
        }
        assert!(!html.contains("<svg"), "svg leaked for {input:?}: {html}");
    }
}

#[test]
fn sanitisation_is_idempotent_over_rendered_output() {
    let policy = SanitizePolicy::default();
    let options = RenderOptions::default();
    let mut inputs: Vec<&str> = ADVERSARIAL.to_vec();
    inputs.extend(["<pre>\n\nx</pre>\n", "<pre>\nx</pre>\n", "```\n\n\nx\n```\n"]);
    inputs.push(load_markdown());

    for input in inputs {
        let once = render(input, &options);
        let twice = sanitize(&once, &policy).expect("sanitize");
        assert_eq!(once, twice, "not idempotent for {input:?}");
    }
}

#[test]
fn external_links_open_safely() {
    let html = render("[docs](https://example.com/docs)", &RenderOptions::default());
    assert!(html.contains(
        "<a href=\"https://example.com/docs\" target=\"_blank\" rel=\"noopener noreferrer\">docs</a>"
    ));

    let relative = render("[intro](/docs/intro)", &RenderOptions::default());
    assert!(relative.contains("<a href=\"/docs/intro\">intro</a>"));

    let mail = render("[mail](mailto:team@example.com)", &RenderOptions::default());
    assert!(mail.contains("href=\"mailto:team@example.com\""));
    assert!(!mail.contains("target="));
}

#[test]
fn task_checkboxes_are_always_disabled() {
    let html = render(
        "- [x] done\n- [ ] todo\n- [X] also done\n- plain\n",
        &RenderOptions::default(),
    );

    assert_eq!(html.matches("<input").count(), 3);
    assert_eq!(html.matches("disabled=\"\"").count(), 3);
    assert_eq!(html.matches("checked=\"\"").count(), 2);
    assert!(html.contains("<li>plain</li>"));
    assert!(!html.contains("[x]"));
    assert!(!html.contains("[ ]"));
}

#[test]
fn escaped_task_markers_render_literally() {
    let html = render("- \\[x] not a task\n", &RenderOptions::default());
    assert!(!html.contains("<input"), "{html}");
    assert!(html.contains("[x] not a task"));
}

#[test]
fn raw_checkboxes_are_disabled_too() {
    let html = render(
        "<input type=\"checkbox\" checked> raw <input type=\"text\" value=\"x\">",
        &RenderOptions::default(),
    );
    assert_eq!(html.matches("<input").count(), 1);
    assert!(html.contains("disabled=\"\""));
}

#[test]
fn truncation_retracts_to_word_boundary() {
    let options = RenderOptions::default().with_max_length(12);
    insta::assert_snapshot!(render("The quick brown fox", &options), @"<p>The quick...</p>");
}

#[test]
fn unknown_language_renders_escaped_code() {
    let html = render("```xyzzy123\n<b>x</b>\n```\n", &RenderOptions::default());
    assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
    assert!(html.contains("<span class=\"code-block-language\">text</span>"));
    assert!(!html.contains("<b>"));
}

#[test]
fn engine_failure_falls_back_to_escaped_source() {
    let renderer = ContentRenderer::with_parts(Arc::new(FailingEngine), Arc::new(AmmoniaSanitizer));
    let html = renderer.render("<b>x</b> & \"y\"\nnext", &RenderOptions::default());
    assert_eq!(html, "&lt;b&gt;x&lt;/b&gt; &amp; &quot;y&quot;<br/>next");
}

#[test]
fn sanitizer_failure_falls_back_to_escaped_source() {
    let renderer = ContentRenderer::with_parts(
        Arc::new(post_render::application::render::ComrakEngine::new()),
        Arc::new(FailingSanitizer),
    );
    let html = renderer.render("**<i>hi</i>**", &RenderOptions::default());
    assert_eq!(html, "**&lt;i&gt;hi&lt;/i&gt;**");
}

#[test]
fn disabled_tables_are_dropped_entirely() {
    let markdown = "intro\n\n| a | b |\n|---|---|\n| secret | value |\n\noutro\n";

    let html = render(markdown, &RenderOptions::default().with_tables(false));
    assert!(!html.contains("<table"));
    assert!(!html.contains("secret"));
    assert!(!html.contains('|'));
    assert!(html.contains("<p>intro</p>"));
    assert!(html.contains("<p>outro</p>"));

    let enabled = render(markdown, &RenderOptions::default());
    assert!(enabled.contains("<div class=\"table-wrapper\"><table>"));
    assert!(enabled.contains("secret"));
}

#[test]
fn allowed_tags_narrow_the_output() {
    let options = RenderOptions::default().with_allowed_tags(["p"]);
    let html = render("**bold** and [link](https://example.com)", &options);
    assert!(html.contains("<p>"));
    assert!(!html.contains("<strong"));
    assert!(!html.contains("<a "));
    assert!(html.contains("bold"));
    assert!(html.contains("link"));
}

#[test]
fn narrowed_attributes_are_not_reintroduced() {
    let options = RenderOptions::default().with_sanitize_overrides(SanitizeOverrides {
        attributes: Some(vec!["href".to_string()]),
        ..SanitizeOverrides::default()
    });
    let html = render("![a](x.png) and <img src=\"y.png\">", &options);
    assert_eq!(html.matches("<img").count(), 2);
    assert!(!html.contains("loading="), "{html}");
    assert!(!html.contains("decoding="), "{html}");
}

#[test]
fn options_do_not_leak_between_calls() {
    let markdown = "| a |\n|---|\n| 1 |\n";
    let renderer = content_renderer();

    let without = renderer.render(markdown, &RenderOptions::default().with_tables(false));
    let with = renderer.render(markdown, &RenderOptions::default());
    let without_again = renderer.render(markdown, &RenderOptions::default().with_tables(false));

    assert!(!without.contains("<table"));
    assert!(with.contains("<table"));
    assert_eq!(without, without_again);
}

#[test]
fn concurrent_calls_with_different_options_are_independent() {
    let markdown = "- [x] task\n\n| a |\n|---|\n| 1 |\n";
    let expected_default = render(markdown, &RenderOptions::default());
    let plain = RenderOptions::default()
        .with_tables(false)
        .with_task_lists(false);
    let expected_plain = render(markdown, &plain);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let options = if index % 2 == 0 {
                    RenderOptions::default()
                } else {
                    plain.clone()
                };
                scope.spawn(move || (index, render(markdown, &options)))
            })
            .collect();

        for handle in handles {
            let (index, html) = handle.join().expect("render thread");
            let expected = if index % 2 == 0 {
                &expected_default
            } else {
                &expected_plain
            };
            assert_eq!(&html, expected);
        }
    });
}

#[test]
fn gfm_fixture_covers_every_construct() {
    let html = render(load_markdown(), &RenderOptions::default());

    assert!(html.contains("<h1>Release notes</h1>"));
    assert!(html.contains("<em>emphasis</em>"));
    assert!(html.contains("<strong>strong</strong>"));
    assert!(html.contains("<del>struck</del>"));
    assert!(html.contains("<code>inline code</code>"));
    assert!(html.contains("href=\"https://example.com/changelog\""));
    assert!(html.contains("<a href=\"/docs/intro\" title=\"Intro\">relative link</a>"));
    assert!(html.contains("alt=\"Architecture diagram\""));
    assert!(html.contains("loading=\"lazy\""));
    assert!(html.contains("<blockquote>"));
    assert!(html.contains("class=\"task-list-item\""));
    assert!(html.contains("<ol>"));
    assert!(html.contains("<table>"));
    assert!(html.contains(">Stage</th>"));
    assert!(html.contains("<div class=\"code-block\" data-language=\"rust\">"));
    assert!(html.contains("&lt;not highlighted&gt;"));
    assert!(html.contains("indented code block"));
    assert!(html.contains("Raw <strong>html</strong> block"));
    assert!(!html.contains("onclick"));
    assert!(!html.contains("alert(1)"));
}

#[test]
fn unsanitized_fixture_differs_only_by_sanitisation() {
    let renderer = content_renderer();
    let options = RenderOptions::default();

    let raw = renderer
        .render_unsanitized(load_markdown(), &options)
        .expect("unsanitized render succeeds");
    assert!(raw.contains("onclick"));

    let sanitized = sanitize(&raw, &SanitizePolicy::from_options(&options)).expect("sanitize");
    assert_eq!(sanitized, renderer.render(load_markdown(), &options));
}

#[test]
fn simple_document_snapshot() {
    let html = render("## Notes\n\n- one\n- two\n", &RenderOptions::default());
    insta::assert_snapshot!(html, @r"
    <h2>Notes</h2>
    <ul>
    <li>one</li>
    <li>two</li>
    </ul>
    ");
}
