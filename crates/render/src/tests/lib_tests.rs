use super::*;

fn render(text: &str, options: RenderOptions) -> String {
    MarkdownRenderer.render(text, &options)
}

#[test]
fn span_renders_inline_markup_without_paragraph() {
    assert_eq!(
        render("**bold** and `code`", RenderOptions::span()),
        "<strong>bold</strong> and <code>code</code>"
    );
}

#[test]
fn span_flattens_block_structure() {
    let html = render("# Title\n\nbody", RenderOptions::span());
    assert_eq!(html, "Title body");
}

#[test]
fn block_renders_headings_with_unique_ids() {
    let html = render("# Intro\n\n## Intro", RenderOptions::block());
    assert!(html.contains("<h1 id=\"intro\">Intro</h1>"), "{html}");
    assert!(html.contains("<h2 id=\"intro-1\">Intro</h2>"), "{html}");
}

#[test]
fn heading_offset_shifts_and_clamps_levels() {
    let options = RenderOptions {
        heading_offset: 3,
        ..RenderOptions::block()
    };
    let html = render("# Top\n\n##### Deep", options);
    assert!(html.contains("<h3 id=\"top\">Top</h3>"), "{html}");
    assert!(html.contains("<h6 id=\"deep\">Deep</h6>"), "{html}");
}

#[test]
fn heading_links_wrap_or_prefix_text() {
    let wrap = RenderOptions {
        heading_links: Some(String::new()),
        ..RenderOptions::block()
    };
    assert!(render("# Go", wrap)
        .contains("<h1 id=\"go\"><a href=\"#go\" class=\"anchor\">Go</a></h1>"));

    let prefix = RenderOptions {
        heading_links: Some("§".to_string()),
        ..RenderOptions::block()
    };
    assert!(render("# Go", prefix)
        .contains("<h1 id=\"go\"><a href=\"#go\" class=\"anchor\">§</a>Go</h1>"));
}

#[test]
fn block_renders_aligned_tables() {
    let html = render(
        "| a | b |\n|:--|--:|\n| 1 | 2 |",
        RenderOptions::block(),
    );
    assert!(html.starts_with("<table class=\"table\"><thead><tr>"), "{html}");
    assert!(html.contains("<th align=\"left\">a</th>"), "{html}");
    assert!(html.contains("<td align=\"right\">2</td>"), "{html}");
    assert!(html.contains("</tbody></table>"), "{html}");
}

#[test]
fn fenced_code_carries_language_class() {
    let html = render("```rust\nlet x = 1 < 2;\n```", RenderOptions::block());
    assert_eq!(
        html,
        "<pre><code class=\"language-rust\">let x = 1 &lt; 2;\n</code></pre>\n"
    );
}

#[test]
fn untrusted_input_escapes_raw_html() {
    let html = render(
        "hi <script>alert(1)</script>",
        RenderOptions::span().untrusted(true),
    );
    assert!(!html.contains("<script>"), "{html}");
    assert!(html.contains("&lt;script&gt;"), "{html}");

    let trusted = render("hi <b>there</b>", RenderOptions::span());
    assert!(trusted.contains("<b>there</b>"), "{trusted}");
}

#[test]
fn untrusted_input_neutralizes_script_urls() {
    let html = render(
        "[click](javascript:alert(1)) ![x](data:image/png;base64,AAAA)",
        RenderOptions::span().untrusted(true),
    );
    assert!(html.contains("<a href=\"#\">click</a>"), "{html}");
    assert!(html.contains("<img src=\"#\" alt=\"x\">"), "{html}");

    let safe = render("[docs](https://example.com)", RenderOptions::span().untrusted(true));
    assert_eq!(safe, "<a href=\"https://example.com\">docs</a>");
}

#[test]
fn plain_text_renderer_only_escapes() {
    assert_eq!(
        PlainTextRenderer.render("<b>**x**</b>", &RenderOptions::block()),
        "&lt;b&gt;**x**&lt;/b&gt;"
    );
}
