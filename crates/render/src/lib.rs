//! Markdown to HTML for slide content.
//!
//! Two capabilities share one event walker: `Variant::Span` renders inline
//! content only, `Variant::Block` adds headings, tables, lists and fenced code
//! on top of it. Untrusted input never produces raw HTML or script URLs.

use std::collections::HashMap;

use html_escape::{encode_double_quoted_attribute, encode_text};
use pulldown_cmark::{Alignment, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Variant {
    #[default]
    Span,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub variant: Variant,
    pub untrusted: bool,
    /// Level the top heading renders at; `1` leaves levels unchanged.
    pub heading_offset: u8,
    /// `None`: plain headings. `Some("")`: heading text becomes a self link.
    /// `Some(marker)`: an anchor with `marker` is prepended.
    pub heading_links: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            variant: Variant::Span,
            untrusted: false,
            heading_offset: 1,
            heading_links: None,
        }
    }
}

impl RenderOptions {
    pub fn span() -> Self {
        Self::default()
    }

    pub fn block() -> Self {
        Self {
            variant: Variant::Block,
            ..Self::default()
        }
    }

    pub fn untrusted(mut self, untrusted: bool) -> Self {
        self.untrusted = untrusted;
        self
    }
}

pub trait Renderer: Send + Sync {
    fn render(&self, text: &str, options: &RenderOptions) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, text: &str, options: &RenderOptions) -> String {
        let mut parser_options = Options::ENABLE_STRIKETHROUGH;
        if options.variant == Variant::Block {
            parser_options |= Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS;
        }
        let mut writer = HtmlWriter::new(options);
        for event in Parser::new_ext(text, parser_options) {
            writer.event(event);
        }
        writer.finish()
    }
}

/// Plain text passthrough, for hosts that render elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl Renderer for PlainTextRenderer {
    fn render(&self, text: &str, _options: &RenderOptions) -> String {
        encode_text(text).into_owned()
    }
}

const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

fn safe_url<'a>(url: &'a str, untrusted: bool) -> &'a str {
    if !untrusted {
        return url;
    }
    let normalized: String = url
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if BLOCKED_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
    {
        "#"
    } else {
        url
    }
}

fn slug(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash {
                slug.push('-');
                pending_dash = false;
            }
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    if pending_dash {
        slug.push('-');
    }
    slug
}

struct HeadingBuffer {
    level: usize,
    html: String,
    text: String,
}

struct ImageBuffer {
    src: String,
    title: String,
    alt: String,
}

struct TableState {
    alignments: Vec<Alignment>,
    in_head: bool,
    cell: usize,
}

struct HtmlWriter<'o> {
    options: &'o RenderOptions,
    out: String,
    heading: Option<HeadingBuffer>,
    table: Option<TableState>,
    image: Option<ImageBuffer>,
    in_code_block: bool,
    slugs: HashMap<String, usize>,
    /// Span output joins block boundaries with a space.
    pending_separator: bool,
}

impl<'o> HtmlWriter<'o> {
    fn new(options: &'o RenderOptions) -> Self {
        Self {
            options,
            out: String::new(),
            heading: None,
            table: None,
            image: None,
            in_code_block: false,
            slugs: HashMap::new(),
            pending_separator: false,
        }
    }

    fn is_span(&self) -> bool {
        self.options.variant == Variant::Span
    }

    fn push(&mut self, html: &str) {
        if self.pending_separator {
            self.pending_separator = false;
            if !self.out.is_empty() {
                self.out.push(' ');
            }
        }
        match &mut self.heading {
            Some(heading) => heading.html.push_str(html),
            None => self.out.push_str(html),
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(image) = &mut self.image {
            image.alt.push_str(text);
            return;
        }
        if let Some(heading) = &mut self.heading {
            heading.text.push_str(text);
        }
        let escaped = encode_text(text);
        self.push(&escaped);
    }

    fn block_boundary(&mut self) {
        if self.is_span() {
            self.pending_separator = true;
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block && self.is_span() {
                    // span variant keeps code block text on one line
                    self.text(text.trim_end_matches('\n'));
                } else {
                    self.text(&text);
                }
            }
            Event::Code(code) => {
                if let Some(heading) = &mut self.heading {
                    heading.text.push_str(&code);
                }
                let html = format!("<code>{}</code>", encode_text(&*code));
                self.push(&html);
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                if self.options.untrusted {
                    self.text(&html);
                } else {
                    self.push(&html);
                }
            }
            Event::SoftBreak => self.push("\n"),
            Event::HardBreak => self.push("<br>\n"),
            Event::Rule => {
                if !self.is_span() {
                    self.push("<hr>\n");
                }
            }
            Event::TaskListMarker(checked) => {
                if checked {
                    self.push("<input type=\"checkbox\" disabled checked> ");
                } else {
                    self.push("<input type=\"checkbox\" disabled> ");
                }
            }
            Event::FootnoteReference(label) => self.text(&label),
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Emphasis => self.push("<em>"),
            Tag::Strong => self.push("<strong>"),
            Tag::Strikethrough => self.push("<del>"),
            Tag::Link {
                dest_url, title, ..
            } => self.open_link(&dest_url, &title),
            Tag::Image {
                dest_url, title, ..
            } => {
                self.image = Some(ImageBuffer {
                    src: safe_url(&dest_url, self.options.untrusted).to_string(),
                    title: title.to_string(),
                    alt: String::new(),
                });
            }
            Tag::CodeBlock(kind) => {
                self.in_code_block = true;
                if self.is_span() {
                    self.push("<code>");
                } else {
                    let open = code_block_open(&kind);
                    self.push(&open);
                }
            }
            _ if self.is_span() => {}
            Tag::Paragraph => self.push("<p>"),
            Tag::Heading { level, .. } => {
                let level = level as usize + usize::from(self.options.heading_offset.max(1)) - 1;
                self.heading = Some(HeadingBuffer {
                    level: level.min(6),
                    html: String::new(),
                    text: String::new(),
                });
            }
            Tag::BlockQuote => self.push("<blockquote>\n"),
            Tag::List(Some(1)) => self.push("<ol>\n"),
            Tag::List(Some(start)) => {
                let open = format!("<ol start=\"{start}\">\n");
                self.push(&open);
            }
            Tag::List(None) => self.push("<ul>\n"),
            Tag::Item => self.push("<li>"),
            Tag::Table(alignments) => {
                self.table = Some(TableState {
                    alignments,
                    in_head: false,
                    cell: 0,
                });
                self.push("<table class=\"table\">");
            }
            Tag::TableHead => {
                if let Some(table) = &mut self.table {
                    table.in_head = true;
                    table.cell = 0;
                }
                self.push("<thead><tr>");
            }
            Tag::TableRow => {
                if let Some(table) = &mut self.table {
                    table.cell = 0;
                }
                self.push("<tr>");
            }
            Tag::TableCell => {
                let open = self.table_cell_tag(false);
                self.push(&open);
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Emphasis => self.push("</em>"),
            TagEnd::Strong => self.push("</strong>"),
            TagEnd::Strikethrough => self.push("</del>"),
            TagEnd::Link => self.push("</a>"),
            TagEnd::Image => self.close_image(),
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                if self.is_span() {
                    self.push("</code>");
                    self.block_boundary();
                } else {
                    self.push("</code></pre>\n");
                }
            }
            _ if self.is_span() => self.block_boundary(),
            TagEnd::Paragraph => self.push("</p>\n"),
            TagEnd::Heading(_) => self.close_heading(),
            TagEnd::BlockQuote => self.push("</blockquote>\n"),
            TagEnd::List(true) => self.push("</ol>\n"),
            TagEnd::List(false) => self.push("</ul>\n"),
            TagEnd::Item => self.push("</li>\n"),
            TagEnd::Table => {
                self.table = None;
                self.push("</tbody></table>\n");
            }
            TagEnd::TableHead => {
                if let Some(table) = &mut self.table {
                    table.in_head = false;
                }
                self.push("</tr></thead><tbody>");
            }
            TagEnd::TableRow => self.push("</tr>"),
            TagEnd::TableCell => {
                let close = self.table_cell_tag(true);
                if let Some(table) = &mut self.table {
                    table.cell += 1;
                }
                self.push(&close);
            }
            _ => {}
        }
    }

    fn open_link(&mut self, dest_url: &str, title: &str) {
        let href = safe_url(dest_url, self.options.untrusted);
        let mut open = format!("<a href=\"{}\"", encode_double_quoted_attribute(href));
        if !title.is_empty() {
            open.push_str(&format!(" title=\"{}\"", encode_double_quoted_attribute(title)));
        }
        open.push('>');
        self.push(&open);
    }

    fn close_image(&mut self) {
        let Some(image) = self.image.take() else {
            return;
        };
        let mut html = format!(
            "<img src=\"{}\" alt=\"{}\"",
            encode_double_quoted_attribute(&image.src),
            encode_double_quoted_attribute(&image.alt)
        );
        if !image.title.is_empty() {
            html.push_str(&format!(
                " title=\"{}\"",
                encode_double_quoted_attribute(&image.title)
            ));
        }
        html.push('>');
        self.push(&html);
    }

    fn close_heading(&mut self) {
        let Some(heading) = self.heading.take() else {
            return;
        };
        let id = self.unique_slug(&heading.text);
        let content = match self.options.heading_links.as_deref() {
            None => heading.html,
            Some("") => format!("<a href=\"#{id}\" class=\"anchor\">{}</a>", heading.html),
            Some(marker) => format!(
                "<a href=\"#{id}\" class=\"anchor\">{}</a>{}",
                encode_text(marker),
                heading.html
            ),
        };
        let html = format!(
            "<h{level} id=\"{id}\">{content}</h{level}>\n",
            level = heading.level
        );
        self.push(&html);
    }

    fn unique_slug(&mut self, text: &str) -> String {
        let base = slug(text);
        let seen = self.slugs.entry(base.clone()).or_insert(0);
        let id = if *seen == 0 {
            base
        } else {
            format!("{base}-{seen}")
        };
        *seen += 1;
        encode_double_quoted_attribute(&id).into_owned()
    }

    fn table_cell_tag(&self, closing: bool) -> String {
        let Some(table) = &self.table else {
            return String::new();
        };
        let name = if table.in_head { "th" } else { "td" };
        if closing {
            return format!("</{name}>");
        }
        match table.alignments.get(table.cell) {
            Some(Alignment::Left) => format!("<{name} align=\"left\">"),
            Some(Alignment::Center) => format!("<{name} align=\"center\">"),
            Some(Alignment::Right) => format!("<{name} align=\"right\">"),
            _ => format!("<{name}>"),
        }
    }

    fn finish(self) -> String {
        if self.is_span() {
            self.out.trim_end().to_string()
        } else {
            self.out
        }
    }
}

fn code_block_open(kind: &CodeBlockKind<'_>) -> String {
    match kind {
        CodeBlockKind::Fenced(info) => {
            let language = info.split_whitespace().next().unwrap_or_default();
            if language.is_empty() {
                "<pre><code>".to_string()
            } else {
                format!(
                    "<pre><code class=\"language-{}\">",
                    encode_double_quoted_attribute(language)
                )
            }
        }
        CodeBlockKind::Indented => "<pre><code>".to_string(),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
