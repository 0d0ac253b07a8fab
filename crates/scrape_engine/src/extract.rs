use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub title: Option<String>,
    /// Visible text, one line per block element, whitespace collapsed.
    pub text: String,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> ExtractedText;
}

/// Plain text extractor for the direct fetch:
/// - title from `<title>`, then `og:title`, then the first `<h1>`
/// - text from `<article>`, then `<main>`, then `<body>`, then the document
/// - scripting, styling and embedded content are skipped.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

const CONTAINERS: &[&str] = &["article", "main", "body"];

impl Extractor for PlainTextExtractor {
    fn extract(&self, html: &str) -> ExtractedText {
        let doc = Html::parse_document(html);

        // A container only counts when it has visible text; a script-only
        // <article> must not shadow the body.
        let text = CONTAINERS
            .iter()
            .filter_map(|name| Selector::parse(name).ok())
            .find_map(|sel| {
                doc.select(&sel)
                    .map(visible_text)
                    .find(|text| !text.is_empty())
            })
            .unwrap_or_else(|| visible_text(doc.root_element()));

        ExtractedText {
            title: extract_title(&doc),
            text,
        }
    }
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut ctx = TextContext::default();
    visit_children(element, &mut ctx);
    ctx.into_text()
}

fn extract_title(doc: &Html) -> Option<String> {
    let first_text = |selector: &str| -> Option<String> {
        let sel = Selector::parse(selector).ok()?;
        let el = doc.select(&sel).next()?;
        let text = collapse(&el.text().collect::<String>());
        (!text.is_empty()).then_some(text)
    };
    let og_title = || -> Option<String> {
        let sel = Selector::parse(r#"meta[property="og:title"]"#).ok()?;
        let content = doc.select(&sel).next()?.value().attr("content")?;
        let text = collapse(content);
        (!text.is_empty()).then_some(text)
    };
    first_text("title")
        .or_else(og_title)
        .or_else(|| first_text("h1"))
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn visit_node(node: NodeRef<'_, Node>, ctx: &mut TextContext) {
    match node.value() {
        Node::Text(text) => ctx.append_text(text),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                visit_element(element, ctx);
            }
        }
        _ => {
            for child in node.children() {
                visit_node(child, ctx);
            }
        }
    }
}

fn visit_element(element: ElementRef<'_>, ctx: &mut TextContext) {
    let tag = element.value().name().to_ascii_lowercase();
    match tag.as_str() {
        "script" | "style" | "noscript" | "template" | "iframe" | "svg" | "canvas" | "head"
        | "object" | "embed" => {}
        "br" | "hr" => ctx.ensure_newline(),
        "p" | "div" | "section" | "article" | "main" | "header" | "footer" | "nav" | "aside"
        | "li" | "ul" | "ol" | "dl" | "dt" | "dd" | "table" | "tr" | "h1" | "h2" | "h3"
        | "h4" | "h5" | "h6" | "blockquote" | "pre" | "figure" | "figcaption" | "address"
        | "form" => {
            ctx.ensure_newline();
            visit_children(element, ctx);
            ctx.ensure_newline();
        }
        "td" | "th" => {
            ctx.append_text(" ");
            visit_children(element, ctx);
            ctx.append_text(" ");
        }
        _ => visit_children(element, ctx),
    }
}

fn visit_children(element: ElementRef<'_>, ctx: &mut TextContext) {
    for child in element.children() {
        visit_node(child, ctx);
    }
}

#[derive(Default)]
struct TextContext {
    builder: String,
    last_char: Option<char>,
}

impl TextContext {
    fn into_text(self) -> String {
        self.builder
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if self.last_char.is_none()
                    || self.last_char == Some(' ')
                    || self.last_char == Some('\n')
                {
                    continue;
                }
                self.push_char(' ');
            } else {
                self.push_char(ch);
            }
        }
    }

    fn ensure_newline(&mut self) {
        if self.last_char == Some('\n') || self.builder.is_empty() {
            return;
        }
        self.push_char('\n');
    }

    fn push_char(&mut self, ch: char) {
        self.builder.push(ch);
        self.last_char = Some(ch);
    }
}
