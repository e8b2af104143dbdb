use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::ElementRef;
use url::Url;

/// Plain text of an element with block-level boundaries turned into newlines.
///
/// Lines are trimmed and blank lines dropped, so the result never starts or
/// ends with whitespace.
pub fn flatten_text(element: ElementRef<'_>) -> String {
    let mut ctx = TextContext::default();
    visit_children(element, &mut ctx);
    ctx.into_text()
}

/// Text of an element on one line, whitespace runs collapsed.
pub fn inline_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve an `href` against the page URL; only http(s) targets are kept.
pub fn resolve_url(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("mailto:") {
        return None;
    }
    let url = Url::parse(trimmed).or_else(|_| base.join(trimmed)).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
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
        "script" | "style" | "noscript" | "iframe" | "template" => {}
        "br" | "hr" => ctx.newline(),
        "p" | "div" | "section" | "article" | "header" | "footer" | "nav" | "figure"
        | "figcaption" | "table" | "tr" | "td" | "th" | "blockquote" | "address" | "pre"
        | "ul" | "ol" | "li" | "dl" | "dt" | "dd" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            ctx.newline();
            visit_children(element, ctx);
            ctx.newline();
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
    lines: Vec<String>,
    current: String,
}

impl TextContext {
    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.current.is_empty() && !self.current.ends_with(' ') {
                    self.current.push(' ');
                }
            } else {
                self.current.push(ch);
            }
        }
    }

    fn newline(&mut self) {
        let line = self.current.trim();
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
        self.current.clear();
    }

    fn into_text(mut self) -> String {
        self.newline();
        self.lines.join("\n")
    }
}
