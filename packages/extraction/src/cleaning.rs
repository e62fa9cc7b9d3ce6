//! Chapter text cleaning.
//!
//! Walks the parsed DOM of a chapter container, drops scripts and ad slots,
//! and renders the remaining text with paragraph breaks preserved.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html};

lazy_static! {
    static ref INLINE_WHITESPACE: Regex = Regex::new(r"[ \t\r\f\u{a0}\u{200b}]+").unwrap();
    static ref EXCESS_NEWLINES: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Elements whose content is never chapter text.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "ins", "button", "form", "select", "svg",
];

/// Elements rendered as separate paragraphs.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "blockquote", "li", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Clean an HTML fragment into plain chapter text.
pub fn clean_chapter_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    clean_element(fragment.root_element())
}

/// Clean the text under an already-selected container element.
pub fn clean_element(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    render(element, &mut raw);
    normalize(&raw)
}

fn render(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) || is_ad_slot(el) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }

                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };

                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push_str("\n\n");
                }
                render(child_element, out);
                if block {
                    out.push_str("\n\n");
                }
            }
            _ => {}
        }
    }
}

fn is_ad_slot(element: &scraper::node::Element) -> bool {
    let id_is_ad = element.id().is_some_and(is_ad_token);
    id_is_ad || element.classes().any(is_ad_token)
}

fn is_ad_token(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.contains("advert")
        || lower.contains("quangcao")
        || lower
            .split(|c: char| c == '-' || c == '_')
            .any(|part| part == "ads" || part == "ad" || part == "adsbygoogle")
}

fn normalize(raw: &str) -> String {
    let collapsed = INLINE_WHITESPACE.replace_all(raw, " ");
    let lines: Vec<&str> = collapsed.split('\n').map(str::trim).collect();
    let joined = lines.join("\n");
    EXCESS_NEWLINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}
