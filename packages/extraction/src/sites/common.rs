//! Selector helpers shared by the site strategies.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

use crate::types::chapter::{ChapterLink, ChapterNumber};

lazy_static! {
    // "Chapter 12", "Chap. 12.5", "Chương 7: ...", "Ch 3"
    static ref TEXT_CHAPTER_NUMBER: Regex = Regex::new(
        r"(?i)\b(?:chapter|chap|chương|chuong|ch)\.?\s*[:#-]?\s*(\d+(?:[.,]\d+)?)"
    ).unwrap();

    // "/chap-12/", "/chuong-12-5", "/chapter_12.html"
    static ref URL_CHAPTER_NUMBER: Regex = Regex::new(
        r"(?i)(?:chapter|chap|chuong)[-_](\d+)(?:[-_.](\d+))?(?:[/?#.-]|$)"
    ).unwrap();

    // Anchor text that is only a number, e.g. "12" or "12.5"
    static ref BARE_NUMBER: Regex = Regex::new(r"^\s*(\d+(?:[.,]\d+)?)\s*$").unwrap();

    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Attributes holding the real image URL, lazy-load attributes first.
const IMAGE_ATTRIBUTES: &[&str] = &["data-original", "data-src", "data-lazy-src", "data-cdn", "src"];

pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Collapse whitespace in the element's text content.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    WHITESPACE.replace_all(raw.trim(), " ").into_owned()
}

/// Text of the first element matching any of `selectors`, skipping empties.
pub(crate) fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = selector(css)?;
        document
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// Value of `<meta property=.. content=..>` or `<meta name=.. content=..>`.
pub(crate) fn meta_content(document: &Html, key: &str) -> Option<String> {
    let css = format!(r#"meta[property="{key}"], meta[name="{key}"]"#);
    let selector = selector(&css)?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}

/// Texts of every element matching `css`, e.g. author or genre links.
pub(crate) fn all_texts(document: &Html, css: &str) -> Vec<String> {
    let Some(selector) = selector(css) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&selector)
        .map(element_text)
        .filter(|text| !text.is_empty() && seen.insert(text.clone()))
        .collect()
}

/// Resolve `href` against the page URL. Rejects `javascript:` and data URIs.
pub(crate) fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("data:") {
        return None;
    }

    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// The real source URL of an `<img>`, honouring lazy-load attributes.
pub(crate) fn image_url(base: &Url, element: ElementRef<'_>) -> Option<String> {
    IMAGE_ATTRIBUTES.iter().find_map(|attr| {
        let value = element.value().attr(attr)?;
        resolve_url(base, value)
    })
}

/// Cover image from the first matching `<img>`, falling back to `og:image`.
pub(crate) fn cover_url(document: &Html, base: &Url, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .find_map(|css| {
            let selector = selector(css)?;
            document
                .select(&selector)
                .find_map(|el| image_url(base, el))
        })
        .or_else(|| meta_content(document, "og:image").and_then(|src| resolve_url(base, &src)))
}

/// Ordered, de-duplicated image URLs under the first matching selector.
pub(crate) fn collect_images(document: &Html, base: &Url, selectors: &[&str]) -> Vec<String> {
    for css in selectors {
        let Some(selector) = selector(css) else {
            continue;
        };

        let mut seen = HashSet::new();
        let images: Vec<String> = document
            .select(&selector)
            .filter_map(|el| image_url(base, el))
            .filter(|src| seen.insert(src.clone()))
            .collect();

        if !images.is_empty() {
            return images;
        }
    }

    Vec::new()
}

/// Recognize a chapter number from anchor text, then from the link URL.
/// `allow_bare` also accepts anchor text that is only a number.
pub(crate) fn chapter_number(text: &str, href: &str, allow_bare: bool) -> Option<ChapterNumber> {
    if let Some(number) = TEXT_CHAPTER_NUMBER
        .captures(text)
        .and_then(|caps| ChapterNumber::parse(&caps[1]))
    {
        return Some(number);
    }

    if let Some(caps) = URL_CHAPTER_NUMBER.captures(href) {
        let raw = match caps.get(2) {
            Some(fraction) => format!("{}.{}", &caps[1], fraction.as_str()),
            None => caps[1].to_string(),
        };
        if let Some(number) = ChapterNumber::parse(&raw) {
            return Some(number);
        }
    }

    if allow_bare {
        return BARE_NUMBER
            .captures(text)
            .and_then(|caps| ChapterNumber::parse(&caps[1]));
    }

    None
}

/// Chapter links under `css`, in page order, first occurrence of each number.
pub(crate) fn collect_chapter_links(
    document: &Html,
    base: &Url,
    css: &str,
    allow_bare: bool,
) -> Vec<ChapterLink> {
    let Some(selector) = selector(css) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_url(base, href) else {
            continue;
        };

        let title = element_text(anchor);
        let Some(number) = chapter_number(&title, &url, allow_bare) else {
            continue;
        };

        if seen.insert(number) {
            links.push(ChapterLink::new(number, title, url));
        }
    }

    links
}

/// True when the element sits inside page chrome (header/nav/footer/aside).
pub(crate) fn in_page_chrome(element: ElementRef<'_>) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|el| matches!(el.name(), "header" | "nav" | "footer" | "aside"))
    })
}
