//! Fallback strategy for sites without a dedicated extractor.
//!
//! Uses permissive heuristics: Open Graph metadata for the series, any
//! anchor carrying a chapter token for the list, and the first reading
//! container with images (or text) for the chapter body.

use scraper::Html;
use url::Url;

use super::common::{
    collect_chapter_links, collect_images, first_text, image_url, in_page_chrome, meta_content,
    resolve_url, selector,
};
use crate::cleaning::clean_element;
use crate::types::chapter::{ChapterContent, ChapterLink};
use crate::types::series::SeriesInfo;

/// Containers that usually hold the chapter body, most specific first.
const READING_CONTAINERS: &[&str] = &[
    ".reading-content",
    ".reading-detail",
    ".chapter-content",
    "#chapter-content",
    "#chapter-c",
    ".chapter-c",
    ".entry-content",
    "article",
    "main",
];

/// Substrings that mark site furniture rather than page scans.
const JUNK_IMAGE_MARKERS: &[&str] = &["logo", "icon", "avatar", "banner", "/ads", "ads/", "sprite", "emoji"];

/// Minimum number of loose `<img>` tags before the body is treated as a gallery.
const MIN_LOOSE_IMAGES: usize = 3;

pub(super) fn series_info(document: &Html, base: &Url) -> Option<SeriesInfo> {
    let title = meta_content(document, "og:title")
        .or_else(|| first_text(document, &["h1", "title"]))?;

    Some(SeriesInfo {
        title,
        description: meta_content(document, "og:description")
            .or_else(|| meta_content(document, "description")),
        status_text: None,
        cover_url: meta_content(document, "og:image").and_then(|src| resolve_url(base, &src)),
        authors: Vec::new(),
        genres: Vec::new(),
    })
}

pub(super) fn chapter_list(document: &Html, base: &Url) -> Vec<ChapterLink> {
    collect_chapter_links(document, base, "a[href]", false)
}

pub(super) fn chapter_content(document: &Html, base: &Url) -> Option<ChapterContent> {
    let scoped: Vec<String> = READING_CONTAINERS
        .iter()
        .map(|css| format!("{css} img"))
        .collect();
    let scoped_refs: Vec<&str> = scoped.iter().map(String::as_str).collect();

    let images: Vec<String> = collect_images(document, base, &scoped_refs)
        .into_iter()
        .filter(|src| !is_junk_image(src))
        .collect();
    if !images.is_empty() {
        return Some(ChapterContent::Images(images));
    }

    if let Some(text) = container_text(document) {
        return Some(ChapterContent::Text(text));
    }

    let loose = loose_images(document, base);
    if loose.len() >= MIN_LOOSE_IMAGES {
        return Some(ChapterContent::Images(loose));
    }

    let body = selector("body")?;
    document
        .select(&body)
        .map(clean_element)
        .find(|text| !text.is_empty())
        .map(ChapterContent::Text)
}

fn container_text(document: &Html) -> Option<String> {
    READING_CONTAINERS.iter().find_map(|css| {
        let selector = selector(css)?;
        document
            .select(&selector)
            .map(clean_element)
            .find(|text| !text.is_empty())
    })
}

fn loose_images(document: &Html, base: &Url) -> Vec<String> {
    let Some(selector) = selector("body img") else {
        return Vec::new();
    };

    let mut images: Vec<String> = Vec::new();
    for element in document.select(&selector) {
        if in_page_chrome(element) {
            continue;
        }
        if let Some(src) = image_url(base, element) {
            if !is_junk_image(&src) && !images.contains(&src) {
                images.push(src);
            }
        }
    }
    images
}

fn is_junk_image(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    JUNK_IMAGE_MARKERS.iter().any(|marker| lower.contains(marker))
}
