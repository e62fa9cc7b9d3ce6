//! TruyenVN and other sites on the WordPress manga theme.

use scraper::Html;
use url::Url;

use super::common::{
    all_texts, collect_chapter_links, collect_images, cover_url, element_text, first_text, selector,
};
use crate::cleaning::clean_element;
use crate::types::chapter::{ChapterContent, ChapterLink};
use crate::types::series::{SeriesInfo, SeriesStatus};

pub(super) fn series_info(document: &Html, base: &Url) -> Option<SeriesInfo> {
    let title = first_text(document, &[".post-title h1", ".post-title h3", "h1"])?;

    Some(SeriesInfo {
        title,
        description: first_text(
            document,
            &[".description-summary .summary__content", ".summary__content", ".manga-excerpt"],
        ),
        status_text: status_text(document),
        cover_url: cover_url(document, base, &[".summary_image img"]),
        authors: all_texts(document, ".author-content a"),
        genres: all_texts(document, ".genres-content a"),
    })
}

/// The theme renders several label/value rows under `.post-status`; the
/// status row is the one whose value maps onto a known status.
fn status_text(document: &Html) -> Option<String> {
    let selector = selector(".post-status .summary-content")?;
    let values: Vec<String> = document.select(&selector).map(element_text).collect();

    values
        .iter()
        .find(|value| SeriesStatus::from_source_text(value) != SeriesStatus::Unknown)
        .or_else(|| values.last())
        .cloned()
}

pub(super) fn chapter_list(document: &Html, base: &Url) -> Vec<ChapterLink> {
    collect_chapter_links(document, base, "li.wp-manga-chapter a", false)
}

pub(super) fn chapter_content(document: &Html, base: &Url) -> Option<ChapterContent> {
    let images = collect_images(
        document,
        base,
        &[".reading-content .page-break img", ".reading-content img"],
    );
    if !images.is_empty() {
        return Some(ChapterContent::Images(images));
    }

    // Novel chapters on the same theme
    let selector = selector(".reading-content .text-left, .reading-content")?;
    document
        .select(&selector)
        .map(clean_element)
        .find(|text| !text.is_empty())
        .map(ChapterContent::Text)
}
