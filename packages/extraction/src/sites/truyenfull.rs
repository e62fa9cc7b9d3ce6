//! TruyenFull-style novel sites (text chapters).

use scraper::Html;
use url::Url;

use super::common::{all_texts, collect_chapter_links, cover_url, first_text, selector};
use crate::cleaning::clean_element;
use crate::types::chapter::{ChapterContent, ChapterLink};
use crate::types::series::SeriesInfo;

pub(super) fn series_info(document: &Html, base: &Url) -> Option<SeriesInfo> {
    let title = first_text(document, &["h3.title", ".col-info-desc .title", "h1"])?;

    Some(SeriesInfo {
        title,
        description: first_text(document, &[".desc-text", "[itemprop='description']"]),
        status_text: first_text(
            document,
            &[".info .text-success", ".info .text-primary", ".info .label-full"],
        ),
        cover_url: cover_url(document, base, &[".books .book img", ".book img"]),
        authors: all_texts(document, ".info a[itemprop='author']"),
        genres: all_texts(document, ".info a[itemprop='genre']"),
    })
}

pub(super) fn chapter_list(document: &Html, base: &Url) -> Vec<ChapterLink> {
    collect_chapter_links(document, base, "ul.list-chapter li a", false)
}

pub(super) fn chapter_content(document: &Html) -> Option<ChapterContent> {
    let selector = selector("#chapter-c, .chapter-c")?;
    document
        .select(&selector)
        .map(clean_element)
        .find(|text| !text.is_empty())
        .map(ChapterContent::Text)
}
