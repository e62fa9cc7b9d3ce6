//! Canned NetTruyen pages and scheduled crawl settings.

use chrono::{Duration, Utc};
use extraction::MockFetcher;
use worker_core::domains::crawling::models::{
    Cadence, ChapterRange, DelayRange, MaxChapters, NewScheduledCrawl, ScheduledCrawl,
};

pub const SERIES_URL: &str = "https://www.nettruyen.example/truyen-tranh/dao-hai-tac";
pub const SERIES_TITLE: &str = "Đảo Hải Tặc";

pub fn chapter_url(number: u32) -> String {
    format!("{}/chap-{}/{}", SERIES_URL, number, 1000 + number)
}

/// Series index listing `numbers` in page order (newest first on real sites).
pub fn index_page(numbers: &[u32]) -> String {
    let items: String = numbers
        .iter()
        .map(|n| {
            format!(
                r#"<li class="row"><div class="col-xs-5 chapter"><a href="{}">Chapter {}</a></div></li>"#,
                chapter_url(*n),
                n
            )
        })
        .collect();

    format!(
        r#"<html><body>
        <article id="item-detail">
          <h1 class="title-detail">{SERIES_TITLE}</h1>
          <div class="col-image"><img src="https://cdn.nettruyen.example/cover.jpg"></div>
          <li class="status row"><p class="col-xs-8">Đang tiến hành</p></li>
          <div class="detail-content"><p>Hải tặc và kho báu.</p></div>
        </article>
        <div id="nt_listchapter"><nav><ul>{items}</ul></nav></div>
        </body></html>"#
    )
}

pub fn chapter_page(number: u32) -> String {
    let images: String = (1..=3)
        .map(|page| {
            format!(
                r#"<div class="page-chapter"><img src="https://cdn.nettruyen.example/{}/{}.jpg"></div>"#,
                number, page
            )
        })
        .collect();
    format!(r#"<html><body><div class="reading-detail box_doc">{images}</div></body></html>"#)
}

/// Serve the index with `numbers` and a page for each listed chapter.
pub fn serve_series(fetcher: &MockFetcher, numbers: &[u32]) {
    fetcher.add_page(SERIES_URL, index_page(numbers));
    for n in numbers {
        fetcher.add_page(chapter_url(*n), chapter_page(*n));
    }
}

fn base_crawl() -> NewScheduledCrawl {
    NewScheduledCrawl::builder()
        .source_url(SERIES_URL)
        .cadence(Cadence::Interval(Duration::hours(6)))
        .request_delay(DelayRange::none())
        .build()
}

pub fn auto_advance_crawl() -> NewScheduledCrawl {
    NewScheduledCrawl {
        auto_advance: true,
        ..base_crawl()
    }
}

pub fn range_crawl(start: u32, end: u32, max: u32) -> NewScheduledCrawl {
    NewScheduledCrawl {
        max_chapters: Some(MaxChapters::Limit(max)),
        chapter_range: Some(ChapterRange::between(start, end)),
        ..base_crawl()
    }
}

pub fn latest_crawl(max: u32) -> NewScheduledCrawl {
    NewScheduledCrawl {
        max_chapters: Some(MaxChapters::Limit(max)),
        ..base_crawl()
    }
}

/// Build the stored row without going through the operator.
pub fn scheduled(new: NewScheduledCrawl) -> ScheduledCrawl {
    new.into_scheduled_crawl(Utc::now())
        .expect("fixture settings are valid")
}
