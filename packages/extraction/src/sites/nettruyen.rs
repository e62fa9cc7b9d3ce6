//! NetTruyen family of comic mirrors.

use scraper::Html;
use url::Url;

use super::common::{all_texts, collect_chapter_links, collect_images, cover_url, first_text};
use crate::types::chapter::{ChapterContent, ChapterLink};
use crate::types::series::SeriesInfo;

pub(super) fn series_info(document: &Html, base: &Url) -> Option<SeriesInfo> {
    let title = first_text(document, &["h1.title-detail", ".title-detail", "h1"])?;

    Some(SeriesInfo {
        title,
        description: first_text(
            document,
            &[".detail-content .shortened", ".detail-content p", ".detail-content"],
        ),
        status_text: first_text(document, &["li.status p.col-xs-8", ".status p.col-xs-8"]),
        cover_url: cover_url(document, base, &[".col-image img", ".detail-info img"]),
        authors: all_texts(document, "li.author p.col-xs-8"),
        genres: all_texts(document, "li.kind p.col-xs-8 a"),
    })
}

pub(super) fn chapter_list(document: &Html, base: &Url) -> Vec<ChapterLink> {
    let links = collect_chapter_links(document, base, "#nt_listchapter li .chapter a", false);
    if !links.is_empty() {
        return links;
    }
    collect_chapter_links(document, base, ".list-chapter li .chapter a", false)
}

pub(super) fn chapter_content(document: &Html, base: &Url) -> Option<ChapterContent> {
    let images = collect_images(
        document,
        base,
        &[".reading-detail .page-chapter img", ".reading-detail img"],
    );
    (!images.is_empty()).then_some(ChapterContent::Images(images))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
        <html><body>
          <article id="item-detail">
            <h1 class="title-detail">Võ Luyện Đỉnh Phong</h1>
            <div class="detail-info">
              <div class="col-image"><img data-src="//st.nettruyen.example/cover.jpg" src="/lazy.gif"></div>
              <ul class="list-info">
                <li class="author"><p class="col-xs-8">Mạc Mặc</p></li>
                <li class="status"><p class="col-xs-8">Đang tiến hành</p></li>
                <li class="kind"><p class="col-xs-8"><a href="/a">Action</a> - <a href="/b">Manhua</a></p></li>
              </ul>
            </div>
            <div class="detail-content"><p>Một câu chuyện dài.</p></div>
          </article>
          <div id="nt_listchapter"><ul>
            <li><div class="chapter"><a href="/truyen-tranh/vo-luyen/chap-3/103">Chapter 3</a></div></li>
            <li><div class="chapter"><a href="/truyen-tranh/vo-luyen/chap-2/102">Chapter 2</a></div></li>
            <li><div class="chapter"><a href="/truyen-tranh/vo-luyen/chap-1/101">Chapter 1</a></div></li>
          </ul></div>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://www.nettruyen.example/truyen-tranh/vo-luyen").unwrap()
    }

    #[test]
    fn test_series_info() {
        let doc = Html::parse_document(INDEX);
        let info = series_info(&doc, &base()).unwrap();

        assert_eq!(info.title, "Võ Luyện Đỉnh Phong");
        assert_eq!(info.status_text.as_deref(), Some("Đang tiến hành"));
        assert_eq!(info.cover_url.as_deref(), Some("https://st.nettruyen.example/cover.jpg"));
        assert_eq!(info.description.as_deref(), Some("Một câu chuyện dài."));
        assert_eq!(info.authors, vec!["Mạc Mặc"]);
        assert_eq!(info.genres, vec!["Action", "Manhua"]);
    }

    #[test]
    fn test_chapter_list_newest_first() {
        let doc = Html::parse_document(INDEX);
        let chapters = chapter_list(&doc, &base());

        let numbers: Vec<String> = chapters.iter().map(|c| c.number.to_string()).collect();
        assert_eq!(numbers, vec!["3", "2", "1"]);
        assert_eq!(
            chapters[2].url,
            "https://www.nettruyen.example/truyen-tranh/vo-luyen/chap-1/101"
        );
    }

    #[test]
    fn test_chapter_images() {
        let doc = Html::parse_document(
            r#"<div class="reading-detail">
                 <div class="page-chapter"><img data-original="//cdn.example/1.jpg" src="x.gif"></div>
                 <div class="page-chapter"><img data-original="//cdn.example/2.jpg"></div>
                 <div class="page-chapter"><img data-original="//cdn.example/1.jpg"></div>
               </div>"#,
        );

        match chapter_content(&doc, &base()) {
            Some(ChapterContent::Images(images)) => assert_eq!(
                images,
                vec!["https://cdn.example/1.jpg", "https://cdn.example/2.jpg"]
            ),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_missing_images_is_none() {
        let doc = Html::parse_document("<div class='reading-detail'></div>");
        assert!(chapter_content(&doc, &base()).is_none());
    }
}
