pub mod cadence;
pub mod chapter;
pub mod scheduled_crawl;
pub mod series;

pub use cadence::Cadence;
pub use chapter::Chapter;
pub use scheduled_crawl::{
    ChapterRange, CrawlStatus, DelayRange, MaxChapters, NewScheduledCrawl, ScheduledCrawl,
    ScheduledCrawlUpdate,
};
pub use series::{title_key, Series};
