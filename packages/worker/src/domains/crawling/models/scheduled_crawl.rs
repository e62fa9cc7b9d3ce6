//! Recurring crawl configuration.

use chrono::{DateTime, Utc};
use extraction::ChapterNumber;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::cadence::Cadence;
use crate::common::time::truncate_to_micros;
use crate::domains::crawling::planner::CrawlScope;
use crate::error::ValidationError;

// ============================================================================
// Scope value types
// ============================================================================

/// How many of the newest chapters a run may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxChapters {
    Limit(u32),
    All,
}

impl MaxChapters {
    pub fn limit(&self) -> Option<usize> {
        match self {
            MaxChapters::Limit(n) => Some(*n as usize),
            MaxChapters::All => None,
        }
    }
}

impl fmt::Display for MaxChapters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxChapters::Limit(n) => write!(f, "{}", n),
            MaxChapters::All => f.write_str("all"),
        }
    }
}

impl FromStr for MaxChapters {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(MaxChapters::All),
            other => other
                .parse::<u32>()
                .map(MaxChapters::Limit)
                .map_err(|_| format!("invalid max chapters: {}", s)),
        }
    }
}

/// Serialized as a number or the string `"all"`.
impl Serialize for MaxChapters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaxChapters::Limit(n) => serializer.serialize_u32(*n),
            MaxChapters::All => serializer.serialize_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for MaxChapters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(MaxChapters::Limit(n)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Inclusive chapter number range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRange {
    pub start: ChapterNumber,
    pub end: ChapterNumber,
}

impl ChapterRange {
    pub fn new(start: ChapterNumber, end: ChapterNumber) -> Self {
        Self { start, end }
    }

    /// Whole-number bounds.
    pub fn between(start: u32, end: u32) -> Self {
        Self::new(start.into(), end.into())
    }

    pub fn contains(&self, number: ChapterNumber) -> bool {
        self.start <= number && number <= self.end
    }
}

/// Politeness delay bounds in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_ms: 2000,
            max_ms: 5000,
        }
    }
}

impl DelayRange {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// A uniformly random delay within the bounds.
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(fastrand::u64(self.min_ms..=self.max_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    #[default]
    Active,
    Paused,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlStatus::Active => "active",
            CrawlStatus::Paused => "paused",
        }
    }
}

impl FromStr for CrawlStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CrawlStatus::Active),
            "paused" => Ok(CrawlStatus::Paused),
            other => Err(format!("unknown crawl status: {}", other)),
        }
    }
}

/// Check the scope and delay invariants shared by create and update.
pub fn validate_settings(
    max_chapters: Option<MaxChapters>,
    chapter_range: Option<ChapterRange>,
    request_delay: DelayRange,
) -> Result<(), ValidationError> {
    if max_chapters == Some(MaxChapters::Limit(0)) {
        return Err(ValidationError::ZeroMaxChapters);
    }

    if let Some(range) = chapter_range {
        if !matches!(max_chapters, Some(MaxChapters::Limit(_))) {
            return Err(ValidationError::RangeWithoutLimit);
        }
        if range.start > range.end {
            return Err(ValidationError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
    }

    if request_delay.min_ms > request_delay.max_ms {
        return Err(ValidationError::InvalidDelayRange {
            min_ms: request_delay.min_ms,
            max_ms: request_delay.max_ms,
        });
    }

    Ok(())
}

fn validate_source_url(source_url: &str) -> Result<(), ValidationError> {
    match url::Url::parse(source_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => Ok(()),
        _ => Err(ValidationError::InvalidSourceUrl(source_url.to_string())),
    }
}

// ============================================================================
// ScheduledCrawl
// ============================================================================

/// A source that is crawled on a cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCrawl {
    pub id: Uuid,
    /// Series the crawl feeds; resolved by title when absent
    pub series_id: Option<Uuid>,
    pub source_url: String,
    pub cadence: Cadence,
    pub max_chapters: Option<MaxChapters>,
    pub chapter_range: Option<ChapterRange>,
    pub request_delay: DelayRange,
    pub status: CrawlStatus,
    pub auto_advance: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledCrawl {
    pub fn scope(&self) -> CrawlScope {
        CrawlScope {
            max_chapters: self.max_chapters,
            chapter_range: self.chapter_range,
            auto_advance: self.auto_advance,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == CrawlStatus::Active && self.next_run_at <= now
    }
}

/// Settings for a new scheduled crawl.
#[derive(Debug, Clone, TypedBuilder, Serialize, Deserialize)]
#[builder(field_defaults(setter(into)))]
pub struct NewScheduledCrawl {
    pub source_url: String,
    pub cadence: Cadence,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub series_id: Option<Uuid>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub max_chapters: Option<MaxChapters>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub chapter_range: Option<ChapterRange>,
    #[builder(default)]
    #[serde(default)]
    pub request_delay: DelayRange,
    #[builder(default)]
    #[serde(default)]
    pub auto_advance: bool,
    #[builder(default)]
    #[serde(default)]
    pub status: CrawlStatus,
}

impl NewScheduledCrawl {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_source_url(&self.source_url)?;
        self.cadence.validate()?;
        validate_settings(self.max_chapters, self.chapter_range, self.request_delay)
    }

    /// Validate and build the row; the first run is one cadence step from `now`.
    pub fn into_scheduled_crawl(self, now: DateTime<Utc>) -> Result<ScheduledCrawl, ValidationError> {
        self.validate()?;
        let now = truncate_to_micros(now);

        Ok(ScheduledCrawl {
            id: Uuid::now_v7(),
            series_id: self.series_id,
            source_url: self.source_url,
            next_run_at: self.cadence.next_after(now),
            cadence: self.cadence,
            max_chapters: self.max_chapters,
            chapter_range: self.chapter_range,
            request_delay: self.request_delay,
            status: self.status,
            auto_advance: self.auto_advance,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduledCrawlUpdate {
    pub source_url: Option<String>,
    pub cadence: Option<Cadence>,
    pub max_chapters: Option<Option<MaxChapters>>,
    pub chapter_range: Option<Option<ChapterRange>>,
    pub request_delay: Option<DelayRange>,
    pub auto_advance: Option<bool>,
    pub status: Option<CrawlStatus>,
}

impl ScheduledCrawlUpdate {
    /// Apply onto a copy of `crawl`, re-validating the merged settings.
    /// A changed cadence reschedules the next run from `now`.
    pub fn apply(self, crawl: &ScheduledCrawl, now: DateTime<Utc>) -> Result<ScheduledCrawl, ValidationError> {
        let now = truncate_to_micros(now);
        let mut updated = crawl.clone();

        if let Some(source_url) = self.source_url {
            validate_source_url(&source_url)?;
            updated.source_url = source_url;
        }
        if let Some(max_chapters) = self.max_chapters {
            updated.max_chapters = max_chapters;
        }
        if let Some(chapter_range) = self.chapter_range {
            updated.chapter_range = chapter_range;
        }
        if let Some(request_delay) = self.request_delay {
            updated.request_delay = request_delay;
        }
        if let Some(auto_advance) = self.auto_advance {
            updated.auto_advance = auto_advance;
        }
        if let Some(status) = self.status {
            updated.status = status;
        }
        if let Some(cadence) = self.cadence {
            cadence.validate()?;
            if cadence != updated.cadence {
                updated.next_run_at = cadence.next_after(now);
                updated.cadence = cadence;
            }
        }

        validate_settings(updated.max_chapters, updated.chapter_range, updated.request_delay)?;
        updated.updated_at = now;
        Ok(updated)
    }
}
