use chrono::{DateTime, Utc};
use extraction::{ChapterContent, ChapterNumber};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::time::truncate_to_micros;

/// A stored chapter. `(series_id, number)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub series_id: Uuid,
    pub number: ChapterNumber,
    pub title: String,
    pub source_url: String,
    pub content: ChapterContent,
    pub created_at: DateTime<Utc>,
}

impl Chapter {
    pub fn new(
        series_id: Uuid,
        number: ChapterNumber,
        title: impl Into<String>,
        source_url: impl Into<String>,
        content: ChapterContent,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            series_id,
            number,
            title: title.into(),
            source_url: source_url.into(),
            content,
            created_at: truncate_to_micros(now),
        }
    }
}
