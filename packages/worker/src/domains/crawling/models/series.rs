use chrono::{DateTime, Utc};
use extraction::{SeriesInfo, SeriesStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::time::truncate_to_micros;

/// A stored series; chapters hang off it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub status: SeriesStatus,
    /// Remote cover image URL; never downloaded
    pub cover_url: Option<String>,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Series {
    /// Build a new series from index-page metadata.
    pub fn from_info(info: &SeriesInfo, source_url: &str, now: DateTime<Utc>) -> Self {
        let title = info.title.trim().to_string();
        let now = truncate_to_micros(now);
        Self {
            id: Uuid::now_v7(),
            slug: slugify(&title),
            title,
            description: info.description.clone(),
            status: info.status(),
            cover_url: info.cover_url.clone(),
            source_url: source_url.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn title_key(&self) -> String {
        title_key(&self.title)
    }
}

/// Case-insensitive lookup key for a series title.
pub fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Lowercase ASCII-ish slug; non-alphanumerics collapse to single dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}
