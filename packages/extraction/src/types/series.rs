//! Series-level metadata extracted from an index page.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metadata scraped from a series index page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub title: String,
    pub description: Option<String>,
    /// Raw status label as shown by the source (e.g. "Đang tiến hành")
    pub status_text: Option<String>,
    /// Absolute cover image URL; stored as a remote reference, never downloaded
    pub cover_url: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl SeriesInfo {
    pub fn status(&self) -> SeriesStatus {
        self.status_text
            .as_deref()
            .map(SeriesStatus::from_source_text)
            .unwrap_or_default()
    }
}

/// Publication status of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStatus {
    Ongoing,
    Completed,
    Hiatus,
    #[default]
    Unknown,
}

/// Keyword table used to classify free-form status labels. Checked in order;
/// the first keyword found as a whole word wins.
const STATUS_KEYWORDS: &[(&str, SeriesStatus)] = &[
    ("đang tiến hành", SeriesStatus::Ongoing),
    ("đang cập nhật", SeriesStatus::Ongoing),
    ("đang ra", SeriesStatus::Ongoing),
    ("ongoing", SeriesStatus::Ongoing),
    ("updating", SeriesStatus::Ongoing),
    ("hoàn thành", SeriesStatus::Completed),
    ("đã hoàn thành", SeriesStatus::Completed),
    ("trọn bộ", SeriesStatus::Completed),
    ("completed", SeriesStatus::Completed),
    ("complete", SeriesStatus::Completed),
    ("full", SeriesStatus::Completed),
    ("end", SeriesStatus::Completed),
    ("tạm ngưng", SeriesStatus::Hiatus),
    ("tạm dừng", SeriesStatus::Hiatus),
    ("hiatus", SeriesStatus::Hiatus),
    ("paused", SeriesStatus::Hiatus),
    ("dropped", SeriesStatus::Hiatus),
    ("drop", SeriesStatus::Hiatus),
];

impl SeriesStatus {
    /// Map a status label from any supported source onto the canonical set.
    pub fn from_source_text(text: &str) -> Self {
        let haystack = text.to_lowercase();
        STATUS_KEYWORDS
            .iter()
            .find(|(keyword, _)| contains_word(&haystack, keyword))
            .map(|(_, status)| *status)
            .unwrap_or(SeriesStatus::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesStatus::Ongoing => "ongoing",
            SeriesStatus::Completed => "completed",
            SeriesStatus::Hiatus => "hiatus",
            SeriesStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SeriesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeriesStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ongoing" => Ok(SeriesStatus::Ongoing),
            "completed" => Ok(SeriesStatus::Completed),
            "hiatus" => Ok(SeriesStatus::Hiatus),
            "unknown" => Ok(SeriesStatus::Unknown),
            other => Err(format!("unknown series status: {}", other)),
        }
    }
}

/// True when `needle` occurs in `haystack` with no alphanumeric neighbours.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vietnamese_labels() {
        assert_eq!(SeriesStatus::from_source_text("Đang tiến hành"), SeriesStatus::Ongoing);
        assert_eq!(SeriesStatus::from_source_text("Hoàn thành"), SeriesStatus::Completed);
        assert_eq!(SeriesStatus::from_source_text("Tạm ngưng"), SeriesStatus::Hiatus);
    }

    #[test]
    fn test_english_labels() {
        assert_eq!(SeriesStatus::from_source_text("Status: Ongoing"), SeriesStatus::Ongoing);
        assert_eq!(SeriesStatus::from_source_text("FULL"), SeriesStatus::Completed);
        assert_eq!(SeriesStatus::from_source_text("On hiatus"), SeriesStatus::Hiatus);
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        assert_eq!(SeriesStatus::from_source_text("Trending"), SeriesStatus::Unknown);
        assert_eq!(SeriesStatus::from_source_text("Fullmetal"), SeriesStatus::Unknown);
        assert_eq!(SeriesStatus::from_source_text(""), SeriesStatus::Unknown);
    }

    #[test]
    fn test_series_info_status_defaults_to_unknown() {
        let info = SeriesInfo {
            title: "Foo".into(),
            ..Default::default()
        };
        assert_eq!(info.status(), SeriesStatus::Unknown);
    }

    #[test]
    fn test_round_trip_str() {
        for status in [
            SeriesStatus::Ongoing,
            SeriesStatus::Completed,
            SeriesStatus::Hiatus,
            SeriesStatus::Unknown,
        ] {
            assert_eq!(status.as_str().parse::<SeriesStatus>().unwrap(), status);
        }
    }
}
