//! Chapter-level types: numbers, discovered links and extracted content.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A chapter number as published by the source.
///
/// Sources number side chapters like `12.5`, so this wraps a decimal and
/// compares numerically. Values are normalized on construction, which makes
/// `12.50` and `12.5` the same chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChapterNumber(Decimal);

impl ChapterNumber {
    pub fn new(value: Decimal) -> Self {
        Self(value.normalize())
    }

    /// Parse `"12"`, `"12.5"` or `"12,5"`. Negative numbers are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = raw.trim().replace(',', ".");
        let value = Decimal::from_str(&cleaned).ok()?;
        if value.is_sign_negative() {
            return None;
        }
        Some(Self::new(value))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl From<u32> for ChapterNumber {
    fn from(value: u32) -> Self {
        Self::new(Decimal::from(value))
    }
}

impl FromStr for ChapterNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid chapter number: {}", s))
    }
}

impl fmt::Display for ChapterNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ChapterNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChapterNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Integer(u64),
            Float(f64),
        }

        let number = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => ChapterNumber::parse(&text),
            Raw::Integer(value) => Some(ChapterNumber::new(Decimal::from(value))),
            Raw::Float(value) => Decimal::try_from(value)
                .ok()
                .filter(|d| !d.is_sign_negative())
                .map(ChapterNumber::new),
        };

        number.ok_or_else(|| serde::de::Error::custom("invalid chapter number"))
    }
}

/// A chapter discovered on a series index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterLink {
    pub number: ChapterNumber,
    pub title: String,
    /// Absolute URL of the chapter page
    pub url: String,
}

impl ChapterLink {
    pub fn new(number: ChapterNumber, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Extracted chapter body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ChapterContent {
    /// Ordered absolute image URLs (comics)
    Images(Vec<String>),
    /// Cleaned chapter text (novels)
    Text(String),
}

impl ChapterContent {
    /// Image count, or character count for text.
    pub fn item_count(&self) -> usize {
        match self {
            ChapterContent::Images(images) => images.len(),
            ChapterContent::Text(text) => text.chars().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let a = ChapterNumber::parse("12.50").unwrap();
        let b = ChapterNumber::parse("12,5").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "12.5");
        assert_eq!(ChapterNumber::parse("7").unwrap().to_string(), "7");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ChapterNumber::parse("abc").is_none());
        assert!(ChapterNumber::parse("-3").is_none());
        assert!(ChapterNumber::parse("").is_none());
    }

    #[test]
    fn test_ordering_is_numeric() {
        let mut numbers: Vec<ChapterNumber> = ["10", "9.5", "2", "100"]
            .iter()
            .map(|s| ChapterNumber::parse(s).unwrap())
            .collect();
        numbers.sort();
        let rendered: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
        assert_eq!(rendered, vec!["2", "9.5", "10", "100"]);
    }

    #[test]
    fn test_serde_accepts_numbers_and_strings() {
        let from_int: ChapterNumber = serde_json::from_str("12").unwrap();
        let from_float: ChapterNumber = serde_json::from_str("12.5").unwrap();
        let from_str: ChapterNumber = serde_json::from_str("\"12.5\"").unwrap();

        assert_eq!(from_int, ChapterNumber::from(12));
        assert_eq!(from_float, from_str);
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"12.5\"");
    }

    #[test]
    fn test_item_count() {
        let images = ChapterContent::Images(vec!["a".into(), "b".into()]);
        let text = ChapterContent::Text("Chương một".into());
        assert_eq!(images.item_count(), 2);
        assert_eq!(text.item_count(), 10);
        assert!(ChapterContent::Images(vec![]).is_empty());
    }
}
