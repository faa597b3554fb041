use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::request::CrawlResult;

/// One of the five image slots of a crawled page that can be sent to OCR.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, bitcode::Encode, bitcode::Decode,
)]
pub enum Position {
    FirstImageUrl,
    FirstStickerUrl,
    SecondStickerUrl,
    LastImageUrl,
    LastStickerUrl,
}

impl Position {
    pub const ALL: [Position; 5] = [
        Position::FirstImageUrl,
        Position::FirstStickerUrl,
        Position::SecondStickerUrl,
        Position::LastImageUrl,
        Position::LastStickerUrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::FirstImageUrl => "FirstImageUrl",
            Position::FirstStickerUrl => "FirstStickerUrl",
            Position::SecondStickerUrl => "SecondStickerUrl",
            Position::LastImageUrl => "LastImageUrl",
            Position::LastStickerUrl => "LastStickerUrl",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .into_iter()
            .find(|position| position.as_str() == s)
            .ok_or_else(|| format!("invalid currentPosition: {}", s))
    }
}

impl CrawlResult {
    /// Image URL stored in the slot named by `position`.
    pub fn image_url(&self, position: Position) -> &str {
        match position {
            Position::FirstImageUrl => &self.first_image_url,
            Position::FirstStickerUrl => &self.first_sticker_url,
            Position::SecondStickerUrl => &self.second_sticker_url,
            Position::LastImageUrl => &self.last_image_url,
            Position::LastStickerUrl => &self.last_sticker_url,
        }
    }
}

/// Map a raw slot name to its image URL.
///
/// Total over every input: names outside the five slots (including the empty
/// string and any casing variant) resolve to `""`. Deciding whether an empty
/// URL is an error is left to the caller.
pub fn resolve<'a>(crawl_result: &'a CrawlResult, position: &str) -> &'a str {
    match Position::from_str(position) {
        Ok(position) => crawl_result.image_url(position),
        Err(_) => "",
    }
}
