//! Normalized book representation.
//!
//! Every value here is built fresh by a single parse call and handed to the
//! caller; nothing is shared between parses.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A parsed ebook: metadata plus chapters in reading order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Book {
    pub metadata: Metadata,
    pub chapters: Vec<Chapter>,
}

/// Book metadata normalized across formats.
///
/// `name` is the only field guaranteed to be non-empty; it falls back to the
/// source file name. List-valued fields are `None` rather than empty when
/// nothing was found.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Metadata {
    pub name: String,
    pub author: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub annotation: Option<Vec<String>>,
    pub genres: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    /// `"ru"` or `"en"`, when the source declared a language.
    pub language: Option<String>,
    pub cover: Option<CoverImage>,
    pub sequence: Option<Sequence>,
}

/// A series the book belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sequence {
    pub name: String,
    pub number: Option<i64>,
}

/// One chapter: a non-empty title and sanitized body markup.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Chapter {
    pub title: String,
    pub content: String,
}

/// Cover image as a canonical `data:image/<encoding>;base64,<bytes>` URI.
///
/// Deserialized covers are canonicalized the same way as parsed ones.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "CoverImageFields"))]
pub struct CoverImage {
    encoding: String,
    payload: String,
}

/// Wire form of [`CoverImage`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct CoverImageFields {
    #[serde(default)]
    encoding: String,
    payload: String,
}

#[cfg(feature = "serde")]
impl From<CoverImageFields> for CoverImage {
    fn from(fields: CoverImageFields) -> Self {
        if fields.payload.trim_start().starts_with(DATA_IMAGE_PREFIX) {
            return Self::new(&fields.payload);
        }
        let media_type = format!("image/{}", fields.encoding);
        Self::with_encoding(encoding_for(Some(&media_type)), &fields.payload)
    }
}

const DATA_IMAGE_PREFIX: &str = "data:image";
const DEFAULT_ENCODING: &str = "jpeg";

impl CoverImage {
    /// Canonicalize a cover payload.
    ///
    /// A payload that is already a `data:image/...` URI is kept unchanged and
    /// its subtype becomes the encoding. Anything else is treated as raw
    /// base64 and prefixed as JPEG.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();

        if raw.starts_with(DATA_IMAGE_PREFIX) {
            let encoding = raw
                .split(';')
                .next()
                .and_then(|head| head.rsplit('/').next())
                .filter(|subtype| !subtype.is_empty() && !subtype.starts_with("data:"))
                .unwrap_or(DEFAULT_ENCODING);

            return Self {
                encoding: encoding.to_string(),
                payload: raw.to_string(),
            };
        }

        Self::with_encoding(DEFAULT_ENCODING, raw)
    }

    /// Build a cover from raw image bytes and their declared media type.
    ///
    /// Media types outside `image/*` fall back to JPEG.
    pub fn from_bytes(data: &[u8], media_type: Option<&str>) -> Self {
        Self::with_encoding(encoding_for(media_type), &STANDARD.encode(data))
    }

    /// Build a cover from base64 text (whitespace allowed) and its declared
    /// media type.
    pub fn from_base64(base64: &str, media_type: Option<&str>) -> Self {
        Self::with_encoding(encoding_for(media_type), base64)
    }

    fn with_encoding(encoding: &str, base64: &str) -> Self {
        let compact: String = base64.split_whitespace().collect();
        Self {
            encoding: encoding.to_string(),
            payload: format!("data:image/{encoding};base64,{compact}"),
        }
    }

    /// Image subtype, e.g. `"jpeg"` or `"png"`.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// The full data URI.
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

fn encoding_for(media_type: Option<&str>) -> &str {
    media_type
        .and_then(|mt| mt.trim().strip_prefix("image/"))
        .map(|subtype| subtype.split(';').next().unwrap_or(subtype).trim())
        .filter(|subtype| !subtype.is_empty())
        .unwrap_or(DEFAULT_ENCODING)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_raw_payload_gets_jpeg_prefix() {
        let cover = CoverImage::new("0");
        assert_eq!(cover.payload(), "data:image/jpeg;base64,0");
        assert_eq!(cover.encoding(), "jpeg");
    }

    #[test]
    fn test_cover_existing_data_uri_unchanged() {
        let uri = "data:image/png;base64,/9j/a342gvv4gh3";
        let cover = CoverImage::new(uri);
        assert_eq!(cover.payload(), uri);
        assert_eq!(cover.encoding(), "png");
    }

    #[test]
    fn test_cover_raw_payload_whitespace_removed() {
        let cover = CoverImage::new("  /9j/4AAQ\n  SkZJRg==\n");
        assert_eq!(cover.payload(), "data:image/jpeg;base64,/9j/4AAQSkZJRg==");
    }

    #[test]
    fn test_cover_from_bytes_uses_media_type() {
        let cover = CoverImage::from_bytes(b"abc", Some("image/png"));
        assert_eq!(cover.encoding(), "png");
        assert_eq!(cover.payload(), "data:image/png;base64,YWJj");

        let cover = CoverImage::from_bytes(b"abc", Some("application/octet-stream"));
        assert_eq!(cover.encoding(), "jpeg");

        let cover = CoverImage::from_bytes(b"abc", None);
        assert!(cover.payload().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_cover_from_base64() {
        let cover = CoverImage::from_base64("iVBO\nRw0K", Some("image/png"));
        assert_eq!(cover.payload(), "data:image/png;base64,iVBORw0K");
    }
}
