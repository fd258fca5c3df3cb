//! Typed manifest documents.
//!
//! Every tome carries a root manifest, `tome.json`, whose `type` field selects
//! how the rest of the document is read. [`Manifest`] is a tagged union over
//! the known types; each variant validates its typed fields at parse time and
//! keeps any other field in an opaque `extra` map so documents survive a
//! parse/serialize cycle unchanged. Unknown types are kept whole.
//!
//! Reference fields (`chapters_file`, `pages_file`, `content`) hold raw link
//! strings; they are resolved by the cascade, not here.

use std::cmp::Ordering;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::path::CanonicalPath;
use crate::{Error, Result};

pub const TYPE_COMIC_VOLUME: &str = "comic_volume";
pub const TYPE_COMIC_CHAPTER: &str = "comic_chapter";
pub const TYPE_BOOK_CHAPTER: &str = "book_chapter";
pub const TYPE_AUDIO_BOOK: &str = "audio_book";
pub const TYPE_EPUB: &str = "epub";

/// Chapter or page number: a JSON number, or a string holding one
/// (`"1.5"`), or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderKey {
    Number(f64),
    Text(String),
}

impl OrderKey {
    /// Numeric value, parsing numeric strings.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            OrderKey::Number(n) => Some(*n).filter(|n| n.is_finite()),
            OrderKey::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKey::Number(n) => write!(f, "{}", n),
            OrderKey::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Sort order for optional keys: numbers ascending, then non-numeric text,
/// then entries without a key.
pub fn compare_keys(a: Option<&OrderKey>, b: Option<&OrderKey>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.numeric(), b.numeric()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.to_string().cmp(&b.to_string()),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingDirection {
    Ltr,
    Rtl,
}

/// `comic_volume`: a volume of chapters listed in `chapters_file`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComicVolume {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapters_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_direction: Option<ReadingDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `comic_chapter`: one chapter whose pages are listed in `pages_file`, or
/// found by scanning for images when it is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComicChapter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<OrderKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_direction: Option<ReadingDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `book_chapter`: a single chapter document referenced by `content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookChapter {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_number: Option<OrderKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `audio_book`: narrated audio with optional chapter markers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioBook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapters_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrators: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Total length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_number: Option<OrderKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Pointer to metadata kept in a wrapped format's own files, such as an
/// EPUB package document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataReference {
    pub format: String,
    pub path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `epub`: a wrapped EPUB package. Every field besides `type` is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Epub {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_reference: Option<MetadataReference>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A parsed manifest, keyed by its `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    ComicVolume(ComicVolume),
    ComicChapter(ComicChapter),
    BookChapter(BookChapter),
    AudioBook(AudioBook),
    Epub(Epub),
    /// A type this crate has no field set for. All fields are kept.
    Other {
        type_name: String,
        fields: Map<String, Value>,
    },
}

impl Manifest {
    /// Parses a manifest document. The error is a human-readable reason.
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, String> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        Self::from_value(value)
    }

    /// Parses the manifest stored at `path`, reporting failures as
    /// [`Error::MalformedManifest`].
    pub fn parse_at(path: &CanonicalPath, bytes: &[u8]) -> Result<Self> {
        Self::parse(bytes).map_err(|reason| Error::malformed(path, reason))
    }

    pub fn from_value(value: Value) -> std::result::Result<Self, String> {
        let Value::Object(mut fields) = value else {
            return Err("manifest must be a JSON object".to_string());
        };
        let type_name = match fields.remove("type") {
            Some(Value::String(s)) => s,
            Some(_) => return Err("'type' must be a string".to_string()),
            None => return Err("missing required field 'type'".to_string()),
        };

        let manifest = match type_name.as_str() {
            TYPE_COMIC_VOLUME => Manifest::ComicVolume(typed(fields)?),
            TYPE_COMIC_CHAPTER => Manifest::ComicChapter(typed(fields)?),
            TYPE_BOOK_CHAPTER => Manifest::BookChapter(typed(fields)?),
            TYPE_AUDIO_BOOK => Manifest::AudioBook(typed(fields)?),
            TYPE_EPUB => Manifest::Epub(typed(fields)?),
            _ => Manifest::Other { type_name, fields },
        };
        Ok(manifest)
    }

    /// The `type` string.
    pub fn type_name(&self) -> &str {
        match self {
            Manifest::ComicVolume(_) => TYPE_COMIC_VOLUME,
            Manifest::ComicChapter(_) => TYPE_COMIC_CHAPTER,
            Manifest::BookChapter(_) => TYPE_BOOK_CHAPTER,
            Manifest::AudioBook(_) => TYPE_AUDIO_BOOK,
            Manifest::Epub(_) => TYPE_EPUB,
            Manifest::Other { type_name, .. } => type_name,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Manifest::ComicVolume(m) => m.title.as_deref(),
            Manifest::ComicChapter(m) => m.title.as_deref(),
            Manifest::BookChapter(m) => m.title.as_deref(),
            Manifest::AudioBook(m) => m.title.as_deref(),
            Manifest::Epub(m) => m.title.as_deref(),
            Manifest::Other { fields, .. } => fields.get("title").and_then(Value::as_str),
        }
    }

    /// Reference fields this manifest declares, as `(field, raw link)`.
    pub fn references(&self) -> Vec<(&'static str, &str)> {
        match self {
            Manifest::ComicVolume(m) => m
                .chapters_file
                .as_deref()
                .map(|link| ("chapters_file", link))
                .into_iter()
                .collect(),
            Manifest::ComicChapter(m) => m
                .pages_file
                .as_deref()
                .map(|link| ("pages_file", link))
                .into_iter()
                .collect(),
            Manifest::BookChapter(m) => vec![("content", m.content.as_str())],
            Manifest::AudioBook(m) => m
                .chapters_file
                .as_deref()
                .map(|link| ("chapters_file", link))
                .into_iter()
                .collect(),
            Manifest::Epub(_) | Manifest::Other { .. } => Vec::new(),
        }
    }

    /// The document as JSON, `type` included.
    pub fn to_value(&self) -> Value {
        let body = match self {
            Manifest::ComicVolume(m) => serde_json::to_value(m),
            Manifest::ComicChapter(m) => serde_json::to_value(m),
            Manifest::BookChapter(m) => serde_json::to_value(m),
            Manifest::AudioBook(m) => serde_json::to_value(m),
            Manifest::Epub(m) => serde_json::to_value(m),
            Manifest::Other { fields, .. } => Ok(Value::Object(fields.clone())),
        };
        // Serializing plain structs of strings, numbers and maps cannot fail.
        let mut fields = match body {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        fields.insert("type".to_string(), Value::String(self.type_name().to_string()));
        Value::Object(fields)
    }

    pub fn to_json_pretty(&self) -> String {
        // Display of a Value never fails
        format!("{:#}", self.to_value())
    }
}

fn typed<T: DeserializeOwned>(fields: Map<String, Value>) -> std::result::Result<T, String> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| e.to_string())
}

/// One row of a comic `chapters_file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterEntry {
    /// A pages file, a chapter manifest, or a directory of images.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_number: Option<OrderKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of a `pages_file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<OrderKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Page classification such as `cover` or `story`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of an audiobook `chapters_file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioChapterEntry {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_number: Option<OrderKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parses a reference target that must be a JSON array of `T`.
pub fn parse_list<T: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<Vec<T>, String> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    if !value.is_array() {
        return Err("expected a JSON array".to_string());
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// True when `bytes` parse as JSON of any shape.
pub fn is_valid_json(bytes: &[u8]) -> bool {
    serde_json::from_slice::<serde::de::IgnoredAny>(bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_comic_volume() {
        let manifest = Manifest::parse(
            br#"{"type":"comic_volume","chapters_file":"/chapters.json","title":"Heroes","reading_direction":"rtl"}"#,
        )
        .unwrap();
        let Manifest::ComicVolume(volume) = &manifest else {
            panic!("expected comic_volume, got {manifest:?}");
        };
        assert_eq!(volume.chapters_file.as_deref(), Some("/chapters.json"));
        assert_eq!(volume.reading_direction, Some(ReadingDirection::Rtl));
        assert_eq!(manifest.references(), vec![("chapters_file", "/chapters.json")]);
        assert_eq!(manifest.title(), Some("Heroes"));
    }

    #[test]
    fn test_missing_or_bad_type() {
        assert!(Manifest::parse(br#"{"title":"x"}"#).unwrap_err().contains("type"));
        assert!(Manifest::parse(br#"{"type":3}"#).unwrap_err().contains("type"));
        assert!(Manifest::parse(br#"[1,2]"#).is_err());
        assert!(Manifest::parse(b"{not json").is_err());
    }

    #[test]
    fn test_typed_fields_are_validated() {
        assert!(Manifest::parse(br#"{"type":"comic_volume","chapters_file":7}"#).is_err());
        assert!(Manifest::parse(br#"{"type":"comic_chapter","reading_direction":"up"}"#).is_err());
        // book_chapter requires its content reference
        assert!(Manifest::parse(br#"{"type":"book_chapter","title":"One"}"#).is_err());
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let input = json!({
            "type": "epub",
            "title": "The Great Adventure",
            "x-shelf": {"row": 3},
            "metadata_reference": {"format": "epub_opf", "path": "OEBPS/content.opf", "v": 2}
        });
        let manifest = Manifest::from_value(input.clone()).unwrap();
        assert_eq!(manifest.to_value(), input);

        let Manifest::Epub(epub) = &manifest else {
            panic!("expected epub");
        };
        assert_eq!(epub.metadata_reference.as_ref().unwrap().path, "OEBPS/content.opf");
        assert!(manifest.references().is_empty());
    }

    #[test]
    fn test_unknown_type_is_kept_whole() {
        let input = json!({"type": "book", "name": "Manual", "pages": 12});
        let manifest = Manifest::from_value(input.clone()).unwrap();
        assert_eq!(manifest.type_name(), "book");
        assert!(matches!(manifest, Manifest::Other { .. }));
        assert_eq!(manifest.to_value(), input);
    }

    #[test]
    fn test_order_keys() {
        let rows: Vec<ChapterEntry> = parse_list(
            br#"[{"path":"a","chapter_number":2},{"path":"b","chapter_number":"1.5"},{"path":"c","chapter_number":"extra"},{"path":"d"}]"#,
        )
        .unwrap();
        let keys: Vec<_> = rows.iter().map(|r| r.chapter_number.as_ref()).collect();
        assert_eq!(keys[0].unwrap().numeric(), Some(2.0));
        assert_eq!(keys[1].unwrap().numeric(), Some(1.5));
        assert_eq!(keys[2].unwrap().numeric(), None);

        assert_eq!(compare_keys(keys[1], keys[0]), Ordering::Less);
        assert_eq!(compare_keys(keys[0], keys[2]), Ordering::Less);
        assert_eq!(compare_keys(keys[2], keys[3]), Ordering::Less);
        assert_eq!(compare_keys(keys[3], keys[3]), Ordering::Equal);
    }

    #[test]
    fn test_parse_list_requires_array() {
        assert!(parse_list::<PageEntry>(br#"{"file":"a.jpg"}"#).is_err());
        assert!(parse_list::<PageEntry>(br#"[{"page":1}]"#).is_err());
        let pages: Vec<PageEntry> =
            parse_list(br#"[{"file":"p/1.jpg","page":1,"width":1024,"type":"cover"}]"#).unwrap();
        assert_eq!(pages[0].kind.as_deref(), Some("cover"));
        assert_eq!(pages[0].width, Some(1024));
    }

    #[test]
    fn test_is_valid_json() {
        assert!(is_valid_json(b"[1, 2]"));
        assert!(is_valid_json(b"\"text\""));
        assert!(!is_valid_json(b"{not json"));
    }
}
