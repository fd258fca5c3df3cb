//! Templates for new tomes.
//!
//! A catalog is read from a JSON file of the form
//! `{ "templates": [ { "id", "name", "description", "tomeJson", "files" } ] }`.
//! Callers own the catalog; nothing is cached globally.

use std::path::Path;

use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{Error, Result};

/// Id of the template used when none is requested.
pub const DEFAULT_TEMPLATE_ID: &str = "basic";

/// An extra file written into a new tome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFile {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomeTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "tomeJson", alias = "tome_json")]
    pub tome_json: Value,
    #[serde(default)]
    pub files: Vec<TemplateFile>,
}

impl TomeTemplate {
    /// The template's `tome.json`, with an empty `created` field set to
    /// `today` in ISO format.
    pub fn prepare_tome_json(&self, today: NaiveDate) -> Value {
        let mut tome_json = self.tome_json.clone();
        if let Some(created) = tome_json.get_mut("created")
            && is_blank(created)
        {
            *created = Value::String(today.format("%Y-%m-%d").to_string());
        }
        tome_json
    }

    /// [`Self::prepare_tome_json`] rendered as pretty-printed JSON.
    pub fn render_tome_json(&self, today: NaiveDate) -> String {
        format!("{:#}", self.prepare_tome_json(today))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Deserialize)]
struct TemplateConfig {
    templates: Vec<TomeTemplate>,
}

/// The set of templates available to `create`.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateCatalog {
    templates: Vec<TomeTemplate>,
}

impl TemplateCatalog {
    /// Parses a catalog document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: TemplateConfig = serde_json::from_str(text)
            .map_err(|e| Error::malformed("templates", e.to_string()))?;
        if config.templates.is_empty() {
            return Err(Error::malformed("templates", "no templates defined"));
        }
        Ok(Self {
            templates: config.templates,
        })
    }

    /// Reads a catalog file.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let catalog = Self::from_json(&text)?;
        debug!(
            "loaded {} templates from {}",
            catalog.templates.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Reads a catalog file, falling back to [`Self::builtin`] when it
    /// cannot be read or parsed.
    pub async fn load_or_builtin(path: &Path) -> Self {
        match Self::load(path).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("template catalog {}: {}; using built-in", path.display(), e);
                Self::builtin()
            }
        }
    }

    /// The single `basic` template.
    pub fn builtin() -> Self {
        Self {
            templates: vec![TomeTemplate {
                id: DEFAULT_TEMPLATE_ID.to_string(),
                name: "Basic".to_string(),
                description: "Simple tome with minimal metadata".to_string(),
                tome_json: json!({
                    "type": "comic_chapter",
                    "title": "",
                    "version": "1.0.0",
                    "description": "",
                    "author": "",
                    "created": "",
                }),
                files: Vec::new(),
            }],
        }
    }

    pub fn templates(&self) -> &[TomeTemplate] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Result<&TomeTemplate> {
        self.templates
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::UnknownTemplate { id: id.to_string() })
    }

    /// `basic` if present, otherwise the first template.
    pub fn default_template(&self) -> &TomeTemplate {
        self.templates
            .iter()
            .find(|t| t.id == DEFAULT_TEMPLATE_ID)
            .unwrap_or(&self.templates[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "templates": [
            {
                "id": "comic",
                "name": "Comic volume",
                "description": "Volume with a chapters file",
                "tomeJson": {"type": "comic_volume", "title": "", "created": ""},
                "files": [
                    {"path": "chapters.json", "content": "[]", "language": "json"}
                ]
            },
            {
                "id": "audio",
                "name": "Audiobook",
                "tome_json": {"type": "audio_book", "created": "2020-01-01"}
            }
        ]
    }"#;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_from_json() {
        let catalog = TemplateCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.templates().len(), 2);
        let comic = catalog.get("comic").unwrap();
        assert_eq!(comic.files[0].path, "chapters.json");
        assert_eq!(catalog.get("audio").unwrap().files.len(), 0);
        assert!(matches!(
            catalog.get("nope"),
            Err(Error::UnknownTemplate { .. })
        ));
        // no "basic" in this catalog
        assert_eq!(catalog.default_template().id, "comic");
    }

    #[test]
    fn test_bad_catalogs() {
        assert!(TemplateCatalog::from_json("{").is_err());
        assert!(TemplateCatalog::from_json(r#"{"templates": []}"#).is_err());
        assert!(TemplateCatalog::from_json(r#"{"templates": [{"id": "x"}]}"#).is_err());
    }

    #[test]
    fn test_prepare_fills_empty_created() {
        let catalog = TemplateCatalog::from_json(CATALOG).unwrap();
        let prepared = catalog.get("comic").unwrap().prepare_tome_json(day());
        assert_eq!(prepared["created"], "2026-10-16");

        let prepared = catalog.get("audio").unwrap().prepare_tome_json(day());
        assert_eq!(prepared["created"], "2020-01-01");
    }

    #[test]
    fn test_builtin() {
        let catalog = TemplateCatalog::builtin();
        let basic = catalog.default_template();
        assert_eq!(basic.id, DEFAULT_TEMPLATE_ID);
        let rendered = basic.render_tome_json(day());
        assert!(crate::manifest::Manifest::parse(rendered.as_bytes()).is_ok());
        assert!(rendered.contains("2026-10-16"));
    }

    #[tokio::test]
    async fn test_load_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("templates.json");
        assert!(TemplateCatalog::load(&missing).await.is_err());
        assert_eq!(
            TemplateCatalog::load_or_builtin(&missing).await,
            TemplateCatalog::builtin()
        );

        std::fs::write(&missing, CATALOG).unwrap();
        let catalog = TemplateCatalog::load(&missing).await.unwrap();
        assert!(catalog.get("audio").is_ok());
    }
}
