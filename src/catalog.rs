//! Color template catalog, loaded once at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// A named color palette used to steer image generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColorTemplate {
    /// Display name, falling back to the template id.
    pub name: String,
    /// Colors in catalog order, hex or symbolic.
    #[serde(rename = "color")]
    pub colors: Vec<String>,
}

#[derive(Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    color: Vec<String>,
}

impl From<CatalogEntry> for ColorTemplate {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            name: entry.name.or(entry.id).unwrap_or_default(),
            colors: entry.color,
        }
    }
}

/// Read-only list of [`ColorTemplate`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    templates: Vec<ColorTemplate>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Self, ConfigurationError> {
        let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/template.json"));
        Self::from_json("bundled", raw)
    }

    /// Reads a catalog file.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigurationError::Catalog {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_json(&path.display().to_string(), &raw)
    }

    /// Parses catalog JSON; `source` only labels errors.
    pub fn from_json(source: &str, raw: &str) -> Result<Self, ConfigurationError> {
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(raw).map_err(|err| ConfigurationError::Catalog {
                path: source.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            templates: entries.into_iter().map(ColorTemplate::from).collect(),
        })
    }

    /// Looks a template up by name.
    pub fn get(&self, name: &str) -> Option<&ColorTemplate> {
        self.templates.iter().find(|template| template.name == name)
    }

    /// Templates in catalog order.
    pub fn templates(&self) -> &[ColorTemplate] {
        &self.templates
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True when the catalog has no templates.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
