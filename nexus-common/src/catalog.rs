//! Source catalog
//!
//! A fixed, ordered list of playable sources looked up by id. The built-in
//! list can be replaced by `[[sources]]` entries in the settings file.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One playable stream source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Stable identity key
    pub id: String,
    /// Human readable name shown by the panel
    pub display_name: String,
    /// Short genre/description line
    #[serde(default)]
    pub description: String,
    /// Network stream handed to the engine
    pub stream_url: String,
    /// CSS gradient used as the panel theme while this source plays
    #[serde(default)]
    pub theme_gradient: String,
}

impl SourceDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        stream_url: impl Into<String>,
        theme_gradient: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: String::new(),
            stream_url: stream_url.into(),
            theme_gradient: theme_gradient.into(),
        }
    }

    fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Ordered, read-only collection of sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    sources: Vec<SourceDescriptor>,
}

impl Catalog {
    /// Build a catalog from an explicit list.
    ///
    /// Entries with a duplicate id are rejected so that lookups stay unambiguous.
    pub fn new(sources: Vec<SourceDescriptor>) -> Result<Self> {
        for (idx, source) in sources.iter().enumerate() {
            if source.id.trim().is_empty() {
                return Err(Error::Config(format!("source #{} has an empty id", idx)));
            }
            if sources[..idx].iter().any(|s| s.id == source.id) {
                return Err(Error::Config(format!("duplicate source id '{}'", source.id)));
            }
        }
        Ok(Self { sources })
    }

    /// The stations shipped with the player
    pub fn builtin() -> Self {
        let station = |id: &str, name: &str, description: &str, gradient: &str| {
            SourceDescriptor::new(
                id,
                name,
                format!("http://stream.nightride.fm/{}.m4a", id),
                gradient,
            )
            .with_description(description)
        };

        Self {
            sources: vec![
                station(
                    "nightride",
                    "Nightride FM",
                    "Synthwave Classics",
                    "linear-gradient(135deg, #00f3ff 0%, #bd00ff 100%)",
                ),
                station(
                    "chillsynth",
                    "Chillsynth",
                    "Lo-Fi & Downtempo",
                    "linear-gradient(135deg, #ff9a9e 0%, #fecfef 99%, #fecfef 100%)",
                ),
                station(
                    "datawave",
                    "Datawave",
                    "Cyberpunk Focus",
                    "linear-gradient(135deg, #0ba360 0%, #3cba92 100%)",
                ),
                station(
                    "spacesynth",
                    "Spacesynth",
                    "Sci-Fi Energy",
                    "linear-gradient(135deg, #4facfe 0%, #00f2fe 100%)",
                ),
                station(
                    "darksynth",
                    "Darksynth",
                    "Industrial Aggressive",
                    "linear-gradient(135deg, #434343 0%, #000000 100%)",
                ),
                station(
                    "ebsm",
                    "EBSM",
                    "Dark Club & EBM",
                    "linear-gradient(135deg, #fccb90 0%, #d57eeb 100%)",
                ),
                station(
                    "horrorsynth",
                    "Horror",
                    "Spooky Ambient",
                    "linear-gradient(135deg, #240b36 0%, #c31432 100%)",
                ),
                station(
                    "rekt",
                    "Rekt FM",
                    "Drum & Bass",
                    "linear-gradient(135deg, #f83600 0%, #f9d423 100%)",
                ),
            ],
        }
    }

    /// Look a source up by id
    pub fn get(&self, id: &str) -> Result<&SourceDescriptor> {
        self.sources
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::NotFound(format!("unknown source '{}'", id)))
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
