//! The playlist catalog. Loaded once at startup from a JSON file and
//! immutable for the life of the process.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use mb_domain::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Venue categories this playlist is curated for
    /// (`hotel`, `bar`, `spa`, `cafe`, `restaurant`, `lounge`, `store`).
    #[serde(default)]
    pub categories: BTreeSet<String>,
    /// Opaque platform identifier used when assigning the playlist to a
    /// sound zone. Absent for playlists not yet published to the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syb_id: Option<String>,
}

impl Playlist {
    /// Lowercased searchable text the matcher scores against.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.name, self.description).to_lowercase()
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    playlists: Vec<Playlist>,
}

impl Catalog {
    /// Load the catalog from disk. A missing or empty catalog is fatal:
    /// the service cannot recommend anything without it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let playlists: Vec<Playlist> = serde_json::from_str(&raw)?;
        if playlists.is_empty() {
            return Err(Error::Config(format!(
                "playlist catalog {} is empty",
                path.display()
            )));
        }
        tracing::info!(count = playlists.len(), path = %path.display(), "playlist catalog loaded");
        Ok(Self { playlists })
    }

    pub fn from_playlists(playlists: Vec<Playlist>) -> Self {
        Self { playlists }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Playlist> {
        self.playlists.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    /// Find a playlist by id first, then by exact name. Submissions carry
    /// liked playlists as either form.
    pub fn resolve(&self, id_or_name: &str) -> Option<&Playlist> {
        self.get(id_or_name)
            .or_else(|| self.playlists.iter().find(|p| p.name == id_or_name))
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }
}
