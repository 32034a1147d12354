//! Playlist manifest and multi-item selection for batch submissions.
//!
//! The selection only ever holds identifiers present in the current manifest.
//! Installing a new manifest discards the previous one together with its
//! selection and selects every new item.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One entry of a fetched playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
}

/// A fetched playlist. Immutable once fetched; replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistManifest {
    pub title: String,
    pub items: Vec<PlaylistItem>,
}

impl PlaylistManifest {
    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Returns true when a URL points at a playlist rather than a single video.
pub fn is_playlist_url(url: &str) -> bool {
    url.contains("list=") || url.contains("/playlist")
}

/// Current manifest plus the identifiers chosen from it.
#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    manifest: Option<PlaylistManifest>,
    selected: HashSet<String>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest(&self) -> Option<&PlaylistManifest> {
        self.manifest.as_ref()
    }

    /// Installs a new manifest and selects all of its items.
    pub fn replace_manifest(&mut self, manifest: PlaylistManifest) {
        self.selected = manifest.items.iter().map(|item| item.id.clone()).collect();
        self.manifest = Some(manifest);
    }

    /// Flips membership of `id`. Identifiers outside the manifest are ignored;
    /// returns whether the id is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        let known = self.manifest.as_ref().is_some_and(|m| m.contains(id));
        if !known {
            return false;
        }
        if self.selected.remove(id) {
            false
        } else {
            self.selected.insert(id.to_string());
            true
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self
            .manifest
            .iter()
            .flat_map(|m| m.items.iter().map(|item| item.id.clone()))
            .collect();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Snapshot of the selection, in manifest order.
    pub fn selected_ids(&self) -> Vec<String> {
        self.manifest
            .iter()
            .flat_map(|m| m.items.iter())
            .filter(|item| self.selected.contains(&item.id))
            .map(|item| item.id.clone())
            .collect()
    }

    /// Serializable view of manifest and selection.
    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            manifest: self.manifest.clone(),
            selected: self.selected_ids(),
        }
    }
}

/// Manifest plus ordered selection, as handed to the Presentation Layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    pub manifest: Option<PlaylistManifest>,
    pub selected: Vec<String>,
}
