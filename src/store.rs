//! Durable set of already-published item identifiers.
//!
//! The state file is a JSON array of MD5 hex digests of article URLs. Loading
//! never fails: a missing or corrupt file yields an empty set. Saving is
//! best-effort and only logs on failure; losing a write means one article may
//! be republished, which is preferable to stalling the pipeline.

use md5::{Digest, Md5};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Identifiers of items that were published.
pub type SeenSet = BTreeSet<String>;

/// Stable identifier for an article.
///
/// # Arguments
///
/// * `url` - Absolute article URL, exactly as resolved from the listing.
///
/// # Returns
///
/// The lowercase 32-character MD5 hex digest of the URL bytes.
pub fn item_id(url: &str) -> String {
    hex::encode(Md5::digest(url.as_bytes()))
}

/// JSON-file backed store for the [`SeenSet`].
#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    /// Create a store backed by the JSON file at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of `seen.json`. Nothing is read or created until
    ///   [`SeenStore::load`] or [`SeenStore::save`] runs.
    ///
    /// # Returns
    ///
    /// A new `SeenStore` instance.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the set from disk; missing or unreadable state is an empty set.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> SeenSet {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No state file yet; starting with an empty set");
                return SeenSet::new();
            }
            Err(e) => {
                warn!(error = %e, "Could not read state file; starting with an empty set");
                return SeenSet::new();
            }
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => {
                let seen: SeenSet = ids.into_iter().collect();
                info!(count = seen.len(), "Loaded published identifiers");
                seen
            }
            Err(e) => {
                warn!(error = %e, "State file is corrupt; starting with an empty set");
                SeenSet::new()
            }
        }
    }

    /// Persist the set, logging instead of failing.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn save(&self, seen: &SeenSet) {
        match self.write(seen).await {
            Ok(()) => debug!(count = seen.len(), "Saved published identifiers"),
            Err(e) => warn!(error = %e, "Failed to save state file; continuing"),
        }
    }

    /// Write to a sibling temp file, then rename over the old state.
    async fn write(&self, seen: &SeenSet) -> io::Result<()> {
        let ids: Vec<&String> = seen.iter().collect();
        let json = serde_json::to_string_pretty(&ids)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_item_id_is_md5_hex() {
        assert_eq!(item_id(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            item_id("https://www.haberler.com/a"),
            item_id("https://www.haberler.com/a")
        );
        assert_ne!(
            item_id("https://www.haberler.com/a"),
            item_id("https://www.haberler.com/b")
        );
        assert_eq!(item_id("https://www.haberler.com/a").len(), 32);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = SeenStore::new(dir.path().join("seen.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(SeenStore::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn test_saved_set_survives_a_fresh_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let id = item_id("https://www.haberler.com/haber-1");

        let mut seen = SeenSet::new();
        seen.insert(id.clone());
        SeenStore::new(&path).save(&seen).await;

        let reloaded = SeenStore::new(&path).load().await;
        assert!(reloaded.contains(&id));
        assert_eq!(reloaded.len(), 1);

        let on_disk: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, vec![id]);
    }

    #[tokio::test]
    async fn test_save_to_missing_directory_is_swallowed() {
        let dir = tempdir().unwrap();
        let store = SeenStore::new(dir.path().join("nope").join("seen.json"));
        let mut seen = SeenSet::new();
        seen.insert("x".to_string());
        store.save(&seen).await;
        assert!(store.load().await.is_empty());
    }
}
