//! Media store lookup and asset resolution.
//!
//! Uploaded files live in a flat directory named `<file_id>.<ext>`. Before a
//! composition is compiled, every file the request references is resolved to
//! a local path and probed, so the graph builder itself never touches disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use reel_models::CompositionRequest;

use crate::error::{MediaError, MediaResult};
use crate::probe::{MediaInfo, MediaProber};

/// Resolves file identifiers to readable local paths.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Resolve `file_id` to exactly one path, or fail with `MediaNotFound`.
    async fn resolve(&self, file_id: &str) -> MediaResult<PathBuf>;
}

/// Store backed by a local upload directory.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_safe_file_id(file_id: &str) -> bool {
    !file_id.is_empty()
        && file_id != "."
        && file_id != ".."
        && !file_id.contains(['/', '\\', '\0'])
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn resolve(&self, file_id: &str) -> MediaResult<PathBuf> {
        if !is_safe_file_id(file_id) {
            return Err(MediaError::media_not_found(file_id));
        }

        let prefix = format!("{}.", file_id);
        let mut matches = Vec::new();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Upload directory unreadable");
                return Err(MediaError::media_not_found(file_id));
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.len() > prefix.len() && entry.file_type().await?.is_file() {
                matches.push(entry.path());
            }
        }

        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(MediaError::media_not_found(file_id)),
            n => {
                warn!(file_id, matches = n, "Ambiguous media file ID");
                Err(MediaError::media_not_found(file_id))
            }
        }
    }
}

/// A referenced file resolved to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAsset {
    pub path: PathBuf,
    /// Probe result; `None` when probing failed
    pub info: Option<MediaInfo>,
}

impl ResolvedAsset {
    pub fn new(path: impl Into<PathBuf>, info: Option<MediaInfo>) -> Self {
        Self {
            path: path.into(),
            info,
        }
    }

    /// Probed duration in seconds, when known.
    pub fn duration(&self) -> Option<f64> {
        self.info.as_ref().and_then(MediaInfo::known_duration)
    }
}

/// Every asset a request needs, keyed by file ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedAssets {
    assets: HashMap<String, ResolvedAsset>,
}

impl ResolvedAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_id: impl Into<String>, asset: ResolvedAsset) {
        self.assets.insert(file_id.into(), asset);
    }

    pub fn with(mut self, file_id: impl Into<String>, asset: ResolvedAsset) -> Self {
        self.insert(file_id, asset);
        self
    }

    pub fn get(&self, file_id: &str) -> Option<&ResolvedAsset> {
        self.assets.get(file_id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Resolve and probe every file the request references.
///
/// Primary scene media must resolve; any other reference that cannot be
/// resolved is left out and reported in the returned warnings.
pub async fn resolve_assets(
    request: &CompositionRequest,
    store: &dyn MediaStore,
    prober: &dyn MediaProber,
) -> MediaResult<(ResolvedAssets, Vec<String>)> {
    let required: Vec<&str> = request
        .scenes
        .iter()
        .map(|s| s.media.file_id.as_str())
        .collect();

    let mut assets = ResolvedAssets::new();
    let mut warnings = Vec::new();

    for file_id in request.referenced_file_ids() {
        let path = match store.resolve(file_id).await {
            Ok(path) => path,
            Err(e) if required.contains(&file_id) => return Err(e),
            Err(e) => {
                warn!(file_id, error = %e, "Skipping optional media");
                warnings.push(format!("optional media {} skipped: {}", file_id, e));
                continue;
            }
        };

        let info = match prober.probe(&path).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(file_id, path = %path.display(), error = %e, "Probe failed");
                None
            }
        };

        debug!(file_id, path = %path.display(), "Resolved media");
        assets.insert(file_id, ResolvedAsset::new(path, info));
    }

    Ok((assets, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct NoProbe;

    #[async_trait]
    impl MediaProber for NoProbe {
        async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
            Err(MediaError::FileNotFound(path.to_path_buf()))
        }
    }

    async fn touch(dir: &TempDir, name: &str) {
        fs::write(dir.path().join(name), b"x").await.unwrap();
    }

    #[tokio::test]
    async fn test_resolve_single_match() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "clip.mp4").await;
        touch(&dir, "clipper.mp4").await;

        let store = LocalMediaStore::new(dir.path());
        let path = store.resolve("clip").await.unwrap();
        assert_eq!(path, dir.path().join("clip.mp4"));
    }

    #[tokio::test]
    async fn test_resolve_missing_and_ambiguous() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "dup.mp4").await;
        touch(&dir, "dup.mov").await;

        let store = LocalMediaStore::new(dir.path());

        let err = store.resolve("nope").await.unwrap_err();
        assert!(err.to_string().contains("nope"));

        let err = store.resolve("dup").await.unwrap_err();
        assert!(matches!(err, MediaError::MediaNotFound(id) if id == "dup"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = LocalMediaStore::new(dir.path());
        assert!(store.resolve("../etc/passwd").await.is_err());
        assert!(store.resolve("..").await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_assets_skips_optional() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "img.png").await;

        let request: CompositionRequest = serde_json::from_value(serde_json::json!({
            "title": "t",
            "scenes": [{
                "id": "a",
                "media": { "type": "image", "file_id": "img" },
                "voiceover": { "file_id": "gone" }
            }],
            "global_audio": { "background_music": { "music_id": "also-gone" } }
        }))
        .unwrap();

        let store = LocalMediaStore::new(dir.path());
        let (assets, warnings) = resolve_assets(&request, &store, &NoProbe).await.unwrap();

        assert_eq!(assets.len(), 1);
        assert!(assets.get("img").unwrap().info.is_none());
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("gone"));
    }

    #[tokio::test]
    async fn test_resolve_assets_fails_on_missing_primary() {
        let dir = TempDir::new().unwrap();
        let request: CompositionRequest = serde_json::from_value(serde_json::json!({
            "title": "t",
            "scenes": [{ "id": "a", "media": { "type": "video", "file_id": "missing-id" } }]
        }))
        .unwrap();

        let store = LocalMediaStore::new(dir.path());
        let err = resolve_assets(&request, &store, &NoProbe).await.unwrap_err();
        assert!(matches!(err, MediaError::MediaNotFound(ref id) if id == "missing-id"));
    }
}
