//! Output file handling.
//!
//! Renders are written to a `.partial` sibling of the declared output and
//! only moved into place once the encoder has succeeded, so a reader never
//! observes a half-written file under the final name.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Suffix appended to in-progress output files.
pub const PARTIAL_SUFFIX: &str = "partial";

/// Path of the in-progress file for `output` (`video.mp4` -> `video.mp4.partial`).
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    output.with_file_name(name)
}

/// Move a finished render from `partial` to `output`.
///
/// Fails with `FileNotFound` when the encoder reported success but left no
/// file behind.
pub async fn publish_output(partial: &Path, output: &Path) -> MediaResult<()> {
    if !fs::try_exists(partial).await.unwrap_or(false) {
        return Err(MediaError::FileNotFound(partial.to_path_buf()));
    }
    move_file(partial, output).await
}

/// Remove a leftover partial file. Missing files are not an error.
pub async fn discard_partial(partial: &Path) {
    match fs::remove_file(partial).await {
        Ok(()) => debug!(path = %partial.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %partial.display(), error = %e, "Failed to remove partial output"),
    }
}

/// Move a file, falling back to copy and delete across filesystems.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            debug!(src = %src.display(), dst = %dst.display(), "Cross-device move, copying");
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

/// EXDEV
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    // Same directory as dst so the final rename stays on one filesystem
    let staging = dst.with_extension("tmp");

    fs::copy(src, &staging).await?;

    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!(path = %src.display(), error = %e, "Failed to remove source after copy");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/out/video_job_1.mp4")),
            PathBuf::from("/out/video_job_1.mp4.partial")
        );
    }

    #[tokio::test]
    async fn test_publish_moves_into_place() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("renders").join("final.mp4");
        let partial = dir.path().join("final.mp4.partial");
        fs::write(&partial, b"frames").await.unwrap();

        publish_output(&partial, &output).await.unwrap();

        assert!(!partial.exists());
        assert_eq!(fs::read(&output).await.unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_publish_without_file_fails() {
        let dir = TempDir::new().unwrap();
        let partial = dir.path().join("never.mp4.partial");

        let err = publish_output(&partial, &dir.path().join("never.mp4")).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_move_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.mp4");
        let dst = dir.path().join("old.mp4");
        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();

        move_file(&src, &dst).await.unwrap();
        assert_eq!(fs::read(&dst).await.unwrap(), b"new");
    }

    #[test]
    fn test_discard_missing_partial_is_quiet() {
        let dir = TempDir::new().unwrap();
        tokio_test::block_on(discard_partial(&dir.path().join("nothing.partial")));
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }
}
