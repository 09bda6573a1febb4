//! Mapping between remote keys and local paths.

use std::io;
use std::path::{Component, Path, PathBuf};

use object_store::{BlobKey, DELIMITER};

use crate::error::SyncError;

/// Map `key` to a path below `local_root`.
///
/// The full key is kept, so `site/en/index.html` lands at
/// `<root>/site/en/index.html`. Segments that could step outside the root
/// are refused.
pub fn remote_to_local(key: &BlobKey, local_root: &Path) -> Result<PathBuf, SyncError> {
    let mut path = local_root.to_path_buf();
    for segment in key.segments() {
        let reason = match segment {
            "" => Some("empty segment"),
            "." | ".." => Some("relative segment"),
            s if s.contains(std::path::MAIN_SEPARATOR) => Some("platform separator in segment"),
            _ => None,
        };
        if let Some(reason) = reason {
            return Err(SyncError::InvalidKeyPath {
                key: key.to_string(),
                reason,
            });
        }
        path.push(segment);
    }
    Ok(path)
}

/// Map a local file below `local_root` to its remote key.
///
/// `key_prefix` is prepended as a directory; a missing trailing `/` is added.
pub fn local_to_remote(
    path: &Path,
    local_root: &Path,
    key_prefix: &str,
) -> Result<BlobKey, SyncError> {
    let invalid = || SyncError::InvalidPath {
        path: path.to_path_buf(),
        root: local_root.to_path_buf(),
    };

    let relative = path.strip_prefix(local_root).map_err(|_| invalid())?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_str().ok_or_else(invalid)?),
            Component::CurDir => {}
            _ => return Err(invalid()),
        }
    }
    if segments.is_empty() {
        return Err(invalid());
    }

    let mut key = String::from(key_prefix.trim_start_matches(DELIMITER));
    if !key.is_empty() && !key.ends_with(DELIMITER) {
        key.push(DELIMITER);
    }
    key.push_str(&segments.join("/"));

    Ok(BlobKey::new(key)?)
}

/// Make sure the parent directory of `path` exists.
///
/// Concurrent callers racing on the same directory are fine: an
/// `AlreadyExists` from the losing side is not an error.
pub async fn ensure_parent(path: &Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    match tokio::fs::create_dir_all(parent).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && parent.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> BlobKey {
        BlobKey::new(s).unwrap()
    }

    #[test]
    fn test_remote_to_local() {
        let root = Path::new("/data/mirror");
        let path = remote_to_local(&key("site/en/index.html"), root).unwrap();
        assert_eq!(path, root.join("site").join("en").join("index.html"));
    }

    #[test]
    fn test_remote_to_local_rejects_escape() {
        let root = Path::new("/data/mirror");
        assert!(matches!(
            remote_to_local(&key("site/../../etc/passwd"), root),
            Err(SyncError::InvalidKeyPath { .. })
        ));
        assert!(matches!(
            remote_to_local(&key("site//x"), root),
            Err(SyncError::InvalidKeyPath { .. })
        ));
    }

    #[test]
    fn test_local_to_remote() {
        let root = Path::new("/data/site");
        let file = root.join("en").join("index.html");

        assert_eq!(
            local_to_remote(&file, root, "builds/42").unwrap().as_str(),
            "builds/42/en/index.html"
        );
        assert_eq!(
            local_to_remote(&file, root, "builds/42/").unwrap().as_str(),
            "builds/42/en/index.html"
        );
        assert_eq!(
            local_to_remote(&file, root, "").unwrap().as_str(),
            "en/index.html"
        );
    }

    #[test]
    fn test_local_to_remote_outside_root() {
        let root = Path::new("/data/site");
        let err = local_to_remote(Path::new("/etc/passwd"), root, "").unwrap_err();
        assert!(matches!(err, SyncError::InvalidPath { .. }));
    }

    #[test]
    fn test_round_trip_through_root() {
        let root = Path::new("/tmp/root");
        let k = key("a/b/c.txt");
        let local = remote_to_local(&k, root).unwrap();
        assert_eq!(local_to_remote(&local, root, "").unwrap(), k);
    }

    #[tokio::test]
    async fn test_ensure_parent_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("x").join("y").join("z.bin");

        let (a, b) = tokio::join!(ensure_parent(&file), ensure_parent(&file));
        a.unwrap();
        b.unwrap();
        ensure_parent(&file).await.unwrap();
        assert!(temp.path().join("x").join("y").is_dir());
    }
}
