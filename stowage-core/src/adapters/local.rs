use std::fs as std_fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use stowage_model::{FileDescriptor, RemoteFileId};
use tokio::fs;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::StoreError;
use crate::ports::{FileQuery, RemoteStore};

/// Id of the store root.
pub const ROOT_ID: &str = ".";

/// A [`RemoteStore`] backed by a directory tree, typically a mounted or
/// synced copy of the remote drive.
///
/// Directories act as containers. Ids are `/`-separated paths relative to the
/// root. Listings walk depth first and are sorted by name within a directory.
/// Symlinks are reported with their target's size but never descended into;
/// entries that cannot be read are logged and left out.
#[derive(Debug, Clone)]
pub struct LocalFolderStore {
    root: PathBuf,
}

impl LocalFolderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Like [`LocalFolderStore::new`] but checks that `root` is a directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let metadata = fs::metadata(&root).await?;
        if !metadata.is_dir() {
            return Err(StoreError::Transport(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an id to a path under the root. Ids that would escape the root
    /// resolve to nothing.
    fn resolve(&self, id: &RemoteFileId) -> Option<PathBuf> {
        if id.as_str() == ROOT_ID {
            return Some(self.root.clone());
        }
        let relative = Path::new(id.as_str());
        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir
                | Component::RootDir
                | Component::Prefix(_) => return None,
            }
        }
        Some(path)
    }
}

/// `relative` rendered as an id, `.` when empty.
fn id_for(relative: &Path) -> RemoteFileId {
    let parts: Vec<_> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        RemoteFileId::new(ROOT_ID)
    } else {
        RemoteFileId::new(parts.join("/"))
    }
}

/// Size and kind of `entry`, following a symlink to its target.
fn entry_metadata(entry: &DirEntry) -> io::Result<std_fs::Metadata> {
    if entry.path_is_symlink() {
        std_fs::metadata(entry.path())
    } else {
        entry.metadata().map_err(io::Error::from)
    }
}

fn walk(
    root: &Path,
    start: &RemoteFileId,
    start_path: &Path,
    query: &FileQuery,
    max_depth: usize,
) -> Result<Vec<FileDescriptor>, StoreError> {
    let metadata = match std_fs::metadata(start_path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(start.clone()));
        }
        Err(err) => return Err(StoreError::Io(err)),
    };
    // A file standing where a container is expected has no children yet.
    if !metadata.is_dir() {
        debug!(container = %start, "listed a non-directory, no children");
        return Ok(Vec::new());
    }

    let walker = WalkDir::new(start_path)
        .follow_links(false)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name();

    let mut matches = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(StoreError::Io(io::Error::from(err)));
            }
            Err(err) => {
                warn!(container = %start, error = %err, "skipping unreadable entry");
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        if !query.matches_name(&name) {
            continue;
        }
        let metadata = match entry_metadata(&entry) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(
                    path = %entry.path().display(),
                    error = %err,
                    "skipping entry without readable metadata"
                );
                continue;
            }
        };

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let parent = relative.parent().map(id_for).unwrap_or_else(|| start.clone());
        let size_bytes = if metadata.is_file() { metadata.len() } else { 0 };
        matches.push(FileDescriptor::new(
            id_for(relative),
            name,
            Some(parent),
            size_bytes,
        ));
    }
    Ok(matches)
}

#[async_trait]
impl RemoteStore for LocalFolderStore {
    /// Without a parent, a non-recursive search covers the root and the
    /// direct children of top-level folders, where bundles are uploaded.
    async fn list_files(
        &self,
        query: &FileQuery,
    ) -> Result<Vec<FileDescriptor>, StoreError> {
        let start = query
            .parent
            .clone()
            .unwrap_or_else(|| RemoteFileId::new(ROOT_ID));
        let start_path = self
            .resolve(&start)
            .ok_or_else(|| StoreError::NotFound(start.clone()))?;
        let max_depth = match (&query.parent, query.recursive) {
            (_, true) => usize::MAX,
            (Some(_), false) => 1,
            (None, false) => 2,
        };

        let root = self.root.clone();
        let walk_query = query.clone();
        let matches = tokio::task::spawn_blocking(move || {
            walk(&root, &start, &start_path, &walk_query, max_depth)
        })
        .await
        .map_err(|err| {
            StoreError::Transport(format!("folder listing task failed: {err}"))
        })??;

        debug!(query = %query, matches = matches.len(), "listed local folder");
        Ok(matches)
    }

    async fn download(
        &self,
        file: &RemoteFileId,
    ) -> Result<Vec<u8>, StoreError> {
        let path = self
            .resolve(file)
            .ok_or_else(|| StoreError::NotFound(file.clone()))?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::NotFound
                        | io::ErrorKind::IsADirectory
                        | io::ErrorKind::NotADirectory
                ) =>
            {
                Err(StoreError::NotFound(file.clone()))
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_escaping_ids() {
        let store = LocalFolderStore::new("/srv/drive");
        assert_eq!(
            store.resolve(&"a/b/info.json".into()),
            Some(PathBuf::from("/srv/drive/a/b/info.json"))
        );
        assert_eq!(store.resolve(&".".into()), Some(PathBuf::from("/srv/drive")));
        assert_eq!(store.resolve(&"../etc/passwd".into()), None);
        assert_eq!(store.resolve(&"a/../../x".into()), None);
        assert_eq!(store.resolve(&"/etc/passwd".into()), None);
    }

    #[test]
    fn ids_are_relative_paths() {
        assert_eq!(id_for(Path::new("")), RemoteFileId::from(ROOT_ID));
        assert_eq!(id_for(Path::new("bundle")), RemoteFileId::from("bundle"));
        assert_eq!(
            id_for(Path::new("bundle/storyboard")),
            RemoteFileId::from("bundle/storyboard")
        );
    }
}
