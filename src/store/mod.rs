use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use filetime::FileTime;
use tracing::warn;

use crate::model::{Album, AlbumKind, Asset, SyncEntity};

/// Flat directory under the data dir holding one file per asset.
pub const ASSET_DIR: &str = "_All-Photos";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("refusing to remove non-empty album directory {}", path.display())]
    AlbumNotEmpty { path: PathBuf },

    #[error("library root {} is not accessible: {source}", path.display())]
    RootAccess {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid library layout: {0}")]
    Layout(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Owner of the on-disk library layout. The filesystem is the only
/// persistence: every run re-derives local state from disk through the two
/// load operations, and the write operations are the only mutations.
///
/// Asset writes target distinct filenames (UUID uniqueness), so the store
/// is safe to share across the download pool without locking. Album
/// mutations are serial by the engine's ordering.
pub struct LibraryStore {
    data_dir: PathBuf,
}

impl LibraryStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_owned(),
        }
    }

    pub fn asset_pool(&self) -> PathBuf {
        self.data_dir.join(ASSET_DIR)
    }

    /// Creates the data dir and the asset pool if missing; fails fast when
    /// the root is unusable.
    pub async fn ensure_layout(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(self.asset_pool())
            .await
            .map_err(|source| StoreError::RootAccess {
                path: self.data_dir.clone(),
                source,
            })
    }

    /// Enumerates the asset pool into a UUID-keyed map. Entries that do not
    /// follow the `{uuid}.{ext}` shape are skipped with a warning; assets
    /// inside ARCHIVED albums live under the album tree and are never seen
    /// here.
    pub async fn load_assets(&self) -> Result<HashMap<String, Asset>, StoreError> {
        let pool = self.asset_pool();
        let mut entries =
            tokio::fs::read_dir(&pool)
                .await
                .map_err(|source| StoreError::RootAccess {
                    path: pool.clone(),
                    source,
                })?;

        let mut assets = HashMap::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                warn!("skipping non-file entry {:?} in asset pool", entry.path());
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!("skipping non-utf8 entry {:?} in asset pool", entry.path());
                continue;
            };
            let modified: DateTime<Utc> = metadata.modified()?.into();
            match Asset::from_pool_entry(name, metadata.len(), modified) {
                Some(asset) => {
                    assets.insert(asset.uuid.clone(), asset);
                }
                None => warn!("skipping foreign file {name:?} in asset pool"),
            }
        }
        Ok(assets)
    }

    /// Recursive descent from the album tree root (the data dir itself).
    /// Classification per directory: subdirectories present means FOLDER,
    /// regular files without subdirectories means ARCHIVED, otherwise
    /// ALBUM. A FOLDER with stray files keeps its kind but warns. ARCHIVED
    /// directories are opaque: no members, no descent.
    pub async fn load_albums(&self) -> Result<HashMap<String, Album>, StoreError> {
        let mut albums = HashMap::new();
        // (directory, parent uuid, path relative to the data dir)
        let mut stack: Vec<(PathBuf, String, PathBuf)> =
            vec![(self.data_dir.clone(), String::new(), PathBuf::new())];

        while let Some((dir, parent_uuid, rel)) = stack.pop() {
            let scan = self.scan_dir(&dir, rel.as_os_str().is_empty()).await?;

            for (child_dir, child_name) in scan.subdirs {
                let Some(uuid) = Album::uuid_from_dir_name(&child_name) else {
                    warn!("skipping foreign directory {child_dir:?} in album tree");
                    continue;
                };
                let child_rel = rel.join(&child_name);
                let child = self
                    .load_album_dir(&child_dir, uuid, &child_name, &parent_uuid, &child_rel)
                    .await?;
                if child.kind == AlbumKind::Folder {
                    stack.push((child_dir, child.uuid.clone(), child_rel));
                }
                albums.insert(child.uuid.clone(), child);
            }
        }
        Ok(albums)
    }

    async fn load_album_dir(
        &self,
        dir: &Path,
        uuid: &str,
        dir_name: &str,
        parent_uuid: &str,
        rel: &Path,
    ) -> Result<Album, StoreError> {
        let scan = self.scan_dir(dir, false).await?;

        let kind = if !scan.subdirs.is_empty() {
            if !scan.files.is_empty() || !scan.links.is_empty() {
                warn!("album directory {dir:?} mixes children with files, treating as folder");
            }
            AlbumKind::Folder
        } else if !scan.files.is_empty() {
            warn!("album directory {dir:?} contains regular files, treating as archived");
            AlbumKind::Archived
        } else {
            AlbumKind::Album
        };

        let mut members = HashMap::new();
        if kind == AlbumKind::Album {
            for (link_path, link_name) in scan.links {
                let target = tokio::fs::read_link(&link_path).await?;
                let Some(member_uuid) = target
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
                else {
                    warn!("skipping unreadable link target {target:?} in {dir:?}");
                    continue;
                };
                members.insert(member_uuid, link_name);
            }
        }

        // The label is whatever follows the UUID component.
        let name = dir_name
            .strip_prefix('.')
            .and_then(|rest| rest.strip_prefix(uuid))
            .and_then(|rest| rest.strip_prefix('-'))
            .unwrap_or_default()
            .to_string();

        Ok(Album {
            uuid: uuid.to_string(),
            name,
            kind,
            parent: parent_uuid.to_string(),
            members,
            path: Some(rel.to_owned()),
        })
    }

    async fn scan_dir(&self, dir: &Path, is_root: bool) -> Result<DirScan, StoreError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|source| StoreError::RootAccess {
                path: dir.to_owned(),
                source,
            })?;

        let mut scan = DirScan::default();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str().map(str::to_string) else {
                warn!("skipping non-utf8 entry {:?}", entry.path());
                continue;
            };
            if is_root && name == ASSET_DIR {
                continue;
            }
            // Symlinks must not be followed into the pool, so the entry is
            // classified by its own metadata.
            let metadata = tokio::fs::symlink_metadata(entry.path()).await?;
            if metadata.is_symlink() {
                scan.links.push((entry.path(), name));
            } else if metadata.is_dir() {
                if name.starts_with('.') {
                    scan.subdirs.push((entry.path(), name));
                } else if is_root {
                    warn!("skipping foreign directory {:?} at library root", entry.path());
                } else {
                    scan.subdirs.push((entry.path(), name));
                }
            } else {
                scan.files.push(name);
            }
        }
        scan.subdirs.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(scan)
    }

    /// Writes the asset bytes atomically (temp file, mtime stamp, rename)
    /// and leaves an already-present matching file untouched.
    pub async fn add_asset(&self, asset: &Asset, bytes: &[u8]) -> Result<(), StoreError> {
        let target = self.asset_pool().join(asset.pool_file_name());

        if let Ok(metadata) = tokio::fs::metadata(&target).await {
            let modified: DateTime<Utc> = metadata.modified()?.into();
            if let Some(existing) = Asset::from_pool_entry(
                &asset.pool_file_name(),
                metadata.len(),
                modified,
            ) {
                if existing.same_as(asset) {
                    return Ok(());
                }
            }
        }

        let tmp = self.asset_pool().join(format!("{}.tmp", asset.pool_file_name()));
        tokio::fs::write(&tmp, bytes).await?;
        filetime::set_file_mtime(
            &tmp,
            FileTime::from_unix_time(asset.modified.timestamp(), 0),
        )?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(())
    }

    /// Unlinks the asset's pool file; absent files are a no-op.
    pub async fn remove_asset(&self, asset: &Asset) -> Result<(), StoreError> {
        let target = self.asset_pool().join(asset.pool_file_name());
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Creates the album directory under the given parent path and, for the
    /// ALBUM kind, one relative symlink per member into the asset pool.
    /// Returns the new directory's path relative to the data dir.
    pub async fn add_album(
        &self,
        album: &Album,
        parent_rel: &Path,
    ) -> Result<PathBuf, StoreError> {
        let rel = parent_rel.join(album.dir_name());
        tokio::fs::create_dir_all(self.data_dir.join(&rel)).await?;

        if album.kind == AlbumKind::Album {
            self.sync_links(&rel, &album.members).await?;
        }
        Ok(rel)
    }

    /// Reconciles an ALBUM directory's symlinks with a member map: links
    /// not in the map are removed, the rest are re-created so names and
    /// targets are current. Album restructuring is a pure link operation;
    /// asset bytes never move.
    pub async fn sync_links(
        &self,
        rel: &Path,
        members: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let dir = self.data_dir.join(rel);
        let scan = self.scan_dir(&dir, false).await?;

        let desired: std::collections::HashSet<&str> =
            members.values().map(String::as_str).collect();
        for (link_path, link_name) in &scan.links {
            if !desired.contains(link_name.as_str()) {
                tokio::fs::remove_file(link_path).await?;
            }
        }

        let mut entries: Vec<(&String, &String)> = members.iter().collect();
        entries.sort_by(|a, b| a.1.cmp(b.1));
        let depth = rel.components().count();
        for (asset_uuid, link_name) in entries {
            let ext = link_name
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .unwrap_or_else(|| String::from("bin"));
            let mut target = PathBuf::new();
            for _ in 0..depth {
                target.push("..");
            }
            target.push(ASSET_DIR);
            target.push(format!("{asset_uuid}.{ext}"));

            let link = dir.join(link_name);
            match tokio::fs::remove_file(&link).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
            tokio::fs::symlink(&target, &link).await?;
        }
        Ok(())
    }

    /// Removes an album directory: symlinks first, then the directory
    /// itself. Regular files or remaining subdirectories make the removal
    /// fail, which guards ARCHIVED content; the caller treats that as
    /// fatal.
    pub async fn remove_album(&self, album: &Album) -> Result<(), StoreError> {
        let Some(rel) = &album.path else {
            return Err(StoreError::Layout(format!(
                "album {} has no on-disk location",
                album.uuid()
            )));
        };
        let dir = self.data_dir.join(rel);

        let scan = self.scan_dir(&dir, false).await?;
        if !scan.files.is_empty() || !scan.subdirs.is_empty() {
            return Err(StoreError::AlbumNotEmpty { path: dir });
        }
        for (link_path, _) in scan.links {
            tokio::fs::remove_file(link_path).await?;
        }
        tokio::fs::remove_dir(&dir).await?;
        Ok(())
    }
}

#[derive(Default)]
struct DirScan {
    /// (absolute path, entry name)
    subdirs: Vec<(PathBuf, String)>,
    links: Vec<(PathBuf, String)>,
    files: Vec<String>,
}
