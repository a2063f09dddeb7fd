use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use futures::stream::{FuturesUnordered, StreamExt};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::differ::{self, ProcessingQueue};
use super::progress::{ProgressSender, SyncEvent};
use super::resolver;
use super::SyncReport;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::model::{Album, AlbumKind, Asset};
use crate::remote::types;
use crate::remote::{RemoteClient, RemoteError};
use crate::store::LibraryStore;

/// Final state of a successful run: the entity maps the local tree now
/// mirrors, plus the run counters.
#[derive(Debug)]
pub struct SyncOutcome {
    pub assets: HashMap<String, Asset>,
    pub albums: HashMap<String, Album>,
    pub report: SyncReport,
}

/// The driver. One `sync()` call walks fetch → diff → write, wrapped in a
/// retry loop that refreshes the remote session after every recoverable
/// failure. The engine owns no entity state between attempts; each attempt
/// re-derives everything from the remote and the disk.
pub struct SyncEngine {
    client: RemoteClient,
    store: LibraryStore,
    download_threads: usize,
    max_retries: i64,
    ignore_albums: HashSet<String>,
    progress: ProgressSender,
}

impl SyncEngine {
    pub fn new(
        client: RemoteClient,
        store: LibraryStore,
        config: &SyncConfig,
        progress: ProgressSender,
    ) -> Self {
        Self {
            client,
            store,
            download_threads: config.download_threads.max(1),
            max_retries: config.max_retries,
            ignore_albums: config.ignore_albums.iter().cloned().collect(),
            progress,
        }
    }

    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let mut failures: u32 = 0;
        loop {
            let attempt = failures + 1;
            self.progress.emit(SyncEvent::AttemptStarted { attempt });

            match self.attempt().await {
                Ok(mut outcome) => {
                    outcome.report.attempts = attempt;
                    self.progress.emit(SyncEvent::Completed {
                        assets: outcome.assets.len(),
                        albums: outcome.albums.len(),
                    });
                    info!(
                        "sync complete: {} assets downloaded, {} deleted, {} albums created, {} removed",
                        outcome.report.assets_downloaded,
                        outcome.report.assets_deleted,
                        outcome.report.albums_created,
                        outcome.report.albums_removed
                    );
                    return Ok(outcome);
                }
                Err(err) if err.is_recoverable() => {
                    failures += 1;
                    warn!("sync attempt {attempt} failed: {err}");
                    self.progress.emit(SyncEvent::AttemptFailed {
                        attempt,
                        error: err.to_string(),
                    });
                    if self.max_retries >= 0 && i64::from(failures) >= self.max_retries {
                        return Err(SyncError::RetriesExhausted {
                            attempts: failures,
                            source: Box::new(err),
                        });
                    }
                    self.client.refresh_session().await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(&self) -> Result<SyncOutcome, SyncError> {
        self.store.ensure_layout().await?;

        let (remote_assets, album_records, local_assets, local_albums) = tokio::try_join!(
            async { self.client.fetch_all_assets().await.map_err(SyncError::from) },
            async { self.client.fetch_all_albums().await.map_err(SyncError::from) },
            async { self.store.load_assets().await.map_err(SyncError::from) },
            async { self.store.load_albums().await.map_err(SyncError::from) },
        )?;

        let mut remote_albums = types::project_albums(album_records, &remote_assets);

        // Excluded labels come out of the remote list before diffing; a
        // pruned FOLDER takes its remote subtree with it, because every
        // child would otherwise reference a parent that no longer exists.
        let ignored: HashSet<String> = remote_albums
            .iter()
            .filter(|a| self.ignore_albums.contains(&a.name))
            .map(|a| a.uuid.clone())
            .collect();
        remote_albums = prune_subtrees(remote_albums, &ignored);

        // ARCHIVED albums are invisible to the diff: the local entry is
        // withheld and the same-UUID remote subtree is dropped, leaving
        // the user-owned files untouched.
        let archived: HashSet<String> = local_albums
            .values()
            .filter(|a| a.kind == AlbumKind::Archived)
            .map(|a| a.uuid.clone())
            .collect();
        remote_albums = prune_subtrees(remote_albums, &archived);
        let diffable_albums: HashMap<String, Album> = local_albums
            .iter()
            .filter(|(_, a)| a.kind != AlbumKind::Archived)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        self.progress.emit(SyncEvent::Fetched {
            remote_assets: remote_assets.len(),
            remote_albums: remote_albums.len(),
            local_assets: local_assets.len(),
            local_albums: local_albums.len(),
        });
        info!(
            "fetched {} remote assets, {} remote albums; loaded {} local assets, {} local albums",
            remote_assets.len(),
            remote_albums.len(),
            local_assets.len(),
            local_albums.len()
        );

        let remote_album_index: HashMap<String, Album> = remote_albums
            .iter()
            .map(|a| (a.uuid.clone(), a.clone()))
            .collect();

        let asset_queue = differ::diff(remote_assets, &local_assets);
        let album_queue = differ::diff(remote_albums, &diffable_albums);
        let album_queue = resolver::resolve(album_queue, &diffable_albums)?;

        self.progress.emit(SyncEvent::Diffed {
            assets_to_add: asset_queue.to_add.len(),
            assets_to_delete: asset_queue.to_delete.len(),
            albums_to_add: album_queue.to_add.len(),
            albums_to_delete: album_queue.to_delete.len(),
        });

        let mut report = SyncReport {
            assets_kept: asset_queue.to_keep.len(),
            albums_kept: album_queue.to_keep.len(),
            ..SyncReport::default()
        };

        // Asset phase: every delete strictly before any add, so a changed
        // asset's removal cannot race its re-download.
        for asset in &asset_queue.to_delete {
            self.store.remove_asset(asset).await?;
            report.assets_deleted += 1;
            self.progress.emit(SyncEvent::AssetDeleted {
                uuid: asset.uuid.clone(),
            });
        }
        report.assets_downloaded = self.download_assets(&asset_queue.to_add).await?;

        // Album phase: deletions then additions, both in resolver order.
        for album in &album_queue.to_delete {
            self.store.remove_album(album).await?;
            report.albums_removed += 1;
            self.progress.emit(SyncEvent::AlbumRemoved {
                uuid: album.uuid.clone(),
            });
        }

        let mut dirs: HashMap<String, PathBuf> = HashMap::new();
        dirs.insert(String::new(), PathBuf::new());
        for album in &album_queue.to_keep {
            if let Some(path) = &album.path {
                dirs.insert(album.uuid.clone(), path.clone());
            }
        }
        for album in &album_queue.to_add {
            let parent_rel = dirs.get(&album.parent).cloned().ok_or_else(|| {
                SyncError::DanglingParent {
                    uuid: album.uuid.clone(),
                    parent: album.parent.clone(),
                }
            })?;
            let rel = self.store.add_album(album, &parent_rel).await?;
            dirs.insert(album.uuid.clone(), rel);
            report.albums_created += 1;
            self.progress.emit(SyncEvent::AlbumCreated {
                uuid: album.uuid.clone(),
            });
        }

        // Kept leaf albums whose remote membership moved on get their
        // links reconciled in place; the link name carries the filename,
        // which can change without re-fingerprinting the album.
        for album in &album_queue.to_keep {
            if album.kind != AlbumKind::Album {
                continue;
            }
            let Some(remote) = remote_album_index.get(&album.uuid) else {
                continue;
            };
            if remote.members != album.members {
                if let Some(path) = &album.path {
                    self.store.sync_links(path, &remote.members).await?;
                }
            }
        }

        Ok(self.outcome(asset_queue, album_queue, remote_album_index, report))
    }

    fn outcome(
        &self,
        asset_queue: ProcessingQueue<Asset>,
        album_queue: ProcessingQueue<Album>,
        mut remote_album_index: HashMap<String, Album>,
        report: SyncReport,
    ) -> SyncOutcome {
        let mut assets = HashMap::new();
        for asset in asset_queue.to_keep.into_iter().chain(asset_queue.to_add) {
            assets.insert(asset.uuid.clone(), asset);
        }

        let mut albums = HashMap::new();
        for album in album_queue.to_keep.into_iter().chain(album_queue.to_add) {
            let current = remote_album_index.remove(&album.uuid).unwrap_or(album);
            albums.insert(current.uuid.clone(), current);
        }

        SyncOutcome {
            assets,
            albums,
            report,
        }
    }

    /// Bounded download pool. On the first failure no further job is
    /// submitted (pending work is dropped) but every in-flight download is
    /// awaited; `add_asset` is the atomic unit and is never aborted
    /// mid-write.
    async fn download_assets(&self, to_add: &[Asset]) -> Result<usize, SyncError> {
        let mut queue = to_add.iter();
        let mut in_flight = FuturesUnordered::new();
        let mut downloaded = 0;
        let mut first_err: Option<SyncError> = None;

        loop {
            while first_err.is_none() && in_flight.len() < self.download_threads {
                match queue.next() {
                    Some(asset) => in_flight.push(self.download_one(asset)),
                    None => break,
                }
            }
            match in_flight.next().await {
                Some(Ok(uuid)) => {
                    downloaded += 1;
                    self.progress.emit(SyncEvent::AssetAdded { uuid });
                }
                Some(Err(err)) => {
                    warn!("download failed: {err}");
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
                None => break,
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(downloaded),
        }
    }

    async fn download_one(&self, asset: &Asset) -> Result<String, SyncError> {
        let url = asset.download_url.as_ref().ok_or_else(|| {
            RemoteError::Decode(format!("asset {} carries no download url", asset.uuid))
        })?;
        let bytes = self.client.download(url).await?;
        verify_payload(asset, &bytes)?;
        self.store.add_asset(asset, &bytes).await?;
        Ok(asset.uuid.clone())
    }
}

/// Checks the advertised size and, when the master record supplied one,
/// the sha256 checksum.
fn verify_payload(asset: &Asset, bytes: &[u8]) -> Result<(), RemoteError> {
    if bytes.len() as u64 != asset.size {
        return Err(RemoteError::Verification {
            uuid: asset.uuid.clone(),
            reason: format!("got {} bytes, advertised {}", bytes.len(), asset.size),
        });
    }
    if let Some(expected) = &asset.checksum {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let actual = format!("{:x}", hasher.finalize());
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(RemoteError::Verification {
                uuid: asset.uuid.clone(),
                reason: "checksum mismatch".to_string(),
            });
        }
    }
    Ok(())
}

/// Drops every album whose UUID is in `roots` or whose remote parent chain
/// passes through one.
fn prune_subtrees(albums: Vec<Album>, roots: &HashSet<String>) -> Vec<Album> {
    if roots.is_empty() {
        return albums;
    }
    let parents: HashMap<&str, &str> = albums
        .iter()
        .map(|a| (a.uuid.as_str(), a.parent.as_str()))
        .collect();
    let is_condemned = |start: &str| -> bool {
        let mut uuid = start;
        let mut seen = HashSet::new();
        loop {
            if roots.contains(uuid) {
                return true;
            }
            // A parent cycle is left for the resolver to report.
            if !seen.insert(uuid) {
                return false;
            }
            match parents.get(uuid) {
                Some(parent) if !parent.is_empty() => uuid = parent,
                _ => return false,
            }
        }
    };
    let condemned_uuids: HashSet<String> = albums
        .iter()
        .map(|a| a.uuid.as_str())
        .filter(|uuid| is_condemned(uuid))
        .map(|uuid| uuid.to_string())
        .collect();
    albums
        .into_iter()
        .filter(|a| !condemned_uuids.contains(a.uuid.as_str()))
        .collect()
}
