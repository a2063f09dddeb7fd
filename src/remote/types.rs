use std::collections::HashMap;

use chrono::DateTime;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use super::RemoteError;
use crate::model::{Album, AlbumKind, Asset, AssetKind};

/// The two parallel record streams the asset listing is joined from. The
/// master record carries the bytes side (filename, size, download URL), the
/// content record the catalog side (modification time, kind).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecordPage {
    pub content_records: Vec<AssetContentRecord>,
    pub master_records: Vec<AssetMasterRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetContentRecord {
    pub record_name: String,
    /// Milliseconds since the epoch.
    pub modified_at: i64,
    #[serde(default)]
    pub kind: RecordAssetKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMasterRecord {
    pub record_name: String,
    pub file_name: String,
    pub size: u64,
    pub download_url: String,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordAssetKind {
    #[default]
    Original,
    Edit,
    LivePhotoPart,
}

impl From<RecordAssetKind> for AssetKind {
    fn from(kind: RecordAssetKind) -> Self {
        match kind {
            RecordAssetKind::Original => AssetKind::Original,
            RecordAssetKind::Edit => AssetKind::Edit,
            RecordAssetKind::LivePhotoPart => AssetKind::LivePhotoPart,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRecord {
    pub record_name: String,
    pub name: String,
    #[serde(default)]
    pub parent: String,
    pub kind: RecordAlbumKind,
    /// Record names of member assets; only meaningful for `Album`.
    #[serde(default)]
    pub assets: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordAlbumKind {
    Folder,
    Album,
}

impl From<RecordAlbumKind> for AlbumKind {
    fn from(kind: RecordAlbumKind) -> Self {
        match kind {
            RecordAlbumKind::Folder => AlbumKind::Folder,
            RecordAlbumKind::Album => AlbumKind::Album,
        }
    }
}

/// Joins the two record streams by record name and projects the result into
/// typed assets. Masters without a matching content record (and the other
/// way round) are skipped with a warning; the join is what defines the run's
/// asset universe.
pub fn project_assets(page: AssetRecordPage) -> Result<Vec<Asset>, RemoteError> {
    let mut contents: HashMap<String, AssetContentRecord> = page
        .content_records
        .into_iter()
        .map(|r| (r.record_name.clone(), r))
        .collect();

    let mut assets = Vec::with_capacity(page.master_records.len());
    for master in page.master_records {
        let Some(content) = contents.remove(&master.record_name) else {
            warn!("master record {} has no content record, skipping", master.record_name);
            continue;
        };
        let modified = DateTime::from_timestamp_millis(content.modified_at).ok_or_else(|| {
            RemoteError::Decode(format!(
                "record {} carries invalid timestamp {}",
                master.record_name, content.modified_at
            ))
        })?;
        let download_url = Url::parse(&master.download_url).map_err(|e| {
            RemoteError::Decode(format!(
                "record {} carries invalid download url: {e}",
                master.record_name
            ))
        })?;
        assets.push(Asset {
            uuid: master.record_name,
            file_name: master.file_name,
            size: master.size,
            modified,
            kind: content.kind.into(),
            checksum: master.checksum,
            download_url: Some(download_url),
        });
    }

    for record_name in contents.keys() {
        warn!("content record {record_name} has no master record, skipping");
    }
    Ok(assets)
}

/// Projects album records into typed albums, resolving member record names
/// into `{asset uuid -> filename}` against the joined asset list. Members
/// that reference an unknown asset are dropped with a warning.
pub fn project_albums(records: Vec<AlbumRecord>, assets: &[Asset]) -> Vec<Album> {
    let file_names: HashMap<&str, &str> = assets
        .iter()
        .map(|a| (a.uuid.as_str(), a.file_name.as_str()))
        .collect();

    records
        .into_iter()
        .map(|record| {
            let kind: AlbumKind = record.kind.into();
            let mut members = HashMap::new();
            if kind == AlbumKind::Album {
                for member in &record.assets {
                    match file_names.get(member.as_str()) {
                        Some(name) => {
                            members.insert(member.clone(), (*name).to_string());
                        }
                        None => warn!(
                            "album {} references unknown asset {member}, skipping member",
                            record.record_name
                        ),
                    }
                }
            }
            Album {
                uuid: record.record_name,
                name: record.name,
                kind,
                parent: record.parent,
                members,
                path: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(json: &str) -> AssetRecordPage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn joins_masters_with_contents() {
        let page = page(
            r#"{
                "contentRecords": [
                    {"recordName": "a1", "modifiedAt": 10000, "kind": "ORIGINAL"},
                    {"recordName": "orphan", "modifiedAt": 5000}
                ],
                "masterRecords": [
                    {"recordName": "a1", "fileName": "one.jpg", "size": 100,
                     "downloadUrl": "http://remote.test/d/a1"},
                    {"recordName": "a2", "fileName": "two.jpg", "size": 200,
                     "downloadUrl": "http://remote.test/d/a2"}
                ]
            }"#,
        );

        let assets = project_assets(page).unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].uuid, "a1");
        assert_eq!(assets[0].modified.timestamp(), 10);
        assert_eq!(assets[0].kind, AssetKind::Original);
        assert!(assets[0].download_url.is_some());
    }

    #[test]
    fn rejects_unparseable_download_url() {
        let page = page(
            r#"{
                "contentRecords": [{"recordName": "a1", "modifiedAt": 10000}],
                "masterRecords": [
                    {"recordName": "a1", "fileName": "one.jpg", "size": 100,
                     "downloadUrl": "not a url"}
                ]
            }"#,
        );
        assert!(matches!(
            project_assets(page),
            Err(RemoteError::Decode(_))
        ));
    }

    #[test]
    fn album_members_resolve_to_filenames() {
        let assets = project_assets(page(
            r#"{
                "contentRecords": [{"recordName": "a1", "modifiedAt": 10000}],
                "masterRecords": [
                    {"recordName": "a1", "fileName": "one.jpg", "size": 100,
                     "downloadUrl": "http://remote.test/d/a1"}
                ]
            }"#,
        ))
        .unwrap();

        let records: Vec<AlbumRecord> = serde_json::from_str(
            r#"[
                {"recordName": "f1", "name": "Trips", "kind": "FOLDER"},
                {"recordName": "b1", "name": "Hikes", "parent": "f1",
                 "kind": "ALBUM", "assets": ["a1", "missing"]}
            ]"#,
        )
        .unwrap();

        let albums = project_albums(records, &assets);
        assert_eq!(albums.len(), 2);
        assert_eq!(albums[0].kind, AlbumKind::Folder);
        assert_eq!(albums[1].members.len(), 1);
        assert_eq!(albums[1].members.get("a1").unwrap(), "one.jpg");
    }
}
