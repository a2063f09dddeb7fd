use chrono::{DateTime, Utc};
use url::Url;

use super::SyncEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Original,
    Edit,
    LivePhotoPart,
}

/// A single photo or video file. Its bytes live exactly once in the asset
/// pool, named `{uuid}.{ext}`.
#[derive(Debug, Clone)]
pub struct Asset {
    pub uuid: String,
    /// Human-visible filename including extension. Carried into album
    /// directories as the symlink name.
    pub file_name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub kind: AssetKind,
    /// sha256 hex digest, when the remote advertises one. Assets loaded
    /// from disk never carry it.
    pub checksum: Option<String>,
    /// Present on remote-projected assets only.
    pub download_url: Option<Url>,
}

impl Asset {
    /// Extension taken from the display filename, lowercased.
    pub fn extension(&self) -> String {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_else(|| String::from("bin"))
    }

    /// Name of this asset's file inside the asset pool.
    pub fn pool_file_name(&self) -> String {
        format!("{}.{}", self.uuid, self.extension())
    }

    /// Reconstructs an asset from a pool directory entry. Returns `None`
    /// for names that do not follow the `{uuid}.{ext}` shape, including the
    /// `*.tmp` residue a crashed write can leave behind.
    pub fn from_pool_entry(name: &str, size: u64, modified: DateTime<Utc>) -> Option<Self> {
        let (uuid, ext) = name.rsplit_once('.')?;
        if uuid.is_empty() || ext.is_empty() || uuid.contains('.') {
            return None;
        }
        Some(Self {
            uuid: uuid.to_string(),
            file_name: name.to_string(),
            size,
            modified,
            kind: AssetKind::Original,
            checksum: None,
            download_url: None,
        })
    }
}

impl SyncEntity for Asset {
    fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Size plus modification time at second precision, or the content
    /// hash when both sides carry one. Album membership is not part of the
    /// fingerprint; it belongs to the album entity.
    fn same_as(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (&self.checksum, &other.checksum) {
            return a.eq_ignore_ascii_case(b);
        }
        self.size == other.size && self.modified.timestamp() == other.modified.timestamp()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn asset(uuid: &str, file_name: &str, size: u64, secs: i64) -> Asset {
        Asset {
            uuid: uuid.to_string(),
            file_name: file_name.to_string(),
            size,
            modified: Utc.timestamp_opt(secs, 0).unwrap(),
            kind: AssetKind::Original,
            checksum: None,
            download_url: None,
        }
    }

    #[test]
    fn pool_file_name_uses_uuid_and_lowercased_extension() {
        let a = asset("a1", "IMG_0001.JPG", 100, 10);
        assert_eq!(a.pool_file_name(), "a1.jpg");
    }

    #[test]
    fn pool_entry_round_trip() {
        let modified = Utc.timestamp_opt(42, 0).unwrap();
        let a = Asset::from_pool_entry("a1.jpg", 100, modified).unwrap();
        assert_eq!(a.uuid, "a1");
        assert_eq!(a.pool_file_name(), "a1.jpg");
        assert!(Asset::from_pool_entry("no-extension", 1, modified).is_none());
        assert!(Asset::from_pool_entry(".tmp", 1, modified).is_none());
        assert!(Asset::from_pool_entry("a1.jpg.tmp", 1, modified).is_none());
    }

    #[test]
    fn fingerprint_matches_on_size_and_mtime_seconds() {
        let a = asset("a1", "a.jpg", 100, 10);
        let mut b = asset("a1", "a.jpg", 100, 10);
        b.modified = Utc.timestamp_opt(10, 999_000_000).unwrap();
        assert!(a.same_as(&b));

        let changed = asset("a1", "a.jpg", 100, 11);
        assert!(!a.same_as(&changed));
        let resized = asset("a1", "a.jpg", 101, 10);
        assert!(!a.same_as(&resized));
    }

    #[test]
    fn fingerprint_prefers_checksum_when_both_sides_have_one() {
        let mut a = asset("a1", "a.jpg", 100, 10);
        let mut b = asset("a1", "a.jpg", 200, 20);
        a.checksum = Some("ABCD".to_string());
        b.checksum = Some("abcd".to_string());
        assert!(a.same_as(&b));

        b.checksum = Some("ffff".to_string());
        assert!(!a.same_as(&b));
    }
}
