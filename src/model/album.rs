use std::collections::HashMap;
use std::path::PathBuf;

use super::SyncEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumKind {
    /// Contains only child albums.
    Folder,
    /// Contains only asset members, materialized as symlinks.
    Album,
    /// User-owned regular files under the album tree; opaque to sync.
    Archived,
}

/// A node in the hierarchical album structure. The root album has the empty
/// UUID and maps to the data directory itself; it is never materialized.
#[derive(Debug, Clone)]
pub struct Album {
    pub uuid: String,
    pub name: String,
    pub kind: AlbumKind,
    /// UUID of the enclosing album; empty means the root.
    pub parent: String,
    /// Asset UUID to link name, populated for `AlbumKind::Album`.
    pub members: HashMap<String, String>,
    /// On-disk directory relative to the data directory. Populated for
    /// albums loaded from disk, absent on remote-projected ones.
    pub path: Option<PathBuf>,
}

impl Album {
    /// Directory name under the parent: a leading dot, the UUID, then the
    /// sanitized label, so the UUID survives a round trip through disk.
    pub fn dir_name(&self) -> String {
        format!(".{}-{}", self.uuid, safe_name(&self.name))
    }

    /// Recovers the UUID component from a directory name produced by
    /// [`Album::dir_name`]: strip the leading dot, read up to the first `-`.
    pub fn uuid_from_dir_name(dir_name: &str) -> Option<&str> {
        let stripped = dir_name.strip_prefix('.')?;
        let uuid = stripped.split('-').next()?;
        if uuid.is_empty() {
            None
        } else {
            Some(uuid)
        }
    }
}

/// Album labels end up as path components, so separators and control
/// characters are replaced. The UUID prefix, not the label, is the identity
/// on disk.
pub fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

impl SyncEntity for Album {
    fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Kind, label and parent. Membership changes are carried by the album
    /// record but do not re-fingerprint it; links are rebuilt whenever the
    /// directory is.
    fn same_as(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name && self.parent == other.parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn album(uuid: &str, name: &str, kind: AlbumKind, parent: &str) -> Album {
        Album {
            uuid: uuid.to_string(),
            name: name.to_string(),
            kind,
            parent: parent.to_string(),
            members: HashMap::new(),
            path: None,
        }
    }

    #[test]
    fn dir_name_round_trips_the_uuid() {
        let a = album("f1", "Summer 2019", AlbumKind::Folder, "");
        assert_eq!(a.dir_name(), ".f1-Summer 2019");
        assert_eq!(Album::uuid_from_dir_name(&a.dir_name()), Some("f1"));
    }

    #[test]
    fn uuid_recovery_rejects_foreign_names() {
        assert_eq!(Album::uuid_from_dir_name("not-hidden"), None);
        assert_eq!(Album::uuid_from_dir_name(".-noname"), None);
    }

    #[test]
    fn labels_are_sanitized_for_disk() {
        let a = album("a1", "trips/2020\nfall", AlbumKind::Album, "f1");
        assert_eq!(a.dir_name(), ".a1-trips_2020_fall");
    }

    #[test]
    fn fingerprint_covers_kind_label_and_parent() {
        let a = album("a1", "Hikes", AlbumKind::Album, "f1");
        assert!(a.same_as(&album("a1", "Hikes", AlbumKind::Album, "f1")));
        assert!(!a.same_as(&album("a1", "Hikes", AlbumKind::Album, "")));
        assert!(!a.same_as(&album("a1", "Walks", AlbumKind::Album, "f1")));
        assert!(!a.same_as(&album("a1", "Hikes", AlbumKind::Folder, "f1")));
    }

    #[test]
    fn membership_does_not_change_the_fingerprint() {
        let mut a = album("a1", "Hikes", AlbumKind::Album, "f1");
        let b = album("a1", "Hikes", AlbumKind::Album, "f1");
        a.members.insert("x1".to_string(), "x.jpg".to_string());
        assert!(a.same_as(&b));
    }
}
