pub mod album;
pub mod asset;

pub use album::{Album, AlbumKind};
pub use asset::{Asset, AssetKind};

/// Seam between the differ and the two entity kinds it operates on.
///
/// `same_as` is the equality fingerprint, deliberately distinct from
/// `PartialEq`: two records for the same UUID may still differ in content
/// and must then be replaced on disk.
pub trait SyncEntity {
    fn uuid(&self) -> &str;
    fn same_as(&self, other: &Self) -> bool;
}
