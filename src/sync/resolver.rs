use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::differ::ProcessingQueue;
use crate::error::SyncError;
use crate::model::Album;

/// Rewrites the album queue so that applying deletions in list order and
/// then additions in list order keeps the hierarchy valid at every step:
/// deletions child-first, additions parent-first, and kept albums whose
/// on-disk ancestor chain is being destroyed lifted into a remove+add pair.
pub fn resolve(
    mut queue: ProcessingQueue<Album>,
    local: &HashMap<String, Album>,
) -> Result<ProcessingQueue<Album>, SyncError> {
    let mut delete_set: HashSet<String> =
        queue.to_delete.iter().map(|a| a.uuid.clone()).collect();

    // Lift to fixpoint: destroying an ancestor's directory destroys the
    // kept album's stored form with it, so the local instance joins the
    // deletions and a fresh form joins the additions. Each lift can expose
    // further kept descendants.
    loop {
        let mut lifted = Vec::new();
        queue.to_keep.retain(|album| {
            if ancestor_condemned(album, local, &delete_set) {
                lifted.push(album.clone());
                false
            } else {
                true
            }
        });
        if lifted.is_empty() {
            break;
        }
        for album in lifted {
            debug!("lifting album {} out of a condemned subtree", album.uuid);
            delete_set.insert(album.uuid.clone());
            queue.to_delete.push(album.clone());
            queue.to_add.push(Album {
                path: None,
                ..album
            });
        }
    }

    order_additions(&mut queue)?;
    order_deletions(&mut queue.to_delete, local);
    Ok(queue)
}

/// Walks the album's on-disk parent chain; true when any ancestor is
/// scheduled for deletion.
fn ancestor_condemned(
    album: &Album,
    local: &HashMap<String, Album>,
    delete_set: &HashSet<String>,
) -> bool {
    let mut parent = album.parent.as_str();
    while !parent.is_empty() {
        if delete_set.contains(parent) {
            return true;
        }
        match local.get(parent) {
            Some(ancestor) => parent = ancestor.parent.as_str(),
            None => break,
        }
    }
    false
}

/// Additions become parent-first: each album is keyed by its distance to
/// the first ancestor that already exists (the root or a kept album), then
/// ordered by (depth, uuid). A parent that is neither kept nor being added
/// is a dangling reference; a parent chain that never terminates is a
/// cycle. Both are invariant violations.
fn order_additions(queue: &mut ProcessingQueue<Album>) -> Result<(), SyncError> {
    let keep_set: HashSet<&str> = queue.to_keep.iter().map(|a| a.uuid.as_str()).collect();
    let additions: HashMap<&str, &Album> =
        queue.to_add.iter().map(|a| (a.uuid.as_str(), a)).collect();

    let mut depths: HashMap<String, usize> = HashMap::new();
    for album in &queue.to_add {
        let mut visiting = HashSet::new();
        add_depth(album, &additions, &keep_set, &mut depths, &mut visiting)?;
    }

    queue
        .to_add
        .sort_by(|a, b| (depths[&a.uuid], &a.uuid).cmp(&(depths[&b.uuid], &b.uuid)));
    Ok(())
}

fn add_depth(
    album: &Album,
    additions: &HashMap<&str, &Album>,
    keep_set: &HashSet<&str>,
    depths: &mut HashMap<String, usize>,
    visiting: &mut HashSet<String>,
) -> Result<usize, SyncError> {
    if let Some(depth) = depths.get(&album.uuid) {
        return Ok(*depth);
    }
    if !visiting.insert(album.uuid.clone()) {
        return Err(SyncError::HierarchyCycle {
            uuid: album.uuid.clone(),
        });
    }

    let parent = album.parent.as_str();
    let depth = if parent.is_empty() || keep_set.contains(parent) {
        0
    } else if let Some(parent_album) = additions.get(parent) {
        1 + add_depth(parent_album, additions, keep_set, depths, visiting)?
    } else {
        return Err(SyncError::DanglingParent {
            uuid: album.uuid.clone(),
            parent: parent.to_string(),
        });
    };

    visiting.remove(&album.uuid);
    depths.insert(album.uuid.clone(), depth);
    Ok(depth)
}

/// Deletions become child-first: deepest local directory first, UUID as
/// the tie-break.
fn order_deletions(to_delete: &mut [Album], local: &HashMap<String, Album>) {
    let depth_of = |album: &Album| -> usize {
        if let Some(path) = &album.path {
            return path.components().count();
        }
        let mut depth = 0;
        let mut parent = album.parent.as_str();
        while !parent.is_empty() {
            depth += 1;
            parent = local
                .get(parent)
                .map(|a| a.parent.as_str())
                .unwrap_or_default();
        }
        depth
    };

    to_delete.sort_by(|a, b| {
        (std::cmp::Reverse(depth_of(a)), &a.uuid).cmp(&(std::cmp::Reverse(depth_of(b)), &b.uuid))
    });
}
