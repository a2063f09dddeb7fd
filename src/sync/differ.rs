use std::collections::HashMap;

use crate::model::SyncEntity;

/// Output of a diff pass: what survives untouched, what must be written and
/// what must be destroyed. A changed entity appears in both `to_add` (its
/// remote form) and `to_delete` (its local form).
#[derive(Debug, Clone)]
pub struct ProcessingQueue<T> {
    pub to_keep: Vec<T>,
    pub to_add: Vec<T>,
    pub to_delete: Vec<T>,
}

impl<T> Default for ProcessingQueue<T> {
    fn default() -> Self {
        Self {
            to_keep: Vec::new(),
            to_add: Vec::new(),
            to_delete: Vec::new(),
        }
    }
}

/// Pure reconciliation of a remote entity list against the local map. Local
/// entities start out condemned; every remote entity either rescues its
/// local counterpart (fingerprint match) or schedules itself for addition.
/// `to_delete` is sorted by UUID so the operation stream is deterministic.
pub fn diff<T>(remote: Vec<T>, local: &HashMap<String, T>) -> ProcessingQueue<T>
where
    T: SyncEntity + Clone,
{
    let mut condemned: HashMap<&str, &T> = local.iter().map(|(k, v)| (k.as_str(), v)).collect();
    let mut queue = ProcessingQueue::default();

    for entity in remote {
        match local.get(entity.uuid()) {
            Some(existing) if existing.same_as(&entity) => {
                condemned.remove(entity.uuid());
                queue.to_keep.push(existing.clone());
            }
            _ => queue.to_add.push(entity),
        }
    }

    queue.to_delete = condemned.into_values().cloned().collect();
    queue.to_delete.sort_by(|a, b| a.uuid().cmp(b.uuid()));
    queue
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::{Asset, AssetKind};

    fn asset(uuid: &str, size: u64, secs: i64) -> Asset {
        Asset {
            uuid: uuid.to_string(),
            file_name: format!("{uuid}.jpg"),
            size,
            modified: Utc.timestamp_opt(secs, 0).unwrap(),
            kind: AssetKind::Original,
            checksum: None,
            download_url: None,
        }
    }

    fn local_map(assets: &[Asset]) -> HashMap<String, Asset> {
        assets
            .iter()
            .map(|a| (a.uuid.clone(), a.clone()))
            .collect()
    }

    #[test]
    fn empty_local_state_adds_everything() {
        let queue = diff(vec![asset("a1", 100, 10), asset("a2", 200, 20)], &HashMap::new());
        assert_eq!(queue.to_add.len(), 2);
        assert!(queue.to_keep.is_empty());
        assert!(queue.to_delete.is_empty());
    }

    #[test]
    fn unchanged_entities_are_kept() {
        let local = local_map(&[asset("a1", 100, 10)]);
        let queue = diff(vec![asset("a1", 100, 10)], &local);
        assert_eq!(queue.to_keep.len(), 1);
        assert!(queue.to_add.is_empty());
        assert!(queue.to_delete.is_empty());
    }

    #[test]
    fn changed_entity_is_deleted_and_re_added() {
        let local = local_map(&[asset("a1", 100, 10)]);
        let queue = diff(vec![asset("a1", 100, 11)], &local);
        assert_eq!(queue.to_add.len(), 1);
        assert_eq!(queue.to_delete.len(), 1);
        assert!(queue.to_keep.is_empty());
        assert_eq!(queue.to_add[0].uuid, "a1");
        assert_eq!(queue.to_delete[0].uuid, "a1");
    }

    #[test]
    fn vanished_entity_is_deleted() {
        let local = local_map(&[asset("a1", 100, 10), asset("a2", 200, 20)]);
        let queue = diff(vec![asset("a1", 100, 10)], &local);
        assert_eq!(queue.to_keep.len(), 1);
        assert_eq!(queue.to_delete.len(), 1);
        assert_eq!(queue.to_delete[0].uuid, "a2");
    }

    #[test]
    fn delete_order_is_deterministic() {
        let local = local_map(&[asset("a3", 1, 1), asset("a1", 1, 1), asset("a2", 1, 1)]);
        let queue = diff(Vec::new(), &local);
        let uuids: Vec<&str> = queue.to_delete.iter().map(|a| a.uuid.as_str()).collect();
        assert_eq!(uuids, ["a1", "a2", "a3"]);
    }

    #[test]
    fn diff_depends_only_on_its_inputs() {
        let local = local_map(&[asset("a1", 100, 10), asset("a2", 200, 20)]);
        let remote = vec![asset("a1", 100, 10), asset("a3", 300, 30)];

        let first = diff(remote.clone(), &local);
        let second = diff(remote, &local);
        let ids = |q: &ProcessingQueue<Asset>| {
            (
                q.to_keep.iter().map(|a| a.uuid.clone()).collect::<Vec<_>>(),
                q.to_add.iter().map(|a| a.uuid.clone()).collect::<Vec<_>>(),
                q.to_delete.iter().map(|a| a.uuid.clone()).collect::<Vec<_>>(),
            )
        };
        assert_eq!(ids(&first), ids(&second));
    }
}
